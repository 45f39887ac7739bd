//! LDC Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the LDC workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the pipeline error taxonomy and result alias
//! - **Logging**: `tracing` subscriber setup driven by environment variables
//! - **Types**: destination timestamp formatting and report status values
//!
//! # Example
//!
//! ```no_run
//! use ldc_common::{Result, SyncError};
//! use ldc_common::types::timestamp::destination_now;
//!
//! fn stamp(records: usize) -> Result<String> {
//!     if records == 0 {
//!         return Err(SyncError::validation("nothing to stamp"));
//!     }
//!     Ok(destination_now())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SyncError};
pub use types::ReportStatus;
