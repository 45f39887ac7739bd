//! LDC Sync
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Moves characters and their quotes from the source API into the
//! destination data platform, and purges them again.
//!
//! # Overview
//!
//! - **Auth**: two-step token exchange with a cached, single-flight credential
//! - **Transform**: source entities to destination records
//! - **Ingest**: sequential fixed-size batches with per-batch failure accounting
//! - **Bulk**: create/upload/close/poll delete jobs with cancellable polling
//! - **Purge**: linked accounts, then character and quote delete jobs
//! - **Source**: paginated source client with a file cache
//!
//! # Example
//!
//! ```no_run
//! use ldc_sync::config::SyncConfig;
//! use ldc_sync::context::SyncContext;
//!
//! # async fn run() -> ldc_common::Result<()> {
//! let context = SyncContext::build(SyncConfig::load()?)?;
//! let snapshot = context.source.fetch_all(false).await?;
//! let report = context.pipeline.ingest_characters(&snapshot.characters).await?;
//! println!("{} records ingested", report.ingested_count);
//! # Ok(())
//! # }
//! ```

pub mod accounts;
pub mod auth;
pub mod bulk;
pub mod cli;
pub mod config;
pub mod context;
pub mod error_sink;
pub mod http;
pub mod ingest;
pub mod model;
pub mod pipeline;
pub mod purge;
pub mod source;
pub mod transform;

// Re-export commonly used types
pub use auth::TokenBroker;
pub use bulk::{BulkDeleteOutcome, BulkJobManager, BulkJobState};
pub use cli::{Cli, Commands};
pub use config::SyncConfig;
pub use ingest::{BatchIngestor, IngestReport};
pub use pipeline::Pipeline;
pub use purge::{PurgeOrchestrator, PurgeReport};
