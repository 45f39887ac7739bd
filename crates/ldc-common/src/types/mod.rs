//! Common types used across LDC

pub mod timestamp;

use serde::{Deserialize, Serialize};

/// Overall outcome of a pipeline run as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Every batch or job succeeded
    Success,
    /// At least one step succeeded and at least one failed
    Partial,
    /// Pipeline-level failure; nothing useful was delivered
    Error,
    /// Nothing to do, e.g. no quotes found
    Warning,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Success => "success",
            ReportStatus::Partial => "partial",
            ReportStatus::Error => "error",
            ReportStatus::Warning => "warning",
        }
    }

    /// `success` when every step succeeded, `partial` when some did, else `error`.
    pub fn from_counts(succeeded: usize, total: usize) -> Self {
        if succeeded == total {
            ReportStatus::Success
        } else if succeeded > 0 {
            ReportStatus::Partial
        } else {
            ReportStatus::Error
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
