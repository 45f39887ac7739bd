//! Durable record of failed ingestion batches
//!
//! The file sink keeps a JSON array. Appends are serialized through a mutex
//! and written to a sibling temp file that is renamed over the target, so a
//! crash mid-write never truncates earlier entries. A missing or unreadable
//! file starts a fresh list.

use async_trait::async_trait;
use ldc_common::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Number of record identifiers kept per entry.
pub const SAMPLE_ID_COUNT: usize = 3;

/// One failed batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: String,
    pub batch_num: usize,
    pub error: String,
    pub record_count: usize,
    pub sample_ids: Vec<String>,
}

/// Append-only sink for batch failures
#[async_trait]
pub trait ErrorSink: Send + Sync {
    async fn append(&self, entry: ErrorEntry) -> Result<()>;

    /// Everything recorded so far, oldest first
    async fn entries(&self) -> Result<Vec<ErrorEntry>>;
}

/// JSON-array file sink
pub struct JsonFileErrorSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileErrorSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_existing(&self) -> Vec<ErrorEntry> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Error log unreadable, starting fresh");
                return Vec::new();
            },
        };

        match serde_json::from_slice(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Error log corrupt, starting fresh");
                Vec::new()
            },
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ErrorSink for JsonFileErrorSink {
    async fn append(&self, entry: ErrorEntry) -> Result<()> {
        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut entries = self.read_existing().await;
        entries.push(entry);

        let body = serde_json::to_vec_pretty(&entries)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, body).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!(path = %self.path.display(), total = entries.len(), "Appended ingestion error");
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<ErrorEntry>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_existing().await)
    }
}

/// In-memory sink for tests and dry runs
#[derive(Default)]
pub struct MemoryErrorSink {
    entries: Mutex<Vec<ErrorEntry>>,
}

impl MemoryErrorSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ErrorSink for MemoryErrorSink {
    async fn append(&self, entry: ErrorEntry) -> Result<()> {
        self.entries.lock().await.push(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<ErrorEntry>> {
        Ok(self.entries.lock().await.clone())
    }
}
