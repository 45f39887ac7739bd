//! Bulk delete jobs
//!
//! A delete runs as an asynchronous destination-side job:
//!
//! 1. **create** `POST /api/v1/ingest/jobs` with `{object, sourceName, operation: "delete"}`
//! 2. **upload** `PUT /api/v1/ingest/jobs/{id}/batches` with a header-less
//!    two-column CSV: the key and a timestamp later than the record's
//!    ingestion time
//! 3. **close** `PATCH /api/v1/ingest/jobs/{id}` with `{state: "UploadComplete"}`
//! 4. **poll** `GET /api/v1/ingest/jobs/{id}` until `JobComplete`, `Failed`
//!    or `Aborted`, or until the attempt budget runs out
//!
//! Any failure in steps 1-3 fails the job. Once the job is closed it counts as
//! submitted: running out of polls, poll errors and cancellation all report an
//! `InProgress` success, and the job keeps running server-side.

use crate::auth::{AuthorizedSession, TokenBroker};
use crate::config::{BulkConfig, IngestTarget};
use crate::http::{build_client, ensure_success};
use ldc_common::types::timestamp::destination_after;
use ldc_common::Result;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

const SUBMITTED_MESSAGE: &str = "Job submitted - check Data Stream Refresh History for completion";

/// Server-side state of a bulk job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkJobState {
    Open,
    UploadComplete,
    InProgress,
    JobComplete,
    Aborted,
    Failed,
    #[serde(other)]
    Unknown,
}

impl BulkJobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkJobState::Open => "Open",
            BulkJobState::UploadComplete => "UploadComplete",
            BulkJobState::InProgress => "InProgress",
            BulkJobState::JobComplete => "JobComplete",
            BulkJobState::Aborted => "Aborted",
            BulkJobState::Failed => "Failed",
            BulkJobState::Unknown => "Unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BulkJobState::JobComplete | BulkJobState::Aborted | BulkJobState::Failed
        )
    }
}

impl std::fmt::Display for BulkJobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job as returned by the create and status endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkJob {
    pub id: String,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub state: Option<BulkJobState>,
    #[serde(default)]
    pub total_processing_time: Option<Value>,
}

/// Result of one delete job
#[derive(Debug, Clone, Serialize)]
pub struct BulkDeleteOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<BulkJobState>,
    pub records_submitted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BulkDeleteOutcome {
    /// Nothing to delete
    pub fn empty() -> Self {
        Self {
            success: true,
            job_id: None,
            state: None,
            records_submitted: 0,
            processing_time: None,
            error: None,
            message: Some("No records to delete".to_string()),
        }
    }

    fn failed(job_id: Option<String>, state: Option<BulkJobState>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            job_id,
            state,
            records_submitted: 0,
            processing_time: None,
            error: Some(error.into()),
            message: None,
        }
    }

    fn submitted(job_id: String, records_submitted: usize, message: impl Into<String>) -> Self {
        Self {
            success: true,
            job_id: Some(job_id),
            state: Some(BulkJobState::InProgress),
            records_submitted,
            processing_time: None,
            error: None,
            message: Some(message.into()),
        }
    }
}

/// Header-less CSV body for a delete upload: one `"key","timestamp"` line per
/// key, joined by `\n`. Embedded quotes are doubled.
pub fn build_delete_csv(keys: &[String], timestamp: &str) -> String {
    keys.iter()
        .map(|key| format!("\"{}\",\"{}\"", key.replace('"', "\"\""), timestamp))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drives delete jobs against the bulk endpoint
pub struct BulkJobManager {
    client: Client,
    broker: Arc<TokenBroker>,
    config: BulkConfig,
}

impl BulkJobManager {
    pub fn new(broker: Arc<TokenBroker>, config: BulkConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            broker,
            config,
        })
    }

    /// Run [`run_delete`](Self::run_delete) on its own task.
    pub fn spawn_delete(
        self: &Arc<Self>,
        keys: Vec<String>,
        target: IngestTarget,
        cancel: CancellationToken,
    ) -> JoinHandle<BulkDeleteOutcome> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.run_delete(&keys, &target, &cancel).await })
    }

    /// Delete `keys` from `target` and wait for the job to finish.
    ///
    /// Cancelling `cancel` stops polling only; the job is left running.
    #[instrument(skip_all, fields(object = %target.object_name, keys = keys.len()))]
    pub async fn run_delete(
        &self,
        keys: &[String],
        target: &IngestTarget,
        cancel: &CancellationToken,
    ) -> BulkDeleteOutcome {
        if keys.is_empty() {
            info!("No keys to delete, skipping bulk job");
            return BulkDeleteOutcome::empty();
        }

        let session = match self.broker.authorized().await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Authentication failed, bulk delete not started");
                return BulkDeleteOutcome::failed(None, None, e.to_string());
            },
        };

        let job = match self.create(&session, target).await {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, "Failed to create bulk delete job");
                return BulkDeleteOutcome::failed(None, None, e.to_string());
            },
        };
        info!(job_id = %job.id, "Bulk delete job created");

        let timestamp = destination_after(self.config.delete_offset);
        let csv = build_delete_csv(keys, &timestamp);

        if let Err(e) = self.upload(&session, &job.id, csv).await {
            error!(job_id = %job.id, error = %e, "Failed to upload delete keys");
            return BulkDeleteOutcome::failed(Some(job.id), Some(BulkJobState::Open), e.to_string());
        }
        info!(job_id = %job.id, records = keys.len(), "Delete keys uploaded");

        if let Err(e) = self.close(&session, &job.id).await {
            error!(job_id = %job.id, error = %e, "Failed to close bulk delete job");
            return BulkDeleteOutcome::failed(Some(job.id), Some(BulkJobState::Open), e.to_string());
        }
        info!(job_id = %job.id, "Bulk delete job closed, processing started");

        self.poll(job.id, keys.len(), cancel).await
    }

    fn jobs_url(session: &AuthorizedSession) -> String {
        format!("{}/api/v1/ingest/jobs", session.base_url)
    }

    async fn create(&self, session: &AuthorizedSession, target: &IngestTarget) -> Result<BulkJob> {
        let response = self
            .client
            .post(Self::jobs_url(session))
            .header(AUTHORIZATION, session.bearer())
            .json(&json!({
                "object": target.object_name,
                "sourceName": target.source_name,
                "operation": "delete",
            }))
            .send()
            .await?;

        Ok(ensure_success(response).await?.json::<BulkJob>().await?)
    }

    async fn upload(&self, session: &AuthorizedSession, job_id: &str, csv: String) -> Result<()> {
        let response = self
            .client
            .put(format!("{}/{}/batches", Self::jobs_url(session), job_id))
            .header(AUTHORIZATION, session.bearer())
            .header(CONTENT_TYPE, "text/csv")
            .timeout(Duration::from_secs(self.config.upload_timeout_secs))
            .body(csv)
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn close(&self, session: &AuthorizedSession, job_id: &str) -> Result<()> {
        let response = self
            .client
            .patch(format!("{}/{}", Self::jobs_url(session), job_id))
            .header(AUTHORIZATION, session.bearer())
            .json(&json!({ "state": "UploadComplete" }))
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    /// Each check takes its own session; polling can outlast the credential
    /// used to create the job.
    async fn status(&self, job_id: &str) -> Result<BulkJob> {
        let session = self.broker.authorized().await?;
        let response = self
            .client
            .get(format!("{}/{}", Self::jobs_url(&session), job_id))
            .header(AUTHORIZATION, session.bearer())
            .send()
            .await?;

        Ok(ensure_success(response).await?.json::<BulkJob>().await?)
    }

    async fn poll(
        &self,
        job_id: String,
        records_submitted: usize,
        cancel: &CancellationToken,
    ) -> BulkDeleteOutcome {
        let max_attempts = self.config.max_poll_attempts;

        for attempt in 1..=max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(job_id = %job_id, attempt, "Polling cancelled, job left running");
                    return BulkDeleteOutcome::submitted(
                        job_id,
                        records_submitted,
                        "Polling cancelled - job is still processing",
                    );
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }

            let status = match self.status(&job_id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(job_id = %job_id, attempt, error = %e, "Job status check failed");
                    continue;
                },
            };

            match status.state {
                Some(BulkJobState::JobComplete) => {
                    info!(
                        job_id = %job_id,
                        processing_time = ?status.total_processing_time,
                        "Bulk delete job complete"
                    );
                    return BulkDeleteOutcome {
                        success: true,
                        job_id: Some(job_id),
                        state: Some(BulkJobState::JobComplete),
                        records_submitted,
                        processing_time: status.total_processing_time,
                        error: None,
                        message: None,
                    };
                },
                Some(state @ (BulkJobState::Failed | BulkJobState::Aborted)) => {
                    error!(job_id = %job_id, state = %state, "Bulk delete job did not complete");
                    return BulkDeleteOutcome::failed(
                        Some(job_id),
                        Some(state),
                        format!("Job {}", state.as_str().to_lowercase()),
                    );
                },
                state => {
                    info!(
                        job_id = %job_id,
                        attempt,
                        max_attempts,
                        state = state.map(|s| s.as_str()).unwrap_or("unknown"),
                        "Waiting for bulk delete job"
                    );
                },
            }
        }

        warn!(job_id = %job_id, max_attempts, "Job still running after poll budget");
        BulkDeleteOutcome::submitted(job_id, records_submitted, SUBMITTED_MESSAGE)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_csv_shape() {
        let keys: Vec<String> = vec!["a".into(), "b_0".into(), "c".into()];
        let csv = build_delete_csv(&keys, "2025-01-01T13:00:00.000Z");

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), keys.len());
        assert_eq!(lines[0], r#""a","2025-01-01T13:00:00.000Z""#);
        for line in lines {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), 2);
            assert!(fields.iter().all(|f| f.starts_with('"') && f.ends_with('"')));
        }
        assert!(!csv.ends_with('\n'));
    }

    #[test]
    fn test_delete_csv_escapes_quotes() {
        let csv = build_delete_csv(&[r#"odd"key"#.to_string()], "t");
        assert_eq!(csv, r#""odd""key","t""#);
    }

    #[test]
    fn test_job_state_parsing() {
        let job: BulkJob =
            serde_json::from_str(r#"{"id":"j1","state":"JobComplete","totalProcessingTime":1200}"#)
                .unwrap();
        assert_eq!(job.state, Some(BulkJobState::JobComplete));
        assert!(job.state.unwrap().is_terminal());

        let job: BulkJob = serde_json::from_str(r#"{"id":"j2","state":"Queued"}"#).unwrap();
        assert_eq!(job.state, Some(BulkJobState::Unknown));
        assert!(!BulkJobState::InProgress.is_terminal());
    }

    #[test]
    fn test_empty_outcome_serializes_snake_case() {
        let value = serde_json::to_value(BulkDeleteOutcome::empty()).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["records_submitted"], 0);
        assert!(value.get("job_id").is_none());
    }
}
