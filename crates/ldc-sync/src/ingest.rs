//! Batched ingestion into the destination
//!
//! Records are split into fixed-size batches in input order and POSTed one
//! after another to `{instance}/api/v1/ingest/sources/{source}/{object}`
//! wrapped as `{"data": [...]}`. A batch either lands whole or fails whole;
//! failures go to the error sink and never stop later batches.

use crate::auth::{AuthorizedSession, TokenBroker};
use crate::config::{IngestConfig, IngestTarget};
use crate::error_sink::{ErrorEntry, ErrorSink, SAMPLE_ID_COUNT};
use crate::http::{build_client, ensure_success};
use crate::transform::{DestinationRecord, RecordKind};
use ldc_common::types::timestamp::destination_now;
use ldc_common::{ReportStatus, Result, SyncError};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Outcome of one submitted batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    /// 1-based
    pub batch_num: usize,
    pub count: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of an ingestion run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// `success` when every batch went through, `partial` when some did.
    /// A run where every batch failed is `error`, so `partial` always means
    /// something reached the destination.
    pub status: ReportStatus,
    pub ingested_count: usize,
    pub total_records: usize,
    pub successful_batches: usize,
    pub failed_batches: usize,
    pub total_batches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
    pub logs: Vec<String>,
    #[serde(skip)]
    pub batches: Vec<BatchOutcome>,
}

impl IngestReport {
    /// Report for a run with nothing to send
    pub fn warning(message: impl Into<String>, logs: Vec<String>) -> Self {
        let mut logs = logs;
        logs.push(message.into());
        Self {
            status: ReportStatus::Warning,
            ingested_count: 0,
            total_records: 0,
            successful_batches: 0,
            failed_batches: 0,
            total_batches: 0,
            error: None,
            timestamp: destination_now(),
            logs,
            batches: Vec::new(),
        }
    }

    fn from_batches(batches: Vec<BatchOutcome>, total_batches: usize, logs: Vec<String>) -> Self {
        let successful_batches = batches.iter().filter(|b| b.success).count();
        let failed_batches = batches.len() - successful_batches;

        Self {
            status: ReportStatus::from_counts(successful_batches, total_batches),
            ingested_count: batches.iter().filter(|b| b.success).map(|b| b.count).sum(),
            total_records: batches.iter().map(|b| b.count).sum(),
            successful_batches,
            failed_batches,
            total_batches,
            error: None,
            timestamp: destination_now(),
            logs,
            batches,
        }
    }
}

/// `{"data": [...]}` envelope required by the streaming ingestion endpoint
#[derive(Serialize)]
struct IngestEnvelope<'a, R> {
    data: &'a [R],
}

/// Reject empty input and input above `max` before anything is sent.
pub fn validate_cardinality(count: usize, max: usize) -> Result<()> {
    if count == 0 {
        return Err(SyncError::validation("record list cannot be empty"));
    }
    if count > max {
        return Err(SyncError::validation(format!(
            "too many records: {} exceeds limit of {}",
            count, max
        )));
    }
    Ok(())
}

/// Split `records` into consecutive slices of at most `batch_size`.
///
/// # Panics
///
/// Panics if `batch_size` is zero; configuration validation rules that out.
pub fn partition<R>(records: &[R], batch_size: usize) -> Vec<&[R]> {
    assert!(batch_size > 0, "batch size must be positive");
    records.chunks(batch_size).collect()
}

/// Submits destination records in bounded batches
pub struct BatchIngestor {
    client: Client,
    broker: Arc<TokenBroker>,
    sink: Arc<dyn ErrorSink>,
    config: IngestConfig,
}

impl BatchIngestor {
    pub fn new(
        broker: Arc<TokenBroker>,
        sink: Arc<dyn ErrorSink>,
        config: IngestConfig,
    ) -> Result<Self> {
        if !(1..=crate::config::MAX_BATCH_SIZE).contains(&config.batch_size) {
            return Err(SyncError::config(format!(
                "batch size {} outside 1..={}",
                config.batch_size,
                crate::config::MAX_BATCH_SIZE
            )));
        }

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            broker,
            sink,
            config,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Destination source/object pair for a record kind
    pub fn target(&self, kind: RecordKind) -> &IngestTarget {
        match kind {
            RecordKind::Character => &self.config.characters,
            RecordKind::Quote => &self.config.quotes,
        }
    }

    /// Ingest `records` in batches.
    ///
    /// Only cardinality problems are returned as `Err`. Batch failures are
    /// counted in the report, and an authentication failure ends the run
    /// with an `error` report.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn ingest<R: DestinationRecord>(&self, records: &[R]) -> Result<IngestReport> {
        validate_cardinality(records.len(), self.config.max_records)?;

        let kind = R::KIND;
        let target = self.target(kind).clone();
        let batches = partition(records, self.config.batch_size);
        let total_batches = batches.len();

        let mut logs = vec![format!(
            "Split {} {} records into {} batches",
            records.len(),
            kind,
            total_batches
        )];
        info!(
            kind = %kind,
            total_batches,
            batch_size = self.config.batch_size,
            "Starting batched ingestion"
        );

        let mut outcomes = Vec::with_capacity(total_batches);

        for (i, batch) in batches.into_iter().enumerate() {
            let batch_num = i + 1;

            let session = match self.broker.authorized().await {
                Ok(session) => session,
                Err(e) => {
                    error!(batch = batch_num, error = %e, "Authentication failed, aborting ingestion");
                    logs.push(format!("Authentication failed: {}", e));
                    let mut report = IngestReport::from_batches(outcomes, total_batches, logs);
                    report.status = ReportStatus::Error;
                    report.error = Some(e.to_string());
                    return Ok(report);
                },
            };

            let outcome = self
                .submit_batch(&session, &target, batch, batch_num, total_batches)
                .await;

            if outcome.success {
                logs.push(format!(
                    "Batch {}/{} ingested ({} records)",
                    batch_num, total_batches, outcome.count
                ));
            } else {
                logs.push(format!(
                    "Batch {}/{} failed: {}",
                    batch_num,
                    total_batches,
                    outcome.error.as_deref().unwrap_or("unknown error")
                ));
                self.record_failure(batch, &outcome).await;
            }

            outcomes.push(outcome);
        }

        let mut report = IngestReport::from_batches(outcomes, total_batches, logs);
        match report.status {
            ReportStatus::Success => report.logs.push(format!(
                "{} records ingested",
                report.ingested_count
            )),
            _ => report.logs.push(format!(
                "{}/{} batches succeeded, {}/{} records ingested",
                report.successful_batches,
                report.total_batches,
                report.ingested_count,
                report.total_records
            )),
        }

        info!(
            status = %report.status,
            ingested = report.ingested_count,
            failed_batches = report.failed_batches,
            "Batched ingestion finished"
        );

        Ok(report)
    }

    async fn submit_batch<R: DestinationRecord>(
        &self,
        session: &AuthorizedSession,
        target: &IngestTarget,
        batch: &[R],
        batch_num: usize,
        total_batches: usize,
    ) -> BatchOutcome {
        let url = format!(
            "{}/api/v1/ingest/sources/{}/{}",
            session.base_url, target.source_name, target.object_name
        );

        info!(
            batch = batch_num,
            total = total_batches,
            count = batch.len(),
            url = %url,
            "Sending batch"
        );

        let result = async {
            let response = self
                .client
                .post(&url)
                .header(reqwest::header::AUTHORIZATION, session.bearer())
                .json(&IngestEnvelope { data: batch })
                .send()
                .await?;
            ensure_success(response).await
        }
        .await;

        match result {
            Ok(_) => BatchOutcome {
                batch_num,
                count: batch.len(),
                success: true,
                error: None,
            },
            Err(e) => {
                error!(batch = batch_num, total = total_batches, error = %e, "Batch failed");
                BatchOutcome {
                    batch_num,
                    count: batch.len(),
                    success: false,
                    error: Some(e.to_string()),
                }
            },
        }
    }

    async fn record_failure<R: DestinationRecord>(&self, batch: &[R], outcome: &BatchOutcome) {
        let entry = ErrorEntry {
            timestamp: destination_now(),
            batch_num: outcome.batch_num,
            error: outcome.error.clone().unwrap_or_default(),
            record_count: batch.len(),
            sample_ids: batch
                .iter()
                .take(SAMPLE_ID_COUNT)
                .map(|r| r.record_id().to_string())
                .collect(),
        };

        if let Err(e) = self.sink.append(entry).await {
            warn!(batch = outcome.batch_num, error = %e, "Could not write error log");
        }
    }
}
