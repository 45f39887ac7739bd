//! Character and quote ingestion pipelines

use crate::ingest::{validate_cardinality, BatchIngestor, IngestReport};
use crate::model::Character;
use crate::transform::{extract_quotes, transform_characters};
use ldc_common::{Result, SyncError};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Transforms source characters and hands them to the batch ingestor
pub struct Pipeline {
    ingestor: Arc<BatchIngestor>,
}

impl Pipeline {
    pub fn new(ingestor: Arc<BatchIngestor>) -> Self {
        Self { ingestor }
    }

    /// Ingest characters into the character object.
    ///
    /// Invalid entities are dropped with a warning. Empty input, input over
    /// the configured maximum, and input where no entity survives
    /// transformation are raised as validation errors.
    #[instrument(skip_all, fields(characters = entities.len()))]
    pub async fn ingest_characters(&self, entities: &[Character]) -> Result<IngestReport> {
        validate_cardinality(entities.len(), self.ingestor.config().max_records)?;

        let outcome = transform_characters(entities);
        if outcome.records.is_empty() {
            return Err(SyncError::validation(
                "no valid characters to ingest after transformation",
            ));
        }

        let mut logs = vec![format!(
            "{} of {} characters prepared for ingestion",
            outcome.records.len(),
            entities.len()
        )];
        if !outcome.rejected.is_empty() {
            warn!(rejected = outcome.rejected.len(), "Dropped invalid characters");
            logs.push(format!("Skipped {} invalid characters", outcome.rejected.len()));
        }

        let mut report = self.ingestor.ingest(&outcome.records).await?;
        logs.append(&mut report.logs);
        report.logs = logs;

        Ok(report)
    }

    /// Ingest every quote fragment carried by `entities` into the quote object.
    ///
    /// No quotes at all is a `warning` report, not an error.
    #[instrument(skip_all, fields(characters = entities.len()))]
    pub async fn ingest_quotes(&self, entities: &[Character]) -> Result<IngestReport> {
        let quotes = extract_quotes(entities);

        if quotes.is_empty() {
            info!("No quotes found in character data");
            return Ok(IngestReport::warning(
                "No quotes found to ingest",
                Vec::new(),
            ));
        }

        let mut logs = vec![format!(
            "{} quotes extracted from {} characters",
            quotes.len(),
            entities.len()
        )];

        let mut report = self.ingestor.ingest(&quotes).await?;
        logs.append(&mut report.logs);
        report.logs = logs;

        Ok(report)
    }
}
