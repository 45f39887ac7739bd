//! Full deletion run
//!
//! Three steps in order: linked Account records on the platform, then a
//! character bulk delete, then a quote bulk delete. The overall status only
//! looks at the two bulk jobs.

use crate::accounts::{AccountPurgeOutcome, AccountPurger};
use crate::bulk::{BulkDeleteOutcome, BulkJobManager};
use crate::config::IngestTarget;
use crate::source::CharacterSource;
use crate::transform::{character_deletion_ids, quote_deletion_keys};
use ldc_common::types::timestamp::destination_now;
use ldc_common::ReportStatus;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Summary of a purge run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub status: ReportStatus,
    pub deleted_count: usize,
    pub characters_deleted: usize,
    pub quotes_deleted: usize,
    pub accounts_deleted: usize,
    pub accounts_failed: usize,
    pub character_job_id: Option<String>,
    pub quote_job_id: Option<String>,
    pub accounts: AccountPurgeOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_job: Option<BulkDeleteOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_job: Option<BulkDeleteOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
    pub logs: Vec<String>,
}

/// Overall status from the two bulk jobs
pub fn purge_status(characters: &BulkDeleteOutcome, quotes: &BulkDeleteOutcome) -> ReportStatus {
    let succeeded = [characters.success, quotes.success]
        .iter()
        .filter(|s| **s)
        .count();
    ReportStatus::from_counts(succeeded, 2)
}

/// Sequences the account purge and both bulk deletes
pub struct PurgeOrchestrator {
    accounts: AccountPurger,
    bulk: Arc<BulkJobManager>,
    source: Arc<dyn CharacterSource>,
    characters: IngestTarget,
    quotes: IngestTarget,
    fixture_ids: Vec<String>,
}

impl PurgeOrchestrator {
    pub fn new(
        accounts: AccountPurger,
        bulk: Arc<BulkJobManager>,
        source: Arc<dyn CharacterSource>,
        characters: IngestTarget,
        quotes: IngestTarget,
        fixture_ids: Vec<String>,
    ) -> Self {
        Self {
            accounts,
            bulk,
            source,
            characters,
            quotes,
            fixture_ids,
        }
    }

    /// Run the purge. `cancel` stops bulk job polling; jobs already
    /// submitted keep running.
    #[instrument(skip_all)]
    pub async fn purge(&self, cancel: &CancellationToken) -> PurgeReport {
        let mut logs = Vec::new();

        info!("Starting purge");
        logs.push("Step 1: purging linked Account records".to_string());
        let accounts = self.accounts.purge().await;
        logs.push(match (&accounts.error, accounts.deleted_count) {
            (Some(e), _) => format!("Account purge failed: {}", e),
            (None, 0) => "No linked Accounts found".to_string(),
            (None, n) => format!("Deleted {} Account(s)", n),
        });
        if accounts.failed_count > 0 {
            logs.push(format!("Failed to delete {} Account(s)", accounts.failed_count));
        }

        let characters = match self.source.fetch_characters().await {
            Ok(characters) => characters,
            Err(e) => {
                error!(error = %e, "Could not fetch the character set, purge aborted");
                logs.push(format!("Could not fetch characters: {}", e));
                return PurgeReport {
                    status: ReportStatus::Error,
                    deleted_count: 0,
                    characters_deleted: 0,
                    quotes_deleted: 0,
                    accounts_deleted: accounts.deleted_count,
                    accounts_failed: accounts.failed_count,
                    character_job_id: None,
                    quote_job_id: None,
                    accounts,
                    character_job: None,
                    quote_job: None,
                    error: Some(e.to_string()),
                    timestamp: destination_now(),
                    logs,
                };
            },
        };

        let mut character_ids = character_deletion_ids(&characters);
        for fixture in &self.fixture_ids {
            if !character_ids.contains(fixture) {
                character_ids.push(fixture.clone());
            }
        }

        logs.push(format!(
            "Step 2: {} characters marked for removal",
            character_ids.len()
        ));
        let character_job = self
            .bulk
            .run_delete(&character_ids, &self.characters, cancel)
            .await;
        logs.push(step_log("Character", &character_job, character_ids.len()));

        let quote_keys = quote_deletion_keys(&characters);
        logs.push(format!("Step 3: {} quotes marked for removal", quote_keys.len()));
        let quote_job = self.bulk.run_delete(&quote_keys, &self.quotes, cancel).await;
        logs.push(step_log("Quote", &quote_job, quote_keys.len()));

        let status = purge_status(&character_job, &quote_job);
        info!(status = %status, "Purge finished");

        PurgeReport {
            status,
            deleted_count: character_ids.len() + quote_keys.len(),
            characters_deleted: if character_job.success { character_ids.len() } else { 0 },
            quotes_deleted: if quote_job.success { quote_keys.len() } else { 0 },
            accounts_deleted: accounts.deleted_count,
            accounts_failed: accounts.failed_count,
            character_job_id: character_job.job_id.clone(),
            quote_job_id: quote_job.job_id.clone(),
            accounts,
            character_job: Some(character_job),
            quote_job: Some(quote_job),
            error: None,
            timestamp: destination_now(),
            logs,
        }
    }
}

fn step_log(label: &str, outcome: &BulkDeleteOutcome, count: usize) -> String {
    match (outcome.success, count) {
        (true, 0) => format!("No {} records to delete", label.to_lowercase()),
        (true, n) => format!("{} delete job submitted ({} records)", label, n),
        (false, _) => format!(
            "{} delete failed: {}",
            label,
            outcome.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
