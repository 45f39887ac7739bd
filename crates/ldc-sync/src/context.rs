//! Component wiring
//!
//! One [`TokenBroker`] is shared by every destination-facing component.

use crate::accounts::AccountPurger;
use crate::auth::TokenBroker;
use crate::bulk::BulkJobManager;
use crate::config::SyncConfig;
use crate::error_sink::{ErrorSink, JsonFileErrorSink};
use crate::ingest::BatchIngestor;
use crate::pipeline::Pipeline;
use crate::purge::PurgeOrchestrator;
use crate::source::{CharacterSource, OneApiClient};
use ldc_common::Result;
use std::sync::Arc;

/// Everything a command needs, built from one configuration
pub struct SyncContext {
    pub source: Arc<OneApiClient>,
    pub pipeline: Pipeline,
    pub purge: PurgeOrchestrator,
}

impl SyncContext {
    pub fn build(config: SyncConfig) -> Result<Self> {
        let source = Arc::new(OneApiClient::new(config.source)?);
        let broker = Arc::new(TokenBroker::new(config.auth)?);

        let sink: Arc<dyn ErrorSink> =
            Arc::new(JsonFileErrorSink::new(config.ingest.error_log_file.clone()));
        let characters = config.ingest.characters.clone();
        let quotes = config.ingest.quotes.clone();

        let ingestor = Arc::new(BatchIngestor::new(broker.clone(), sink, config.ingest)?);
        let bulk = Arc::new(BulkJobManager::new(broker.clone(), config.bulk)?);
        let accounts = AccountPurger::new(broker.clone(), &config.purge)?;

        let purge = PurgeOrchestrator::new(
            accounts,
            bulk,
            source.clone() as Arc<dyn CharacterSource>,
            characters,
            quotes,
            config.purge.fixture_ids,
        );

        Ok(Self {
            source,
            pipeline: Pipeline::new(ingestor),
            purge,
        })
    }
}
