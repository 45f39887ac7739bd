//! Removal of relational Account records linked to characters
//!
//! Runs against the platform instance returned by the client-credentials
//! step, not the destination instance.

use crate::auth::{PlatformSession, TokenBroker};
use crate::config::PurgeConfig;
use crate::http::{build_client, ensure_success};
use ldc_common::Result;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Accounts carrying a character linkage key
pub const LINKED_ACCOUNTS_QUERY: &str =
    "SELECT Id, Name, characterId__c FROM Account WHERE characterId__c != null";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage {
    #[serde(default)]
    total_size: usize,
    #[serde(default)]
    records: Vec<AccountRow>,
    #[serde(default)]
    next_records_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AccountRow {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name", default)]
    name: Option<String>,
}

/// Result of the account purge step
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountPurgeOutcome {
    pub success: bool,
    pub deleted_count: usize,
    pub failed_count: usize,
    pub total_found: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AccountPurgeOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Deletes linked Account records one at a time
pub struct AccountPurger {
    client: Client,
    broker: Arc<TokenBroker>,
    api_version: String,
}

impl AccountPurger {
    pub fn new(broker: Arc<TokenBroker>, config: &PurgeConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            broker,
            api_version: config.platform_api_version.clone(),
        })
    }

    /// Find and delete every linked Account. A failed delete is counted and
    /// the loop moves on; a failed lookup yields `success = false`.
    #[instrument(skip(self))]
    pub async fn purge(&self) -> AccountPurgeOutcome {
        let session = match self.broker.platform_session().await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Failed to authenticate against the platform");
                return AccountPurgeOutcome::failed(e.to_string());
            },
        };

        let accounts = match self.find_linked(&session).await {
            Ok(accounts) => accounts,
            Err(e) => {
                error!(error = %e, "Failed to query linked accounts");
                return AccountPurgeOutcome::failed(e.to_string());
            },
        };

        info!(found = accounts.len(), "Linked accounts found");

        let mut outcome = AccountPurgeOutcome {
            total_found: accounts.len(),
            ..AccountPurgeOutcome::default()
        };

        for account in &accounts {
            let name = account.name.as_deref().unwrap_or("Unknown");
            match self.delete(&session, &account.id).await {
                Ok(()) => {
                    outcome.deleted_count += 1;
                    info!(account = %name, "Deleted account");
                },
                Err(e) => {
                    outcome.failed_count += 1;
                    error!(account = %name, error = %e, "Failed to delete account");
                },
            }
        }

        outcome.success = outcome.failed_count == 0;
        outcome
    }

    fn data_url(&self, session: &PlatformSession) -> String {
        format!("{}/services/data/{}", session.instance_url, self.api_version)
    }

    async fn find_linked(&self, session: &PlatformSession) -> Result<Vec<AccountRow>> {
        let response = self
            .client
            .get(format!("{}/query", self.data_url(session)))
            .header(AUTHORIZATION, bearer(session))
            .query(&[("q", LINKED_ACCOUNTS_QUERY)])
            .send()
            .await?;
        let mut page: QueryPage = ensure_success(response).await?.json().await?;

        debug!(total = page.total_size, "Linked account query answered");
        let mut rows = std::mem::take(&mut page.records);

        while let Some(next) = page.next_records_url.take() {
            let response = self
                .client
                .get(format!("{}{}", session.instance_url, next))
                .header(AUTHORIZATION, bearer(session))
                .send()
                .await?;
            page = ensure_success(response).await?.json().await?;
            rows.append(&mut page.records);
        }

        Ok(rows)
    }

    async fn delete(&self, session: &PlatformSession, account_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/sobjects/Account/{}", self.data_url(session), account_id))
            .header(AUTHORIZATION, bearer(session))
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }
}

fn bearer(session: &PlatformSession) -> String {
    format!("Bearer {}", session.access_token)
}
