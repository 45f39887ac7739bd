//! Configuration management
//!
//! Everything is read from the environment (optionally seeded from a `.env`
//! file). Each component receives its own slice so it can be built directly
//! in tests.

use ldc_common::{Result, SyncError};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// Default source API base URL.
pub const DEFAULT_SOURCE_BASE_URL: &str = "https://the-one-api.dev/v2";

/// Default identity endpoint host.
pub const DEFAULT_AUTH_URL: &str = "https://login.salesforce.com";

pub const DEFAULT_CHARACTER_SOURCE_NAME: &str = "lotr_characters";
pub const DEFAULT_CHARACTER_OBJECT_NAME: &str = "LotrCharacter";
pub const DEFAULT_QUOTE_SOURCE_NAME: &str = "lotr";
pub const DEFAULT_QUOTE_OBJECT_NAME: &str = "LotrQuote";

pub const DEFAULT_CACHE_DIR: &str = "data";
pub const DEFAULT_CACHE_MAX_AGE_HOURS: i64 = 24;
pub const DEFAULT_ERROR_LOG_FILE: &str = "logs/ingestion_errors.json";

/// Default number of records per ingestion call.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Largest batch the ingestion endpoint accepts.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Default upper bound on records per pipeline run.
pub const DEFAULT_MAX_RECORDS: usize = 10_000;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 36;

/// Forward offset applied to the delete timestamp column.
pub const DEFAULT_DELETE_OFFSET_SECS: i64 = 3600;

/// Version segment of the relational REST API used by the account purge.
pub const DEFAULT_PLATFORM_API_VERSION: &str = "v59.0";

pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_INGEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_BULK_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BULK_UPLOAD_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;

/// Connect deadline shared by every HTTP client.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Records known to be created by setup and validation tooling.
pub const FIXTURE_CHARACTER_IDS: [&str; 4] = [
    "test123",
    "test_validation_123",
    "test_validation_456",
    "test_flow_001",
];

// ============================================================================
// Configuration sections
// ============================================================================

/// Full application configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source: SourceConfig,
    pub auth: AuthConfig,
    pub ingest: IngestConfig,
    pub bulk: BulkConfig,
    pub purge: PurgeConfig,
}

/// Source API client configuration
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub api_key: String,
    pub base_url: String,
    pub cache_dir: PathBuf,
    pub cache_max_age_hours: i64,
    /// Pause between paginated requests
    pub page_delay: Duration,
    /// Pause between endpoints
    pub endpoint_delay: Duration,
    pub timeout_secs: u64,
}

/// Credentials for the identity and token exchange
#[derive(Clone)]
pub struct AuthConfig {
    pub auth_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Destination base URL used when the exchange returns no instance host
    pub fallback_instance_url: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("fallback_instance_url", &self.fallback_instance_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Destination source/object pair records are written to or deleted from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestTarget {
    pub source_name: String,
    pub object_name: String,
}

impl IngestTarget {
    pub fn new(source_name: impl Into<String>, object_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            object_name: object_name.into(),
        }
    }
}

/// Batch ingestion configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub characters: IngestTarget,
    pub quotes: IngestTarget,
    pub batch_size: usize,
    pub max_records: usize,
    pub error_log_file: PathBuf,
    pub timeout_secs: u64,
}

/// Bulk delete job configuration
#[derive(Debug, Clone)]
pub struct BulkConfig {
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub delete_offset: chrono::Duration,
    pub timeout_secs: u64,
    pub upload_timeout_secs: u64,
}

/// Purge run configuration
#[derive(Debug, Clone)]
pub struct PurgeConfig {
    pub fixture_ids: Vec<String>,
    pub platform_api_version: String,
    pub timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            characters: IngestTarget::new(
                DEFAULT_CHARACTER_SOURCE_NAME,
                DEFAULT_CHARACTER_OBJECT_NAME,
            ),
            quotes: IngestTarget::new(DEFAULT_QUOTE_SOURCE_NAME, DEFAULT_QUOTE_OBJECT_NAME),
            batch_size: DEFAULT_BATCH_SIZE,
            max_records: DEFAULT_MAX_RECORDS,
            error_log_file: PathBuf::from(DEFAULT_ERROR_LOG_FILE),
            timeout_secs: DEFAULT_INGEST_TIMEOUT_SECS,
        }
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_poll_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            delete_offset: chrono::Duration::seconds(DEFAULT_DELETE_OFFSET_SECS),
            timeout_secs: DEFAULT_BULK_TIMEOUT_SECS,
            upload_timeout_secs: DEFAULT_BULK_UPLOAD_TIMEOUT_SECS,
        }
    }
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            fixture_ids: FIXTURE_CHARACTER_IDS.iter().map(|s| s.to_string()).collect(),
            platform_api_version: DEFAULT_PLATFORM_API_VERSION.to_string(),
            timeout_secs: DEFAULT_AUTH_TIMEOUT_SECS,
        }
    }
}

impl SourceConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            cache_max_age_hours: DEFAULT_CACHE_MAX_AGE_HOURS,
            page_delay: Duration::from_millis(500),
            endpoint_delay: Duration::from_secs(1),
            timeout_secs: DEFAULT_SOURCE_TIMEOUT_SECS,
        }
    }

    pub fn cache_file(&self) -> PathBuf {
        self.cache_dir.join("lotr_raw.json")
    }
}

impl AuthConfig {
    pub fn new(
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        fallback_instance_url: impl Into<String>,
    ) -> Self {
        Self {
            auth_url: auth_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            fallback_instance_url: fallback_instance_url.into(),
            timeout_secs: DEFAULT_AUTH_TIMEOUT_SECS,
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl SyncConfig {
    /// Load configuration from `.env` and the process environment, then validate it
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from the process environment only
    pub fn from_env() -> Result<Self> {
        let mut problems = Vec::new();

        let source = SourceConfig {
            api_key: env_or("LOTR_API_KEY", ""),
            base_url: env_or("LOTR_API_BASE_URL", DEFAULT_SOURCE_BASE_URL),
            cache_dir: PathBuf::from(env_or("CACHE_DIR", DEFAULT_CACHE_DIR)),
            cache_max_age_hours: env_parse(
                "CACHE_MAX_AGE_HOURS",
                DEFAULT_CACHE_MAX_AGE_HOURS,
                &mut problems,
            ),
            page_delay: Duration::from_millis(500),
            endpoint_delay: Duration::from_secs(1),
            timeout_secs: DEFAULT_SOURCE_TIMEOUT_SECS,
        };

        let auth = AuthConfig::new(
            env_or("DATA_CLOUD_AUTH_URL", DEFAULT_AUTH_URL),
            env_or("DATA_CLOUD_CLIENT_ID", ""),
            env_or("DATA_CLOUD_CLIENT_SECRET", ""),
            env_or("DATA_CLOUD_INGESTION_URL", ""),
        );

        let ingest = IngestConfig {
            characters: IngestTarget::new(
                env_or("DATA_CLOUD_SOURCE_NAME", DEFAULT_CHARACTER_SOURCE_NAME),
                env_or("DATA_CLOUD_OBJECT_NAME", DEFAULT_CHARACTER_OBJECT_NAME),
            ),
            quotes: IngestTarget::new(
                env_or("DATA_CLOUD_QUOTE_SOURCE_NAME", DEFAULT_QUOTE_SOURCE_NAME),
                env_or("DATA_CLOUD_QUOTE_OBJECT_NAME", DEFAULT_QUOTE_OBJECT_NAME),
            ),
            batch_size: env_parse("BATCH_SIZE", DEFAULT_BATCH_SIZE, &mut problems),
            max_records: env_parse("MAX_CHARACTERS", DEFAULT_MAX_RECORDS, &mut problems),
            error_log_file: PathBuf::from(env_or("ERROR_LOG_FILE", DEFAULT_ERROR_LOG_FILE)),
            timeout_secs: DEFAULT_INGEST_TIMEOUT_SECS,
        };

        let bulk = BulkConfig {
            poll_interval: Duration::from_secs(env_parse(
                "BULK_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
                &mut problems,
            )),
            max_poll_attempts: env_parse(
                "BULK_POLL_MAX_ATTEMPTS",
                DEFAULT_POLL_MAX_ATTEMPTS,
                &mut problems,
            ),
            delete_offset: chrono::Duration::seconds(env_parse(
                "BULK_DELETE_OFFSET_SECS",
                DEFAULT_DELETE_OFFSET_SECS,
                &mut problems,
            )),
            ..BulkConfig::default()
        };

        let purge = PurgeConfig {
            platform_api_version: env_or("SF_API_VERSION", DEFAULT_PLATFORM_API_VERSION),
            ..PurgeConfig::default()
        };

        let config = Self {
            source,
            auth,
            ingest,
            bulk,
            purge,
        };

        problems.extend(config.problems());
        if !problems.is_empty() {
            return Err(SyncError::config(format!(
                "configuration incomplete:\n  - {}",
                problems.join("\n  - ")
            )));
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(SyncError::config(problems.join("; ")))
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.source.api_key.is_empty() {
            problems.push("LOTR_API_KEY is missing".to_string());
        }
        if self.auth.client_id.is_empty() {
            problems.push("DATA_CLOUD_CLIENT_ID is missing".to_string());
        }
        if self.auth.client_secret.is_empty() {
            problems.push("DATA_CLOUD_CLIENT_SECRET is missing".to_string());
        }
        if self.auth.auth_url.is_empty() {
            problems.push("DATA_CLOUD_AUTH_URL is missing".to_string());
        }
        if self.auth.fallback_instance_url.is_empty() {
            problems.push("DATA_CLOUD_INGESTION_URL is missing".to_string());
        }
        if self.source.cache_max_age_hours < 0 {
            problems.push("CACHE_MAX_AGE_HOURS must be non-negative".to_string());
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.ingest.batch_size) {
            problems.push(format!("BATCH_SIZE must be between 1 and {}", MAX_BATCH_SIZE));
        }
        if self.ingest.max_records == 0 {
            problems.push("MAX_CHARACTERS must be positive".to_string());
        }
        if self.bulk.max_poll_attempts == 0 {
            problems.push("BULK_POLL_MAX_ATTEMPTS must be positive".to_string());
        }
        if self.bulk.delete_offset <= chrono::Duration::zero() {
            problems.push("BULK_DELETE_OFFSET_SECS must be positive".to_string());
        }

        problems
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T, problems: &mut Vec<String>) -> T {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                problems.push(format!("{} has an invalid value: {:?}", key, raw));
                default
            },
        },
        _ => default,
    }
}
