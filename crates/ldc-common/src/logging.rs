//! Logging configuration and initialization
//!
//! All LDC binaries log through `tracing`. Output can go to stderr, to a
//! daily rolling file, or both, as human-readable text or JSON. Stdout is
//! left to the command's own report output.
//!
//! Never log credentials: tokens, client secrets and API keys stay out of
//! every field and message.
//!
//! # Example
//!
//! ```no_run
//! use ldc_common::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::for_cli("ldc-sync", false);
//!     let _guard = init_logging(&config)?;
//!
//!     info!("Sync started");
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::Directive,
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Connection-level chatter from the HTTP stack, hidden unless verbose
const HTTP_STACK_DIRECTIVES: &[&str] = &["hyper=warn", "hyper_util=warn", "h2=warn", "reqwest=info"];

/// Look `value` up in a table of accepted spellings, case-insensitively
fn parse_setting<T: Copy>(setting: &str, value: &str, accepted: &[(&str, T)]) -> Result<T> {
    let wanted = value.trim().to_ascii_lowercase();
    accepted
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, parsed)| *parsed)
        .ok_or_else(|| anyhow!("Invalid {}: {}", setting, value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_setting(
            "log level",
            s,
            &[
                ("trace", LogLevel::Trace),
                ("debug", LogLevel::Debug),
                ("info", LogLevel::Info),
                ("warn", LogLevel::Warn),
                ("warning", LogLevel::Warn),
                ("error", LogLevel::Error),
            ],
        )
    }
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    #[default]
    Stderr,
    File,
    Both,
}

impl LogOutput {
    fn stderr(self) -> bool {
        matches!(self, LogOutput::Stderr | LogOutput::Both)
    }

    fn file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl std::str::FromStr for LogOutput {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_setting(
            "log output",
            s,
            &[
                ("console", LogOutput::Stderr),
                ("stderr", LogOutput::Stderr),
                ("file", LogOutput::File),
                ("both", LogOutput::Both),
            ],
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_setting("log format", s, &[("text", LogFormat::Text), ("json", LogFormat::Json)])
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub output: LogOutput,
    pub format: LogFormat,
    /// Directory for rolling log files
    pub log_dir: PathBuf,
    /// File name prefix; the appender adds the date, e.g. `ldc-sync.2025-01-18`
    pub log_file_prefix: String,
    /// Extra directives such as `ldc_sync::bulk=trace`
    pub filter_directives: Option<String>,
    /// Hide connection-level logs from the HTTP stack
    pub quiet_http: bool,
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            output: LogOutput::Stderr,
            format: LogFormat::Text,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "ldc".to_string(),
            filter_directives: None,
            quiet_http: true,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Configuration for a command-line binary.
    ///
    /// Environment variables are applied first; if any of them is invalid the
    /// problem is reported on stderr and the defaults are kept. `verbose` then
    /// forces debug level and lets HTTP stack logs through.
    pub fn for_cli(prefix: &str, verbose: bool) -> Self {
        let base = Self::builder().log_file_prefix(prefix).build();

        let mut config = match base.clone().merge_env() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: ignoring logging environment: {:#}", e);
                base
            },
        };

        if verbose {
            config.level = LogLevel::Debug;
            config.quiet_http = false;
        }

        config
    }

    /// Load configuration from environment variables
    ///
    /// - `LOG_LEVEL`: trace, debug, info, warn, error
    /// - `LOG_OUTPUT`: console, file, both
    /// - `LOG_FORMAT`: text, json
    /// - `LOG_DIR`, `LOG_FILE_PREFIX`, `LOG_FILTER`
    /// - `LOG_INCLUDE_LOCATION`: true/false
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env()
    }

    /// Override fields with the logging variables present in the environment
    pub fn merge_env(mut self) -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(level) = var("LOG_LEVEL") {
            self.level = level.parse()?;
        }
        if let Some(output) = var("LOG_OUTPUT") {
            self.output = output.parse()?;
        }
        if let Some(format) = var("LOG_FORMAT") {
            self.format = format.parse()?;
        }
        if let Some(dir) = var("LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = var("LOG_FILE_PREFIX") {
            self.log_file_prefix = prefix;
        }
        if let Some(filter) = var("LOG_FILTER") {
            self.filter_directives = Some(filter);
        }
        if let Some(flag) = var("LOG_INCLUDE_LOCATION") {
            self.include_location = flag
                .parse()
                .with_context(|| format!("Invalid LOG_INCLUDE_LOCATION: {}", flag))?;
        }

        Ok(self)
    }

    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    /// Directives in order: level, HTTP stack, then user supplied. Applied on top of `RUST_LOG`.
    fn directives(&self) -> Vec<String> {
        let mut directives = vec![Level::from(self.level).to_string().to_lowercase()];

        if self.quiet_http {
            directives.extend(HTTP_STACK_DIRECTIVES.iter().map(|d| d.to_string()));
        }

        if let Some(extra) = &self.filter_directives {
            directives.extend(
                extra
                    .split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string),
            );
        }

        directives
    }

    fn filter(&self) -> Result<EnvFilter> {
        self.directives()
            .iter()
            .try_fold(EnvFilter::from_default_env(), |filter, directive| {
                let parsed = directive
                    .parse::<Directive>()
                    .with_context(|| format!("Invalid filter directive: {}", directive))?;
                Ok(filter.add_directive(parsed))
            })
    }

    fn layer<W>(&self, writer: W, ansi: bool) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(ansi);

        match self.format {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.json().with_current_span(true).boxed(),
        }
    }
}

#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    pub fn log_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.log_file_prefix = prefix.into();
        self
    }

    pub fn quiet_http(mut self, quiet: bool) -> Self {
        self.config.quiet_http = quiet;
        self
    }

    pub fn filter_directives(mut self, filter: impl Into<String>) -> Self {
        self.config.filter_directives = Some(filter.into());
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Keeps the non-blocking file writer alive. Drop it only at shutdown.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global tracing subscriber. Call once at startup.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuard> {
    let filter = config.filter()?;
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut file_guard = None;

    if config.output.stderr() {
        layers.push(config.layer(std::io::stderr, true));
    }

    if config.output.file() {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("Failed to create log directory {}", config.log_dir.display()))?;

        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);
        layers.push(config.layer(writer, false));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LoggingGuard { _file: file_guard })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_parse_case_insensitively() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" Json ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("console".parse::<LogOutput>().unwrap(), LogOutput::Stderr);

        let err = "loud".parse::<LogLevel>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid log level: loud");
    }

    #[test]
    fn test_output_targets() {
        assert!(LogOutput::Both.stderr() && LogOutput::Both.file());
        assert!(!LogOutput::File.stderr() && LogOutput::File.file());
        assert!(LogOutput::Stderr.stderr() && !LogOutput::Stderr.file());
    }

    #[test]
    fn test_quiet_http_directives() {
        let quiet = LogConfig::builder().build();
        assert_eq!(quiet.directives()[0], "info");
        assert!(quiet.directives().contains(&"hyper=warn".to_string()));

        let verbose = LogConfig::builder()
            .level(LogLevel::Debug)
            .quiet_http(false)
            .build();
        assert_eq!(verbose.directives(), vec!["debug".to_string()]);
    }

    #[test]
    fn test_user_directives_come_last() {
        let config = LogConfig::builder()
            .output(LogOutput::File)
            .log_file_prefix("ldc-sync")
            .filter_directives("ldc_sync::bulk=trace, ,reqwest=debug")
            .build();

        let directives = config.directives();
        assert_eq!(
            &directives[directives.len() - 2..],
            &["ldc_sync::bulk=trace".to_string(), "reqwest=debug".to_string()]
        );
        assert_eq!(config.log_file_prefix, "ldc-sync");
        assert!(config.filter().is_ok());
    }

    #[test]
    fn test_verbose_cli_config() {
        let config = LogConfig::for_cli("ldc-sync", true);
        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.quiet_http);
        assert_eq!(config.log_file_prefix, "ldc-sync");
    }

    #[test]
    fn test_invalid_filter_directive_rejected() {
        let config = LogConfig::builder()
            .filter_directives("ldc_sync=verbose")
            .build();
        assert!(config.filter().is_err());
    }
}
