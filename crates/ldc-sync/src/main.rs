//! LDC Sync - Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use ldc_common::logging::{init_logging, LogConfig};
use ldc_common::ReportStatus;
use ldc_sync::config::SyncConfig;
use ldc_sync::context::SyncContext;
use ldc_sync::{Cli, Commands};
use serde::Serialize;
use serde_json::json;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // .env feeds logging as well as the pipeline configuration
    dotenvy::dotenv().ok();

    let log_config = LogConfig::for_cli("ldc-sync", cli.verbose);

    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        },
    };

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        },
    }
}

/// Run the command; `Ok(false)` when a report came back with `error` status.
async fn run(cli: Cli) -> Result<bool> {
    let config = SyncConfig::load().context("Invalid configuration")?;
    let context = SyncContext::build(config)?;

    match cli.command {
        Commands::Fetch { force_refresh } => {
            let snapshot = context.source.fetch_all(force_refresh).await?;
            print_json(&json!({
                "stats": snapshot.stats,
                "cachedAt": snapshot.cached_at,
            }))?;
            Ok(true)
        },
        Commands::Ingest {
            force_refresh,
            skip_quotes,
        } => {
            let snapshot = context.source.fetch_all(force_refresh).await?;
            info!(characters = snapshot.characters.len(), "Source data ready");

            let characters = context
                .pipeline
                .ingest_characters(&snapshot.characters)
                .await?;

            let quotes = if skip_quotes {
                None
            } else {
                Some(context.pipeline.ingest_quotes(&snapshot.characters).await?)
            };

            let ok = characters.status != ReportStatus::Error
                && quotes.as_ref().is_none_or(|q| q.status != ReportStatus::Error);

            print_json(&json!({
                "characters": characters,
                "quotes": quotes,
            }))?;
            Ok(ok)
        },
        Commands::Delete => {
            let cancel = CancellationToken::new();
            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Received Ctrl-C, stopping job polling");
                    signal_cancel.cancel();
                }
            });

            let report = context.purge.purge(&cancel).await;
            let ok = report.status != ReportStatus::Error;
            print_json(&report)?;
            Ok(ok)
        },
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
