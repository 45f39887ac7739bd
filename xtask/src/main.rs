//! Build automation tasks for LDC
//!
//! - Generating the CLI reference from the clap definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for LDC", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<ldc_sync::Cli>();

    let content = format!(
        r#"# ldc-sync CLI Reference

Generated from the CLI source code on {}.

## Quick Start

```bash
cp .env.example .env   # fill in the source API key and destination credentials

# Fetch and cache the source data
ldc-sync fetch

# Ingest characters and their quotes
ldc-sync ingest

# Remove everything again (Ctrl-C stops waiting on bulk jobs)
ldc-sync delete
```

Every command prints its report as JSON on stdout and exits non-zero when
the report status is `error`.

## Commands

{}

## Environment Variables

- `LOTR_API_KEY` - source API key (required)
- `DATA_CLOUD_CLIENT_ID`, `DATA_CLOUD_CLIENT_SECRET` - connected app credentials (required)
- `DATA_CLOUD_INGESTION_URL` - destination base URL used when the token exchange returns none (required)
- `DATA_CLOUD_AUTH_URL` - identity endpoint (default: `https://login.salesforce.com`)
- `BATCH_SIZE` - records per ingestion call, 1 to 1000 (default: `200`)
- `BULK_POLL_INTERVAL_SECS`, `BULK_POLL_MAX_ATTEMPTS` - bulk job polling (default: `10`, `36`)
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`, `LOG_FILTER` - logging (`--verbose` forces debug)

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
