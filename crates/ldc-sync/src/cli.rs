//! Command-line interface

use clap::{Parser, Subcommand};

/// LDC Sync - move characters and quotes into the destination and back out
#[derive(Parser, Debug)]
#[command(name = "ldc-sync")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch characters, quotes and movies from the source API and print stats
    Fetch {
        /// Ignore the local cache
        #[arg(long)]
        force_refresh: bool,
    },

    /// Fetch, then ingest characters and their quotes into the destination
    Ingest {
        /// Ignore the local cache
        #[arg(long)]
        force_refresh: bool,

        /// Ingest characters only
        #[arg(long)]
        skip_quotes: bool,
    },

    /// Delete linked accounts, characters and quotes (Ctrl-C stops job polling)
    Delete,
}
