//! Command-line interface.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "lianbo", author, version, about = "Archive daily Xinwen Lianbo transcripts into SQLite")]
pub struct Cli {
    /// Path to config.toml (defaults to the per-user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the database path from the config file
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Fetch and store one date
    Run {
        /// Date to fetch (YYYY-MM-DD), defaults to today in the broadcast's time zone
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Run even when the date is already complete
        #[arg(long)]
        force: bool,
    },

    /// Backfill a date range, oldest first
    Batch {
        /// First date (defaults to batch.default_start_date)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last date, inclusive (defaults to yesterday)
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Keep today and recent days up to date until interrupted
    Schedule,

    /// Print the stored items of a date in broadcast order
    List {
        #[arg(short, long)]
        date: NaiveDate,
    },

    /// Print one stored item as JSON
    Show { id: i64 },

    /// Delete every stored item of a date so it can be fetched again
    Purge {
        #[arg(short, long)]
        date: NaiveDate,
    },
}
