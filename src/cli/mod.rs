//! Command-line parsing for the IMEA extractor.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! pipeline; `app` turns these args into a validated `ExtractConfig`.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{
    Activity, Crop, DEFAULT_BATCH_SIZE, DEFAULT_TIMEOUT_SECS, DEFAULT_WORKERS, Granularity, TRUNCATION_THRESHOLD,
};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "imea", version, about = "IMEA crop progress and price extractor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract planting/harvest/commercialization progress and write per-crop datasets.
    Extract(ExtractArgs),
    /// Fetch current price quotes only.
    Prices(PricesArgs),
}

/// Options for historical progress extraction.
#[derive(Debug, Parser, Clone)]
pub struct ExtractArgs {
    /// First day to extract (YYYY-MM-DD). Defaults to 2021-01-01.
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day to extract (YYYY-MM-DD). Defaults to today + 90 days.
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Size of each request window.
    #[arg(long, value_enum, default_value_t = Granularity::Month)]
    pub granularity: Granularity,

    /// Concurrent requests in flight.
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Requests submitted per batch (progress reporting granularity).
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Record count at which a response is assumed to be truncated by the provider.
    #[arg(long, default_value_t = TRUNCATION_THRESHOLD)]
    pub truncation_threshold: usize,

    /// Re-issue a failed request up to this many times (0 disables retries).
    #[arg(long, default_value_t = 0)]
    pub max_retries: u32,

    /// Restrict to these crops (repeatable; default all).
    #[arg(long = "crop", value_enum)]
    pub crops: Vec<Crop>,

    /// Restrict to these activities (repeatable; default all).
    #[arg(long = "activity", value_enum)]
    pub activities: Vec<Activity>,

    /// Also write the full summary table.
    #[arg(long)]
    pub aggregate: bool,

    /// Also write the reconciled long-form observations.
    #[arg(long)]
    pub detailed: bool,

    /// Also fetch current price quotes.
    #[arg(long)]
    pub prices: bool,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Options for price extraction.
#[derive(Debug, Parser, Clone)]
pub struct PricesArgs {
    /// Restrict to these crops (repeatable; default all).
    #[arg(long = "crop", value_enum)]
    pub crops: Vec<Crop>,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Directory the CSV datasets are written to.
    #[arg(short = 'o', long, default_value = "datasets")]
    pub out_dir: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct ConnectionArgs {
    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Skip TLS certificate verification.
    #[arg(long)]
    pub insecure: bool,
}
