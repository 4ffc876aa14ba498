//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - builds the provider client from the environment
//! - runs the extraction pipeline
//! - writes the datasets and prints the run summary

use std::path::Path;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::Parser;
use log::warn;

use crate::cli::{Command, ExtractArgs, PricesArgs};
use crate::data::{ImeaClient, PriceQuote, QuoteSource, fetch_current_prices};
use crate::domain::{Activity, Crop, DEFAULT_HORIZON_DAYS, ExtractConfig, FetchConfig, RetryPolicy, default_start};
use crate::error::AppError;
use crate::io::export::{self, PRICES_FILE, WrittenFile};

pub mod pipeline;

use pipeline::RunOutcome;

/// Entry point for the `imea` binary.
pub fn run() -> Result<(), AppError> {
    // `imea` and `imea --start ...` behave like `imea extract ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Extract(args) => handle_extract(args),
        Command::Prices(args) => handle_prices(args),
    }
}

fn handle_extract(args: ExtractArgs) -> Result<(), AppError> {
    let today = Local::now().date_naive();
    let config = extract_config_from_args(&args, today);
    config.validate()?;

    let client = ImeaClient::from_env(config.fetch.request_timeout, args.connection.insecure)?;
    let extracted_at = Local::now().naive_local();

    match pipeline::run_extraction(&config, &client)? {
        RunOutcome::Completed(output) => {
            let mut files = pipeline::persist(&output, &config, extracted_at)?;
            if config.include_prices {
                files.extend(write_prices(&client, &config.crops, &config.out_dir, extracted_at)?);
            }
            println!("{}", crate::report::format_run_summary(&output, &config, &files));
            Ok(())
        }
        RunOutcome::AuthFailed(err) => Err(err),
        RunOutcome::Empty(stats) => {
            println!("{}", crate::report::format_run_stats(&stats));
            Err(AppError::data("No percentage data extracted."))
        }
    }
}

fn handle_prices(args: PricesArgs) -> Result<(), AppError> {
    let client = ImeaClient::from_env(Duration::from_secs(args.connection.timeout_secs), args.connection.insecure)?;
    let crops = if args.crops.is_empty() { Crop::ALL.to_vec() } else { args.crops.clone() };

    let extracted_at = Local::now().naive_local();
    let quotes = fetch_current_prices(&client, &crops);
    let file = write_quotes(&quotes, &args.output.out_dir, extracted_at)?;
    println!("{}", crate::report::format_price_summary(&quotes, file.as_slice()));
    Ok(())
}

/// Fetch and write current quotes. No quotes at all only warns and writes nothing.
fn write_prices<Q>(
    source: &Q,
    crops: &[Crop],
    out_dir: &Path,
    extracted_at: NaiveDateTime,
) -> Result<Option<WrittenFile>, AppError>
where
    Q: QuoteSource + ?Sized,
{
    write_quotes(&fetch_current_prices(source, crops), out_dir, extracted_at)
}

fn write_quotes(
    quotes: &[PriceQuote],
    out_dir: &Path,
    extracted_at: NaiveDateTime,
) -> Result<Option<WrittenFile>, AppError> {
    if quotes.is_empty() {
        warn!("No price data retrieved; {PRICES_FILE} not written");
        return Ok(None);
    }
    export::ensure_dir(out_dir)?;
    export::write_prices_csv(&out_dir.join(PRICES_FILE), quotes, extracted_at).map(Some)
}

/// Resolve CLI args into a run configuration. `today` anchors the default end.
pub fn extract_config_from_args(args: &ExtractArgs, today: NaiveDate) -> ExtractConfig {
    ExtractConfig {
        start: args.start.unwrap_or_else(default_start),
        end: args
            .end
            .unwrap_or_else(|| today + chrono::Duration::days(DEFAULT_HORIZON_DAYS)),
        granularity: args.granularity,
        crops: if args.crops.is_empty() { Crop::ALL.to_vec() } else { args.crops.clone() },
        activities: if args.activities.is_empty() {
            Activity::ALL.to_vec()
        } else {
            args.activities.clone()
        },
        fetch: FetchConfig {
            workers: args.workers,
            batch_size: args.batch_size,
            truncation_threshold: args.truncation_threshold,
            request_timeout: Duration::from_secs(args.connection.timeout_secs),
            retry: RetryPolicy {
                max_retries: args.max_retries,
                ..RetryPolicy::default()
            },
        },
        out_dir: args.output.out_dir.clone(),
        write_aggregate: args.aggregate,
        write_detailed: args.detailed,
        include_prices: args.prices,
    }
}

/// Rewrite argv so `imea` defaults to `imea extract`.
///
/// Rules:
/// - `imea`                      -> `imea extract`
/// - `imea --start 2022-01-01`   -> `imea extract --start 2022-01-01`
/// - `imea --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("extract".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "extract".to_string());
    }

    argv
}
