//! Shared extraction pipeline.
//!
//! Keeping the whole workflow in one place keeps the CLI handlers thin:
//! authenticate -> partition -> plan -> fetch -> reconcile -> shape
//!
//! Persisting is a separate step so callers can inspect a run before writing.

use std::path::Path;

use chrono::NaiveDateTime;
use log::{error, info, warn};
use serde_json::Value;

use crate::data::catalog;
use crate::data::provider::{Authenticator, Session, Transport};
use crate::domain::{ExtractConfig, FetchOutcome, Observation};
use crate::error::AppError;
use crate::fetch::{ConcurrentFetcher, FetchStats};
use crate::io::export::{self, DETAILED_FILE, SUMMARY_FILE, WrittenFile};
use crate::plan::{partition, plan};
use crate::reconcile::reconcile;
use crate::shape::{Shaped, shape};

/// Counts reported at the end of every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub windows: usize,
    pub indicators: usize,
    pub tasks_attempted: usize,
    pub tasks_succeeded: usize,
    pub tasks_failed: usize,
    pub tasks_truncated: usize,
    pub records_fetched: usize,
    pub records_malformed: usize,
    pub records_duplicate: usize,
    /// Valid records dropped for a non-percentage unit.
    pub records_non_percentage: usize,
    pub records_after_dedup: usize,
    pub summary_rows: usize,
}

/// All computed outputs of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub stats: RunStats,
    pub observations: Vec<Observation>,
    pub shaped: Shaped,
    /// Failed tasks, kept so an operator can decide what to re-run.
    pub failures: Vec<FetchOutcome>,
    /// Labels of successful tasks that hit the record limit.
    pub truncated: Vec<String>,
}

/// Run-level result. Task failures never show up here; they are counted in
/// `RunStats`.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunOutput),
    /// No session could be obtained; nothing was fetched.
    AuthFailed(AppError),
    /// Every task ran but nothing survived reconciliation.
    Empty(RunStats),
}

/// Authenticate, then run the pipeline with the resulting session.
pub fn run_extraction<A: Authenticator>(config: &ExtractConfig, auth: &A) -> Result<RunOutcome, AppError> {
    config.validate()?;

    let session = match auth.authenticate() {
        Ok(session) => session,
        Err(e) => {
            error!("Authentication failed, no requests issued: {e}");
            return Ok(RunOutcome::AuthFailed(e));
        }
    };

    let season_ids = session.season_ids();
    run_with_transport(config, &session, season_ids)
}

/// Execute the pipeline against an already-authenticated transport.
pub fn run_with_transport<T>(
    config: &ExtractConfig,
    transport: &T,
    season_ids: Vec<Value>,
) -> Result<RunOutcome, AppError>
where
    T: Transport + ?Sized,
{
    config.validate()?;
    info!(
        "Extracting {} to {} by {:?}",
        config.start, config.end, config.granularity
    );

    // 1) Partition and plan.
    let windows = partition(config.start, config.end, config.granularity);
    let indicators = catalog::select(&config.crops, &config.activities);
    let tasks = plan(&indicators, &windows, season_ids);
    info!(
        "Planned {} requests ({} indicators x {} windows)",
        tasks.len(),
        indicators.len(),
        windows.len()
    );

    // 2) Fetch.
    let fetcher = ConcurrentFetcher::new(config.fetch.clone())?;
    let outcomes = fetcher.fetch_all(transport, &tasks);
    let fetch_stats = FetchStats::from_outcomes(&outcomes);
    if fetch_stats.truncated > 0 {
        warn!(
            "{} requests hit the {}-record limit; data may be incomplete",
            fetch_stats.truncated, config.fetch.truncation_threshold
        );
    }
    if fetch_stats.failed > 0 {
        warn!("{} of {} requests failed", fetch_stats.failed, fetch_stats.attempted);
    }

    // 3) Reconcile and shape.
    let reconciled = reconcile(&outcomes);
    let shaped = shape(&reconciled.observations, &config.crops, &config.activities);

    let stats = RunStats {
        windows: windows.len(),
        indicators: indicators.len(),
        tasks_attempted: fetch_stats.attempted,
        tasks_succeeded: fetch_stats.succeeded,
        tasks_failed: fetch_stats.failed,
        tasks_truncated: fetch_stats.truncated,
        records_fetched: reconciled.records_fetched,
        records_malformed: reconciled.malformed,
        records_duplicate: reconciled.duplicates_removed,
        records_non_percentage: reconciled.non_percentage,
        records_after_dedup: reconciled.observations.len(),
        summary_rows: shaped.summary.len(),
    };

    if reconciled.observations.is_empty() {
        warn!("No historical percentage data retrieved");
        return Ok(RunOutcome::Empty(stats));
    }

    let truncated = outcomes
        .iter()
        .filter(|o| o.is_truncated())
        .map(|o| o.task.label())
        .collect();
    let failures = outcomes.into_iter().filter(|o| !o.is_success()).collect();

    Ok(RunOutcome::Completed(RunOutput {
        stats,
        observations: reconciled.observations,
        shaped,
        failures,
        truncated,
    }))
}

/// Write the run's datasets into `config.out_dir`.
///
/// Always writes the non-empty subsets; the aggregate and detailed tables are
/// opt-in.
pub fn persist(
    output: &RunOutput,
    config: &ExtractConfig,
    extracted_at: NaiveDateTime,
) -> Result<Vec<WrittenFile>, AppError> {
    let dir: &Path = &config.out_dir;
    export::ensure_dir(dir)?;

    let mut written = Vec::new();
    for subset in &output.shaped.subsets {
        let file = export::write_subset_csv(&dir.join(subset.file_name()), subset)?;
        info!(
            "Saved {} {}: {} records to {}",
            subset.crop,
            subset.activity,
            file.rows,
            file.path.display()
        );
        written.push(file);
    }

    if config.write_aggregate {
        written.push(export::write_summary_csv(&dir.join(SUMMARY_FILE), &output.shaped.summary)?);
    }
    if config.write_detailed {
        written.push(export::write_detailed_csv(
            &dir.join(DETAILED_FILE),
            &output.observations,
            extracted_at,
        )?);
    }

    Ok(written)
}
