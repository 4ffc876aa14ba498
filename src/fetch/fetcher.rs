//! Bounded-concurrency execution of the fetch worklist.
//!
//! Tasks run on a dedicated rayon pool sized to the configured worker count. The
//! worklist is fed to the pool one fixed-size batch at a time; each worker returns
//! its outcome and the driver thread does all merging, so workers share nothing
//! mutable. Batch boundaries only affect progress logging.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;

use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::data::provider::Transport;
use crate::domain::{FetchConfig, FetchOutcome, FetchStatus, FetchTask};
use crate::error::AppError;

/// Failures logged individually per batch before going quiet.
const MAX_LOGGED_FAILURES: usize = 5;

/// Aggregate counts over a set of outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub truncated: usize,
    pub records_fetched: usize,
}

impl FetchStats {
    pub fn from_outcomes(outcomes: &[FetchOutcome]) -> Self {
        let mut stats = Self::default();
        for outcome in outcomes {
            stats.attempted += 1;
            if outcome.is_success() {
                stats.succeeded += 1;
                stats.records_fetched += outcome.records().len();
                if outcome.is_truncated() {
                    stats.truncated += 1;
                }
            } else {
                stats.failed += 1;
            }
        }
        stats
    }
}

pub struct ConcurrentFetcher {
    config: FetchConfig,
    pool: ThreadPool,
}

impl ConcurrentFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, AppError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("fetch-{i}"))
            .build()
            .map_err(|e| AppError::config(format!("Failed to build fetch worker pool: {e}")))?;
        Ok(Self { config, pool })
    }

    /// Execute every task; returns exactly one outcome per task.
    ///
    /// Outcomes come back in worklist order, though tasks may have run in any order.
    pub fn fetch_all<T>(&self, transport: &T, tasks: &[FetchTask]) -> Vec<FetchOutcome>
    where
        T: Transport + ?Sized,
    {
        let batch_size = self.config.batch_size.max(1);
        let total_batches = tasks.len().div_ceil(batch_size);
        info!(
            "Fetching {} tasks with {} workers in {} batches of up to {}",
            tasks.len(),
            self.pool.current_num_threads(),
            total_batches,
            batch_size
        );

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (idx, batch) in tasks.chunks(batch_size).enumerate() {
            info!("Processing batch {}/{} ({} requests)", idx + 1, total_batches, batch.len());

            let batch_outcomes: Vec<FetchOutcome> = self
                .pool
                .install(|| batch.par_iter().map(|task| self.execute(transport, task)).collect());

            log_batch(idx + 1, &batch_outcomes);
            outcomes.extend(batch_outcomes);
        }

        info!("Completed all {} requests", outcomes.len());
        outcomes
    }

    /// Run one task, re-issuing failures while the retry policy allows.
    fn execute<T>(&self, transport: &T, task: &FetchTask) -> FetchOutcome
    where
        T: Transport + ?Sized,
    {
        let policy = &self.config.retry;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.attempt(transport, task) {
                FetchStatus::Failure { reason } if attempts <= policy.max_retries => {
                    let delay = policy.delay_for(attempts);
                    debug!(
                        "Retrying {} after failure ({reason}), attempt {}/{} in {:?}",
                        task.label(),
                        attempts + 1,
                        policy.max_retries + 1,
                        delay
                    );
                    thread::sleep(delay);
                }
                status => {
                    return FetchOutcome {
                        task: task.clone(),
                        status,
                        attempts,
                    };
                }
            }
        }
    }

    fn attempt<T>(&self, transport: &T, task: &FetchTask) -> FetchStatus
    where
        T: Transport + ?Sized,
    {
        // A panicking transport becomes a failed task.
        let sent = catch_unwind(AssertUnwindSafe(|| transport.send(task)))
            .unwrap_or_else(|_| Err("transport panicked".to_string()));

        match sent {
            Ok(resp) if resp.is_success() => {
                let count = resp.records.len();
                let truncated = count >= self.config.truncation_threshold;
                if truncated {
                    warn!(
                        "Hit {}-record limit: {}: {count} records (may be missing data)",
                        self.config.truncation_threshold,
                        task.label()
                    );
                } else if count > 0 {
                    debug!("{}: {count} records", task.label());
                }
                FetchStatus::Success {
                    records: resp.records,
                    truncated,
                }
            }
            Ok(resp) => FetchStatus::Failure {
                reason: format!("HTTP {}", resp.status),
            },
            Err(reason) => FetchStatus::Failure { reason },
        }
    }
}

fn log_batch(batch_no: usize, outcomes: &[FetchOutcome]) {
    let stats = FetchStats::from_outcomes(outcomes);

    for outcome in outcomes.iter().filter(|o| !o.is_success()).take(MAX_LOGGED_FAILURES) {
        warn!(
            "Failed: {}: {}",
            outcome.task.label(),
            outcome.failure_reason().unwrap_or("unknown error")
        );
    }

    info!(
        "Batch {batch_no} completed: {} success, {} failed, {} records",
        stats.succeeded, stats.failed, stats.records_fetched
    );
    if stats.truncated > 0 {
        warn!(
            "{} requests in batch {batch_no} hit the record limit (may be missing data)",
            stats.truncated
        );
    }
}
