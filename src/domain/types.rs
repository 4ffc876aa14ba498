//! Shared domain types.
//!
//! Everything that flows between the pipeline stages lives here so the stages only
//! depend on this module and not on each other:
//!
//! - static configuration (`Crop`, `Activity`, `Indicator`)
//! - the extraction worklist (`TimeWindow`, `FetchTask`, `FetchOutcome`)
//! - reconciled and reshaped data (`Observation`, `SummaryRow`, `ActivitySubset`)
//! - run configuration (`ExtractConfig`, `FetchConfig`, `RetryPolicy`)

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// A single request returning this many records (or more) was probably cut short
/// by the provider.
pub const TRUNCATION_THRESHOLD: usize = 10;

/// Unit label the provider uses for percentage metrics.
pub const PERCENT_UNIT: &str = "Percentual";

/// Locality-type filter sent with every historical-series request (state level).
pub const LOCALITY_TYPE_STATE: &str = "1";

/// Default lookahead past today, to pick up near-future scheduled windows.
pub const DEFAULT_HORIZON_DAYS: i64 = 90;

pub const DEFAULT_WORKERS: usize = 15;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// First day covered when no `--start` is given.
pub fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Commodity tracked by the provider.
///
/// Variant order is alphabetical so derived `Ord` matches sorting by crop name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Crop {
    Corn,
    Cotton,
    Soy,
}

impl Crop {
    /// Order used when emitting per-crop datasets.
    pub const ALL: [Crop; 3] = [Crop::Soy, Crop::Corn, Crop::Cotton];

    pub fn display_name(self) -> &'static str {
        match self {
            Crop::Corn => "Corn",
            Crop::Cotton => "Cotton",
            Crop::Soy => "Soy",
        }
    }

    pub fn file_tag(self) -> &'static str {
        match self {
            Crop::Corn => "CORN",
            Crop::Cotton => "COTTON",
            Crop::Soy => "SOY",
        }
    }

    /// Provider "cadeia" id used by the price endpoints.
    pub fn chain_id(self) -> &'static str {
        match self {
            Crop::Cotton => "1",
            Crop::Corn => "3",
            Crop::Soy => "4",
        }
    }
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Progress activity reported per crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Activity {
    Planting,
    Harvest,
    Commercialization,
}

impl Activity {
    pub const ALL: [Activity; 3] = [Activity::Planting, Activity::Harvest, Activity::Commercialization];

    pub fn display_name(self) -> &'static str {
        match self {
            Activity::Planting => "Planting",
            Activity::Harvest => "Harvest",
            Activity::Commercialization => "Commercialization",
        }
    }

    pub fn file_tag(self) -> &'static str {
        match self {
            Activity::Planting => "PLANTING",
            Activity::Harvest => "HARVEST",
            Activity::Commercialization => "COMMERCIALIZATION",
        }
    }

    /// Column name of this activity in the wide summary table.
    pub fn summary_column(self) -> &'static str {
        match self {
            Activity::Planting => "planted_percentage",
            Activity::Harvest => "harvested_percentage",
            Activity::Commercialization => "commercialized_percentage",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Calendar unit used to split the overall extraction range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Month,
    Year,
}

/// One provider time series: a (crop, activity) pair and its remote id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Indicator {
    /// Stable local key, e.g. `soy_planting`.
    pub key: &'static str,
    /// Provider-assigned indicator id.
    pub id: &'static str,
    pub crop: Crop,
    pub activity: Activity,
}

/// Inclusive date range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// ISO start date; orders lexicographically the same way it orders in time.
    pub fn label(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    /// Number of days covered (inclusive).
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Unit of work for the fetcher: one request for one indicator over one window.
#[derive(Debug, Clone)]
pub struct FetchTask {
    pub indicator: Indicator,
    pub window: TimeWindow,
    pub locality_type: &'static str,
    /// Season filter, resolved once per run and shared by every task. Ids are
    /// sent back exactly as the provider listed them (number or string).
    pub season_ids: Arc<[Value]>,
}

impl FetchTask {
    pub fn label(&self) -> String {
        format!(
            "{} {} {}",
            self.indicator.crop, self.indicator.activity, self.window
        )
    }
}

#[derive(Debug, Clone)]
pub enum FetchStatus {
    Success { records: Vec<Value>, truncated: bool },
    Failure { reason: String },
}

/// Result of executing one `FetchTask`.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub task: FetchTask,
    pub status: FetchStatus,
    /// Requests issued for this task (1 unless retries are enabled).
    pub attempts: u32,
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, FetchStatus::Success { .. })
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self.status, FetchStatus::Success { truncated: true, .. })
    }

    pub fn records(&self) -> &[Value] {
        match &self.status {
            FetchStatus::Success { records, .. } => records,
            FetchStatus::Failure { .. } => &[],
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            FetchStatus::Failure { reason } => Some(reason),
            FetchStatus::Success { .. } => None,
        }
    }
}

/// One reported measurement, tagged with the task that fetched it.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub indicator: Indicator,
    pub crop: Crop,
    pub activity: Activity,
    pub value: f64,
    pub state: String,
    pub season: String,
    pub unit: Option<String>,
    /// Window of the request that returned this record.
    pub window: TimeWindow,
}

impl Observation {
    pub fn is_percentage(&self) -> bool {
        match &self.unit {
            Some(unit) => unit == PERCENT_UNIT,
            None => true,
        }
    }
}

/// Wide per-(date, crop, state, season) row.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub crop: Crop,
    pub state: String,
    pub season: String,
    pub planted: f64,
    pub harvested: f64,
    pub commercialized: f64,
}

impl SummaryRow {
    pub fn new(date: NaiveDate, crop: Crop, state: String, season: String) -> Self {
        Self {
            date,
            year: date.year(),
            month: date.month(),
            crop,
            state,
            season,
            planted: 0.0,
            harvested: 0.0,
            commercialized: 0.0,
        }
    }

    pub fn percentage(&self, activity: Activity) -> f64 {
        match activity {
            Activity::Planting => self.planted,
            Activity::Harvest => self.harvested,
            Activity::Commercialization => self.commercialized,
        }
    }

    pub fn set_percentage(&mut self, activity: Activity, value: f64) {
        match activity {
            Activity::Planting => self.planted = value,
            Activity::Harvest => self.harvested = value,
            Activity::Commercialization => self.commercialized = value,
        }
    }
}

/// Summary rows of one crop where one activity made progress.
#[derive(Debug, Clone)]
pub struct ActivitySubset {
    pub crop: Crop,
    pub activity: Activity,
    pub rows: Vec<SummaryRow>,
}

impl ActivitySubset {
    pub fn file_name(&self) -> String {
        format!(
            "BR_IMEA_{}_{}_PERCENTAGE.csv",
            self.crop.file_tag(),
            self.activity.file_tag()
        )
    }
}

/// Re-issue policy for failed fetch tasks. `max_retries == 0` disables retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(exp);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub workers: usize,
    pub batch_size: usize,
    pub truncation_threshold: usize,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            truncation_threshold: TRUNCATION_THRESHOLD,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

/// Fully resolved settings for one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub granularity: Granularity,
    pub crops: Vec<Crop>,
    pub activities: Vec<Activity>,
    pub fetch: FetchConfig,
    pub out_dir: PathBuf,
    pub write_aggregate: bool,
    pub write_detailed: bool,
    pub include_prices: bool,
}

impl ExtractConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.start > self.end {
            return Err(AppError::config(format!(
                "Start date {} is after end date {}.",
                self.start, self.end
            )));
        }
        if self.fetch.workers == 0 {
            return Err(AppError::config("Worker count must be > 0."));
        }
        if self.fetch.batch_size == 0 {
            return Err(AppError::config("Batch size must be > 0."));
        }
        if self.fetch.truncation_threshold == 0 {
            return Err(AppError::config("Truncation threshold must be > 0."));
        }
        if self.crops.is_empty() || self.activities.is_empty() {
            return Err(AppError::config("At least one crop and one activity are required."));
        }
        if !(self.fetch.retry.backoff_factor.is_finite() && self.fetch.retry.backoff_factor >= 1.0) {
            return Err(AppError::config("Retry backoff factor must be >= 1."));
        }
        Ok(())
    }
}
