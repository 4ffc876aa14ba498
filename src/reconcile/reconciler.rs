//! Merge per-task results into one deduplicated observation set.
//!
//! Adjacent or overlapping request windows can return the same observation more
//! than once. Observations are considered identical when `(date, indicator,
//! value)` match; among identical ones the copy from the latest window is kept.
//! That tie-break is a last-write-wins policy and has not been checked against
//! ground truth.
//!
//! A record without a unit counts as a percentage even when other records in the
//! same run carry one; only an explicit non-`Percentual` unit is dropped.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use log::{info, warn};
use serde_json::Value;

use crate::data::catalog::{DEFAULT_STATE, state_name};
use crate::data::fields::{as_text, parse_date, parse_number};
use crate::domain::{Activity, Crop, FetchOutcome, FetchTask, Observation};

/// Malformed records logged individually before going quiet.
const MAX_LOGGED_ANOMALIES: usize = 5;

const UNKNOWN_SEASON: &str = "Unknown";

/// Reconciled observations plus the bookkeeping needed for the run summary.
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    /// Deduplicated percentage observations sorted by `(date, indicator)`.
    pub observations: Vec<Observation>,
    /// Raw records across all successful tasks.
    pub records_fetched: usize,
    /// Records skipped for a missing/invalid date or value.
    pub malformed: usize,
    pub duplicates_removed: usize,
    /// Valid records dropped because their unit is not a percentage.
    pub non_percentage: usize,
}

pub fn reconcile(outcomes: &[FetchOutcome]) -> Reconciled {
    let mut flat = Vec::new();
    let mut records_fetched = 0usize;
    let mut malformed = 0usize;

    for outcome in outcomes.iter().filter(|o| o.is_success()) {
        for record in outcome.records() {
            records_fetched += 1;
            match parse_observation(record, &outcome.task) {
                Ok(obs) => flat.push(obs),
                Err(reason) => {
                    malformed += 1;
                    if malformed <= MAX_LOGGED_ANOMALIES {
                        warn!("Skipping record from {}: {reason}", outcome.task.label());
                    }
                }
            }
        }
    }
    if malformed > 0 {
        warn!("{malformed} malformed records skipped during reconciliation");
    }

    let before = flat.len();
    let deduped = dedup(flat);
    let duplicates_removed = before - deduped.len();
    info!("After deduplication: {before} -> {} unique records", deduped.len());

    let (observations, dropped): (Vec<_>, Vec<_>) = deduped.into_iter().partition(Observation::is_percentage);
    if !dropped.is_empty() {
        info!("Dropped {} non-percentage records", dropped.len());
    }

    log_breakdown(&observations);

    Reconciled {
        observations,
        records_fetched,
        malformed,
        duplicates_removed,
        non_percentage: dropped.len(),
    }
}

/// Sort by `(date, indicator, window)` and keep the last copy of each
/// `(date, indicator, value)`. Idempotent.
pub fn dedup(mut observations: Vec<Observation>) -> Vec<Observation> {
    // Window labels are ISO start dates, so ordering by start is ordering by label.
    observations.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.indicator.key.cmp(b.indicator.key))
            .then_with(|| a.window.start.cmp(&b.window.start))
    });

    let mut last_seen: HashMap<DedupKey, usize> = HashMap::with_capacity(observations.len());
    for (idx, obs) in observations.iter().enumerate() {
        last_seen.insert(DedupKey::of(obs), idx);
    }

    observations
        .into_iter()
        .enumerate()
        .filter(|(idx, obs)| last_seen.get(&DedupKey::of(obs)) == Some(idx))
        .map(|(_, obs)| obs)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DedupKey {
    date: NaiveDate,
    indicator: &'static str,
    value_bits: u64,
}

impl DedupKey {
    fn of(obs: &Observation) -> Self {
        // -0.0 and 0.0 are the same reported value.
        let value = if obs.value == 0.0 { 0.0 } else { obs.value };
        Self {
            date: obs.date,
            indicator: obs.indicator.key,
            value_bits: value.to_bits(),
        }
    }
}

/// Turn one raw provider record into an `Observation` tagged with its task.
pub fn parse_observation(record: &Value, task: &FetchTask) -> Result<Observation, String> {
    if !record.is_object() {
        return Err("record is not an object".to_string());
    }

    let date = record
        .get("Data")
        .and_then(parse_date)
        .ok_or_else(|| format!("missing or invalid date {}", field_repr(record, "Data")))?;
    let value = record
        .get("Valor")
        .and_then(parse_number)
        .ok_or_else(|| format!("missing or non-numeric value {}", field_repr(record, "Valor")))?;

    let state = match record.get("EstadoId").and_then(as_text) {
        Some(id) => state_name(&id),
        None => DEFAULT_STATE.to_string(),
    };

    Ok(Observation {
        date,
        indicator: task.indicator,
        crop: task.indicator.crop,
        activity: task.indicator.activity,
        value,
        state,
        season: record
            .get("SafraDescricao")
            .and_then(as_text)
            .unwrap_or_else(|| UNKNOWN_SEASON.to_string()),
        unit: record.get("UnidadeDescricao").and_then(as_text),
        window: task.window,
    })
}

fn field_repr(record: &Value, field: &str) -> String {
    record
        .get(field)
        .map(Value::to_string)
        .unwrap_or_else(|| "<absent>".to_string())
}

fn log_breakdown(observations: &[Observation]) {
    let mut counts: BTreeMap<(Crop, Activity), usize> = BTreeMap::new();
    for obs in observations {
        *counts.entry((obs.crop, obs.activity)).or_default() += 1;
    }
    info!("Reconciled {} percentage records", observations.len());
    for ((crop, activity), count) in counts {
        info!("  {crop} {activity}: {count} records");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::{FetchStatus, TimeWindow};
    use crate::test_support::{date, indicator, monthly_tasks, series_record};

    fn success(task: FetchTask, records: Vec<Value>) -> FetchOutcome {
        FetchOutcome {
            task,
            status: FetchStatus::Success { records, truncated: false },
            attempts: 1,
        }
    }

    fn task_with_window(window: TimeWindow) -> FetchTask {
        let mut task = monthly_tasks(1).remove(0);
        task.window = window;
        task
    }

    #[test]
    fn duplicate_keeps_copy_from_later_window() {
        let early = task_with_window(TimeWindow::new(date(2021, 1, 1), date(2021, 1, 31)));
        let late = task_with_window(TimeWindow::new(date(2021, 1, 10), date(2021, 2, 28)));

        // Listed late-first so the winner is decided by window, not input order.
        let outcomes = vec![
            success(late, vec![series_record("2021-01-15", 40.0, "late")]),
            success(early, vec![series_record("2021-01-15", 40.0, "early")]),
        ];

        let out = reconcile(&outcomes);
        assert_eq!(out.records_fetched, 2);
        assert_eq!(out.duplicates_removed, 1);
        assert_eq!(out.observations.len(), 1);
        assert_eq!(out.observations[0].season, "late");
        assert_eq!(out.observations[0].window.start, date(2021, 1, 10));
    }

    #[test]
    fn different_values_on_same_date_are_kept() {
        let tasks = monthly_tasks(1);
        let outcomes = vec![success(
            tasks[0].clone(),
            vec![
                series_record("2021-01-15", 40.0, "20/21"),
                series_record("2021-01-15", 41.0, "20/21"),
            ],
        )];
        assert_eq!(reconcile(&outcomes).observations.len(), 2);
    }

    #[test]
    fn dedup_is_idempotent() {
        let tasks = monthly_tasks(3);
        let mut outcomes = Vec::new();
        for task in &tasks {
            outcomes.push(success(
                task.clone(),
                vec![
                    series_record("2021-01-31", 10.0, "20/21"),
                    series_record("2021-02-01", 12.0, "20/21"),
                    series_record("2021-03-01", 12.0, "20/21"),
                ],
            ));
        }

        let once = reconcile(&outcomes).observations;
        assert_eq!(once.len(), 3);
        let twice = dedup(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn output_sorted_by_date_then_indicator() {
        let soy = monthly_tasks(1).remove(0);
        let mut corn = soy.clone();
        corn.indicator = indicator(Crop::Corn, Activity::Harvest);

        let outcomes = vec![
            success(soy, vec![series_record("2021-01-20", 5.0, "s"), series_record("2021-01-10", 1.0, "s")]),
            success(corn, vec![series_record("2021-01-20", 7.0, "s")]),
        ];

        let obs = reconcile(&outcomes).observations;
        let keys: Vec<(NaiveDate, &str)> = obs.iter().map(|o| (o.date, o.indicator.key)).collect();
        assert_eq!(
            keys,
            vec![
                (date(2021, 1, 10), "soy_planting"),
                (date(2021, 1, 20), "corn_harvest"),
                (date(2021, 1, 20), "soy_planting"),
            ]
        );
    }

    #[test]
    fn failures_ignored_and_malformed_records_skipped() {
        let tasks = monthly_tasks(2);
        let outcomes = vec![
            success(
                tasks[0].clone(),
                vec![
                    series_record("2021-01-15", 40.0, "20/21"),
                    json!({"Valor": 3.0}),
                    json!({"Data": "2021-01-16", "Valor": "n/a"}),
                    json!(42),
                ],
            ),
            FetchOutcome {
                task: tasks[1].clone(),
                status: FetchStatus::Failure { reason: "HTTP 500".to_string() },
                attempts: 1,
            },
        ];

        let out = reconcile(&outcomes);
        assert_eq!(out.records_fetched, 4);
        assert_eq!(out.malformed, 3);
        assert_eq!(out.observations.len(), 1);
    }

    #[test]
    fn non_percentage_units_are_dropped() {
        let task = monthly_tasks(1).remove(0);
        let mut priced = series_record("2021-01-15", 120.0, "20/21");
        priced["UnidadeDescricao"] = json!("R$/sc");
        let mut unitless = series_record("2021-01-16", 3.0, "20/21");
        unitless.as_object_mut().unwrap().remove("UnidadeDescricao");

        let out = reconcile(&[success(task, vec![priced, unitless])]);
        assert_eq!(out.non_percentage, 1);
        assert_eq!(out.observations.len(), 1);
        assert_eq!(out.observations[0].date, date(2021, 1, 16));
    }

    #[test]
    fn parse_observation_fills_defaults() {
        let task = monthly_tasks(1).remove(0);
        let obs = parse_observation(&json!({"Data": "2021-01-05", "Valor": "12,5"}), &task).unwrap();
        assert_eq!(obs.value, 12.5);
        assert_eq!(obs.state, "Mato Grosso");
        assert_eq!(obs.season, "Unknown");
        assert_eq!(obs.unit, None);
        assert_eq!(obs.crop, Crop::Soy);
        assert_eq!(obs.activity, Activity::Planting);
    }
}
