//! Pivot long-form observations into the wide summary table and per-crop,
//! per-activity subsets.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::{info, warn};

use crate::domain::{Activity, ActivitySubset, Crop, Observation, SummaryRow};

#[derive(Debug, Clone, Default)]
pub struct Shaped {
    /// One row per `(date, crop, state, season)`, sorted by `(date, crop)`.
    pub summary: Vec<SummaryRow>,
    /// Non-empty subsets only.
    pub subsets: Vec<ActivitySubset>,
}

pub fn shape(observations: &[Observation], crops: &[Crop], activities: &[Activity]) -> Shaped {
    let summary = summarize(observations);
    info!("Created percentage summary with {} rows", summary.len());
    let subsets = subsets(&summary, crops, activities);
    Shaped { summary, subsets }
}

#[derive(Default)]
struct ActivityMeans {
    sums: [f64; 3],
    counts: [u32; 3],
}

impl ActivityMeans {
    fn add(&mut self, activity: Activity, value: f64) {
        let slot = slot(activity);
        self.sums[slot] += value;
        self.counts[slot] += 1;
    }

    /// Mean per activity; 0.0 when the activity was not reported.
    fn mean(&self, activity: Activity) -> f64 {
        let slot = slot(activity);
        match self.counts[slot] {
            0 => 0.0,
            n => self.sums[slot] / f64::from(n),
        }
    }
}

fn slot(activity: Activity) -> usize {
    match activity {
        Activity::Planting => 0,
        Activity::Harvest => 1,
        Activity::Commercialization => 2,
    }
}

/// Group by `(date, crop, state, season)` and average each activity.
///
/// Year and month derive from the date, so they do not split groups further.
pub fn summarize(observations: &[Observation]) -> Vec<SummaryRow> {
    let mut groups: BTreeMap<(NaiveDate, Crop, &str, &str), ActivityMeans> = BTreeMap::new();
    for obs in observations {
        groups
            .entry((obs.date, obs.crop, obs.state.as_str(), obs.season.as_str()))
            .or_default()
            .add(obs.activity, obs.value);
    }

    groups
        .into_iter()
        .map(|((date, crop, state, season), means)| {
            let mut row = SummaryRow::new(date, crop, state.to_string(), season.to_string());
            for activity in Activity::ALL {
                row.set_percentage(activity, means.mean(activity));
            }
            row
        })
        .collect()
}

/// For each requested `(crop, activity)`, the rows where that activity is `> 0`,
/// sorted by date. Empty combinations are logged and skipped.
pub fn subsets(summary: &[SummaryRow], crops: &[Crop], activities: &[Activity]) -> Vec<ActivitySubset> {
    let mut out = Vec::new();

    for crop in Crop::ALL.into_iter().filter(|c| crops.contains(c)) {
        if !summary.iter().any(|r| r.crop == crop) {
            warn!("No data for {crop}");
            continue;
        }

        for activity in Activity::ALL.into_iter().filter(|a| activities.contains(a)) {
            let mut rows: Vec<SummaryRow> = summary
                .iter()
                .filter(|r| r.crop == crop && r.percentage(activity) > 0.0)
                .cloned()
                .collect();

            if rows.is_empty() {
                warn!("No {} data for {crop}", activity.display_name().to_lowercase());
                continue;
            }

            rows.sort_by_key(|r| r.date);
            out.push(ActivitySubset { crop, activity, rows });
        }
    }

    out
}
