//! Worklist construction: indicators × windows.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::{FetchTask, Indicator, LOCALITY_TYPE_STATE, TimeWindow};

/// Build one task per (indicator, window) pair, indicator-major.
///
/// The season list is resolved once by the caller and shared by all tasks.
pub fn plan(indicators: &[Indicator], windows: &[TimeWindow], season_ids: Vec<Value>) -> Vec<FetchTask> {
    let season_ids: Arc<[Value]> = season_ids.into();
    let mut tasks = Vec::with_capacity(indicators.len() * windows.len());

    for indicator in indicators {
        for window in windows {
            tasks.push(FetchTask {
                indicator: *indicator,
                window: *window,
                locality_type: LOCALITY_TYPE_STATE,
                season_ids: Arc::clone(&season_ids),
            });
        }
    }

    tasks
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;
    use crate::data::catalog::INDICATORS;
    use crate::domain::Granularity;
    use crate::plan::partition;

    #[test]
    fn worklist_is_full_cross_product() {
        let windows = partition(
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 6, 30).unwrap(),
            Granularity::Month,
        );
        let tasks = plan(&INDICATORS, &windows, vec![json!(7), json!("8")]);

        assert_eq!(tasks.len(), INDICATORS.len() * windows.len());

        let pairs: HashSet<(&str, TimeWindow)> = tasks.iter().map(|t| (t.indicator.key, t.window)).collect();
        assert_eq!(pairs.len(), tasks.len(), "duplicate (indicator, window) pair");

        for task in &tasks {
            assert_eq!(task.locality_type, "1");
            assert_eq!(&*task.season_ids, &[json!(7), json!("8")]);
        }
    }

    #[test]
    fn order_is_stable_and_indicator_major() {
        let windows = partition(
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 2, 28).unwrap(),
            Granularity::Month,
        );
        let tasks = plan(&INDICATORS[..2], &windows, Vec::new());
        let keys: Vec<(&str, u32)> = tasks
            .iter()
            .map(|t| (t.indicator.key, chrono::Datelike::month(&t.window.start)))
            .collect();
        assert_eq!(
            keys,
            vec![
                (INDICATORS[0].key, 1),
                (INDICATORS[0].key, 2),
                (INDICATORS[1].key, 1),
                (INDICATORS[1].key, 2),
            ]
        );
    }

    #[test]
    fn empty_inputs_give_empty_worklist() {
        assert!(plan(&INDICATORS, &[], Vec::new()).is_empty());
        assert!(plan(&[], &[TimeWindow::new(NaiveDate::MIN, NaiveDate::MIN)], Vec::new()).is_empty());
    }
}
