//! Date range partitioning.
//!
//! The provider silently caps how many records a single request returns, so a long
//! historical range is split into calendar-aligned windows that are small enough to
//! stay under the cap. Output is deterministic given the same inputs.

use chrono::{Datelike, NaiveDate};

use crate::domain::{Granularity, TimeWindow};

/// Split `[start, end]` into contiguous, non-overlapping windows.
///
/// Every window lies inside a single calendar month (or year). The first window
/// begins at `start`, the last one is clipped to `end`. Returns no windows when
/// `start > end`.
pub fn partition(start: NaiveDate, end: NaiveDate, granularity: Granularity) -> Vec<TimeWindow> {
    let mut out = Vec::new();
    let mut cursor = start;

    while cursor <= end {
        let window_end = period_end(cursor, granularity).unwrap_or(end).min(end);
        out.push(TimeWindow::new(cursor, window_end));

        match window_end.succ_opt() {
            Some(next) => cursor = next,
            None => break,
        }
    }

    out
}

/// Last day of the calendar unit containing `date`.
fn period_end(date: NaiveDate, granularity: Granularity) -> Option<NaiveDate> {
    match granularity {
        Granularity::Month => {
            let (year, month) = if date.month() == 12 {
                (date.year() + 1, 1)
            } else {
                (date.year(), date.month() + 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt()
        }
        Granularity::Year => NaiveDate::from_ymd_opt(date.year(), 12, 31),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn assert_covers(windows: &[TimeWindow], start: NaiveDate, end: NaiveDate, granularity: Granularity) {
        assert_eq!(windows.first().unwrap().start, start);
        assert_eq!(windows.last().unwrap().end, end);
        for w in windows {
            assert!(w.start <= w.end, "inverted window {w}");
            match granularity {
                Granularity::Month => {
                    assert_eq!((w.start.year(), w.start.month()), (w.end.year(), w.end.month()));
                    assert!(w.days() <= 31);
                }
                Granularity::Year => {
                    assert_eq!(w.start.year(), w.end.year());
                    assert!(w.days() <= 366);
                }
            }
        }
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end.succ_opt().unwrap(), pair[1].start, "gap or overlap");
        }
    }

    #[test]
    fn monthly_windows_cover_range_exactly() {
        let cases = [
            (date(2021, 1, 1), date(2021, 12, 31)),
            (date(2021, 1, 15), date(2021, 3, 10)),
            (date(2019, 11, 30), date(2024, 2, 29)),
            (date(2023, 12, 31), date(2024, 1, 1)),
        ];
        for (start, end) in cases {
            let windows = partition(start, end, Granularity::Month);
            assert_covers(&windows, start, end, Granularity::Month);
        }
    }

    #[test]
    fn monthly_windows_are_full_months_in_the_middle() {
        let windows = partition(date(2021, 1, 15), date(2021, 4, 10), Granularity::Month);
        assert_eq!(
            windows,
            vec![
                TimeWindow::new(date(2021, 1, 15), date(2021, 1, 31)),
                TimeWindow::new(date(2021, 2, 1), date(2021, 2, 28)),
                TimeWindow::new(date(2021, 3, 1), date(2021, 3, 31)),
                TimeWindow::new(date(2021, 4, 1), date(2021, 4, 10)),
            ]
        );
    }

    #[test]
    fn leap_february_ends_on_29th() {
        let windows = partition(date(2024, 2, 1), date(2024, 3, 31), Granularity::Month);
        assert_eq!(windows[0].end, date(2024, 2, 29));
    }

    #[test]
    fn yearly_windows_clip_last_year() {
        let start = date(2021, 6, 1);
        let end = date(2023, 3, 15);
        let windows = partition(start, end, Granularity::Year);
        assert_covers(&windows, start, end, Granularity::Year);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[1], TimeWindow::new(date(2022, 1, 1), date(2022, 12, 31)));
    }

    #[test]
    fn single_day_and_inverted_ranges() {
        let day = date(2022, 7, 4);
        assert_eq!(partition(day, day, Granularity::Month), vec![TimeWindow::new(day, day)]);
        assert!(partition(date(2022, 7, 5), day, Granularity::Year).is_empty());
    }

    #[test]
    fn partition_is_deterministic() {
        let a = partition(date(2020, 2, 2), date(2022, 9, 9), Granularity::Month);
        let b = partition(date(2020, 2, 2), date(2022, 9, 9), Granularity::Month);
        assert_eq!(a, b);
    }
}
