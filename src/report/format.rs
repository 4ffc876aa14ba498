//! Formatted terminal output for extraction and price runs.

use std::collections::{BTreeMap, BTreeSet};

use crate::app::pipeline::{RunOutput, RunStats};
use crate::data::PriceQuote;
use crate::domain::{Activity, Crop, ExtractConfig};
use crate::io::export::WrittenFile;

/// Failed tasks listed by name before summarizing the rest as a count.
const MAX_LISTED_TASKS: usize = 10;

/// Task and record counts common to every run outcome.
pub fn format_run_stats(stats: &RunStats) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Requests: {} attempted ({} indicators x {} windows), {} succeeded, {} failed, {} truncated\n",
        stats.tasks_attempted,
        stats.indicators,
        stats.windows,
        stats.tasks_succeeded,
        stats.tasks_failed,
        stats.tasks_truncated
    ));
    out.push_str(&format!(
        "Records: {} fetched, {} malformed, {} duplicates, {} non-percentage, {} after dedup, {} summary rows\n",
        stats.records_fetched,
        stats.records_malformed,
        stats.records_duplicate,
        stats.records_non_percentage,
        stats.records_after_dedup,
        stats.summary_rows
    ));
    out
}

/// Full summary of a completed extraction.
pub fn format_run_summary(output: &RunOutput, config: &ExtractConfig, files: &[WrittenFile]) -> String {
    let mut out = String::new();

    out.push_str("=== imea - crop progress extraction ===\n");
    out.push_str(&format!(
        "Range: {} to {} ({:?} windows)\n",
        config.start, config.end, config.granularity
    ));
    out.push_str(&format_run_stats(&output.stats));

    let summary = &output.shaped.summary;
    if let (Some(first), Some(last)) = (summary.first(), summary.last()) {
        out.push_str(&format!("Dates: {} to {}\n", first.date, last.date));
    }

    let seasons: BTreeSet<&str> = summary.iter().map(|r| r.season.as_str()).collect();
    if !seasons.is_empty() {
        out.push_str(&format!(
            "Harvest seasons: {}\n",
            seasons.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    let mut by_crop: BTreeMap<Crop, usize> = BTreeMap::new();
    for row in summary {
        *by_crop.entry(row.crop).or_default() += 1;
    }
    if !by_crop.is_empty() {
        out.push_str("\nRows by crop:\n");
        for (crop, count) in by_crop {
            out.push_str(&format!("  {:<8} {count:>6}\n", crop.display_name()));
        }
    }

    out.push_str("\nNon-zero rows by activity:\n");
    for activity in Activity::ALL {
        let count = summary.iter().filter(|r| r.percentage(activity) > 0.0).count();
        out.push_str(&format!("  {:<26} {count:>6}\n", activity.summary_column()));
    }

    if !output.truncated.is_empty() {
        out.push_str(&format!(
            "\nRequests at the record limit (data may be incomplete): {}\n",
            output.truncated.len()
        ));
        push_listed(&mut out, output.truncated.iter().map(String::as_str));
    }

    if !output.failures.is_empty() {
        out.push_str(&format!("\nFailed requests: {}\n", output.failures.len()));
        let lines: Vec<String> = output
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.task.label(), f.failure_reason().unwrap_or("unknown error")))
            .collect();
        push_listed(&mut out, lines.iter().map(String::as_str));
    }

    out.push_str(&format_files(files));
    out
}

pub fn format_price_summary(quotes: &[PriceQuote], files: &[WrittenFile]) -> String {
    let mut out = String::new();
    out.push_str("=== imea - current prices ===\n");

    let mut by_crop: BTreeMap<Crop, usize> = BTreeMap::new();
    for quote in quotes {
        *by_crop.entry(quote.crop).or_default() += 1;
    }
    out.push_str(&format!("Quotes: {}\n", quotes.len()));
    for (crop, count) in by_crop {
        out.push_str(&format!("  {:<8} {count:>6}\n", crop.display_name()));
    }

    out.push_str(&format_files(files));
    out
}

fn format_files(files: &[WrittenFile]) -> String {
    let mut out = String::new();
    if files.is_empty() {
        return out;
    }
    let total: usize = files.iter().map(|f| f.rows).sum();
    out.push_str(&format!("\nFiles written: {} ({total} records)\n", files.len()));
    for file in files {
        out.push_str(&format!("  {}: {} records\n", file.path.display(), file.rows));
    }
    out
}

fn push_listed<'a>(out: &mut String, items: impl ExactSizeIterator<Item = &'a str>) {
    let total = items.len();
    for item in items.take(MAX_LISTED_TASKS) {
        out.push_str(&format!("  {item}\n"));
    }
    if total > MAX_LISTED_TASKS {
        out.push_str(&format!("  ... and {} more\n", total - MAX_LISTED_TASKS));
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::domain::{FetchConfig, FetchOutcome, FetchStatus, Granularity, SummaryRow};
    use crate::shape::Shaped;
    use crate::test_support::{date, monthly_tasks};

    fn config() -> ExtractConfig {
        ExtractConfig {
            start: date(2021, 1, 1),
            end: date(2021, 12, 31),
            granularity: Granularity::Month,
            crops: Crop::ALL.to_vec(),
            activities: Activity::ALL.to_vec(),
            fetch: FetchConfig::default(),
            out_dir: PathBuf::from("datasets"),
            write_aggregate: false,
            write_detailed: false,
            include_prices: false,
        }
    }

    #[test]
    fn summary_reports_counts_failures_and_files() {
        let mut row = SummaryRow::new(date(2021, 1, 15), Crop::Soy, "Mato Grosso".to_string(), "20/21".to_string());
        row.planted = 40.0;

        let failures: Vec<FetchOutcome> = monthly_tasks(12)
            .into_iter()
            .map(|task| FetchOutcome {
                task,
                status: FetchStatus::Failure { reason: "HTTP 502".to_string() },
                attempts: 1,
            })
            .collect();

        let output = RunOutput {
            stats: RunStats {
                windows: 12,
                indicators: 9,
                tasks_attempted: 108,
                tasks_succeeded: 96,
                tasks_failed: 12,
                tasks_truncated: 0,
                records_fetched: 5,
                records_malformed: 0,
                records_duplicate: 3,
                records_non_percentage: 1,
                records_after_dedup: 1,
                summary_rows: 1,
            },
            observations: Vec::new(),
            shaped: Shaped {
                summary: vec![row],
                subsets: Vec::new(),
            },
            failures,
            truncated: Vec::new(),
        };
        let files = vec![WrittenFile {
            path: PathBuf::from("datasets/BR_IMEA_SOY_PLANTING_PERCENTAGE.csv"),
            rows: 1,
        }];

        let text = format_run_summary(&output, &config(), &files);
        assert!(text.contains("108 attempted"));
        assert!(text.contains("12 failed"));
        assert!(text.contains("3 duplicates, 1 non-percentage, 1 after dedup"));
        assert!(text.contains("Harvest seasons: 20/21"));
        assert!(text.contains("Failed requests: 12"));
        assert!(text.contains("... and 2 more"));
        assert!(text.contains("BR_IMEA_SOY_PLANTING_PERCENTAGE.csv: 1 records"));
    }

    #[test]
    fn stats_line_for_empty_run() {
        let text = format_run_stats(&RunStats::default());
        assert!(text.contains("0 attempted"));
        assert!(text.contains("0 after dedup"));
    }
}
