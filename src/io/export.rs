//! CSV persistence of summary tables, subsets, detailed observations and prices.
//!
//! Files are meant to be easy to consume in spreadsheets or downstream scripts;
//! every writer emits a header row even though callers never pass empty subsets.

use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use log::info;
use serde::Serialize;

use crate::data::PriceQuote;
use crate::domain::{ActivitySubset, Crop, Observation, SummaryRow};
use crate::error::AppError;

pub const SUMMARY_FILE: &str = "BR_IMEA_CROP_PERCENTAGE_PROGRESS.csv";
pub const DETAILED_FILE: &str = "BR_IMEA_CROP_PERCENTAGE_DETAILED.csv";
pub const PRICES_FILE: &str = "BR_IMEA_CURRENT_PRICES.csv";

const SERIES_SOURCE: &str = "IMEA_API_INDICATORS";
const PRICES_SOURCE: &str = "IMEA_DIRECT_PRICES";

/// A file written by this module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub rows: usize,
}

#[derive(Serialize)]
struct SummaryRecord<'a> {
    date: NaiveDate,
    year: i32,
    month: u32,
    crop: Crop,
    state: &'a str,
    harvest_season: &'a str,
    planted_percentage: f64,
    harvested_percentage: f64,
    commercialized_percentage: f64,
}

#[derive(Serialize)]
struct SubsetRecord<'a> {
    date: NaiveDate,
    year: i32,
    month: u32,
    crop: Crop,
    state: &'a str,
    harvest_season: &'a str,
    percentage: f64,
}

#[derive(Serialize)]
struct DetailedRecord<'a> {
    date: NaiveDate,
    year: i32,
    month: u32,
    crop: Crop,
    activity: &'a str,
    percentage: f64,
    harvest_season: &'a str,
    state: &'a str,
    indicator: &'a str,
    source_window: String,
    extraction_date: NaiveDateTime,
    data_source: &'a str,
}

#[derive(Serialize)]
struct PriceRecord<'a> {
    locality: &'a str,
    value: Option<f64>,
    variation: Option<f64>,
    crop: Crop,
    chain_id: &'a str,
    season: Option<&'a str>,
    unit: Option<&'a str>,
    publication_date: Option<NaiveDate>,
    extraction_date: NaiveDateTime,
    source: &'a str,
}

pub fn ensure_dir(dir: &Path) -> Result<(), AppError> {
    create_dir_all(dir)
        .map_err(|e| AppError::config(format!("Failed to create output directory '{}': {e}", dir.display())))
}

/// Full wide table.
pub fn write_summary_csv(path: &Path, rows: &[SummaryRow]) -> Result<WrittenFile, AppError> {
    write_records(
        path,
        rows.iter().map(|r| SummaryRecord {
            date: r.date,
            year: r.year,
            month: r.month,
            crop: r.crop,
            state: &r.state,
            harvest_season: &r.season,
            planted_percentage: r.planted,
            harvested_percentage: r.harvested,
            commercialized_percentage: r.commercialized,
        }),
    )
}

/// One crop/activity subset with its activity column renamed to `percentage`.
pub fn write_subset_csv(path: &Path, subset: &ActivitySubset) -> Result<WrittenFile, AppError> {
    write_records(
        path,
        subset.rows.iter().map(|r| SubsetRecord {
            date: r.date,
            year: r.year,
            month: r.month,
            crop: r.crop,
            state: &r.state,
            harvest_season: &r.season,
            percentage: r.percentage(subset.activity),
        }),
    )
}

/// Reconciled long-form observations, one line each.
pub fn write_detailed_csv(
    path: &Path,
    observations: &[Observation],
    extracted_at: NaiveDateTime,
) -> Result<WrittenFile, AppError> {
    write_records(
        path,
        observations.iter().map(|o| DetailedRecord {
            date: o.date,
            year: o.date.year(),
            month: o.date.month(),
            crop: o.crop,
            activity: o.activity.display_name(),
            percentage: o.value,
            harvest_season: &o.season,
            state: &o.state,
            indicator: o.indicator.key,
            source_window: o.window.label(),
            extraction_date: extracted_at,
            data_source: SERIES_SOURCE,
        }),
    )
}

pub fn write_prices_csv(
    path: &Path,
    quotes: &[PriceQuote],
    extracted_at: NaiveDateTime,
) -> Result<WrittenFile, AppError> {
    write_records(
        path,
        quotes.iter().map(|q| PriceRecord {
            locality: &q.locality,
            value: q.value,
            variation: q.variation,
            crop: q.crop,
            chain_id: q.chain_id,
            season: q.season.as_deref(),
            unit: q.unit.as_deref(),
            publication_date: q.publication_date,
            extraction_date: extracted_at,
            source: PRICES_SOURCE,
        }),
    )
}

fn write_records<T, I>(path: &Path, records: I) -> Result<WrittenFile, AppError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::config(format!("Failed to create CSV '{}': {e}", path.display())))?;

    let mut rows = 0usize;
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| AppError::config(format!("Failed to write CSV row to '{}': {e}", path.display())))?;
        rows += 1;
    }
    writer
        .flush()
        .map_err(|e| AppError::config(format!("Failed to flush CSV '{}': {e}", path.display())))?;

    info!("Dataset saved: {rows} records -> {}", path.display());
    Ok(WrittenFile {
        path: path.to_path_buf(),
        rows,
    })
}
