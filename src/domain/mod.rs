//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - static configuration enums and the `Indicator` descriptor
//! - the extraction worklist (`TimeWindow`, `FetchTask`, `FetchOutcome`)
//! - reconciled records and summary rows (`Observation`, `SummaryRow`)

pub mod types;

pub use types::*;
