//! Reconciliation: flatten, tag, deduplicate and filter fetched records.

pub mod reconciler;

pub use reconciler::*;
