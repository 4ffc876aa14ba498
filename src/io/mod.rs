//! Input/output helpers.
//!
//! - CSV dataset exports: summary, subsets, detailed observations, prices (`export`)

pub mod export;

pub use export::*;
