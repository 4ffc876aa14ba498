//! `imea-extract` library crate.
//!
//! The binary (`imea`) is a thin wrapper around this library so that:
//!
//! - the pipeline is testable without spawning processes or touching the network
//! - the provider seams (`data::provider`) can be swapped for in-memory fakes
//!
//! Pipeline: `plan` -> `fetch` -> `reconcile` -> `shape` -> `io`.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod io;
pub mod plan;
pub mod reconcile;
pub mod report;
pub mod shape;

#[cfg(test)]
pub(crate) mod test_support;
