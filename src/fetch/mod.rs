//! Concurrent execution of the fetch worklist.

pub mod fetcher;

pub use fetcher::*;
