//! Seams between the pipeline and the remote provider.
//!
//! The fetcher only ever talks to a `Transport`; a `Transport` is only obtainable
//! by authenticating, so no task can run without a session.

use serde_json::Value;

use crate::domain::{Crop, FetchTask};
use crate::error::AppError;

/// Normalized response to one historical-series request.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    /// Records from the body regardless of response shape; empty on non-2xx.
    pub records: Vec<Value>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs exactly one outbound request per call.
pub trait Transport: Sync {
    /// `Err` carries a transport-level failure description (connect, timeout,
    /// undecodable body). HTTP error statuses come back as `Ok` with the status.
    fn send(&self, task: &FetchTask) -> Result<TransportResponse, String>;
}

/// An authenticated connection to the provider.
pub trait Session: Transport {
    /// Harvest-season ids used to filter every series request. An empty list means
    /// "no season filter".
    fn season_ids(&self) -> Vec<Value>;
}

pub trait Authenticator {
    type Session: Session;

    fn authenticate(&self) -> Result<Self::Session, AppError>;
}

/// Current price quotes, one request per crop's chain. Needs no session.
pub trait QuoteSource {
    fn price_quotes(&self, crop: Crop) -> Result<Vec<Value>, AppError>;
}

/// Extract the record list from either a bare JSON list or a `{"data": [...]}`
/// wrapper. Anything else yields no records.
pub fn records_from_body(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
