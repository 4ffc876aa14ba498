//! Fixtures shared by unit tests: canned tasks, records and an in-memory provider.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use serde_json::{Value, json};

use crate::data::catalog::INDICATORS;
use crate::data::provider::{Authenticator, Session, Transport, TransportResponse};
use crate::domain::{Activity, Crop, FetchTask, Granularity, Indicator};
use crate::error::AppError;
use crate::plan::{partition, plan};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn indicator(crop: Crop, activity: Activity) -> Indicator {
    *INDICATORS
        .iter()
        .find(|i| i.crop == crop && i.activity == activity)
        .unwrap()
}

/// `n` monthly tasks for Soy planting starting January 2021.
pub fn monthly_tasks(n: usize) -> Vec<FetchTask> {
    let start = date(2021, 1, 1);
    let mut windows = partition(start, date(2040, 12, 31), Granularity::Month);
    windows.truncate(n);
    plan(&[indicator(Crop::Soy, Activity::Planting)], &windows, vec![json!(1)])
}

/// A provider record as the historical-series endpoint returns it.
pub fn series_record(date: &str, value: f64, season: &str) -> Value {
    json!({
        "Data": format!("{date}T00:00:00"),
        "Valor": value,
        "EstadoId": 51,
        "SafraDescricao": season,
        "UnidadeDescricao": "Percentual",
    })
}

/// Transport backed by a closure; counts calls.
pub struct FnTransport<F> {
    handler: F,
    pub calls: AtomicUsize,
}

impl<F> FnTransport<F>
where
    F: Fn(&FetchTask) -> Result<TransportResponse, String> + Sync,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> Transport for FnTransport<F>
where
    F: Fn(&FetchTask) -> Result<TransportResponse, String> + Sync,
{
    fn send(&self, task: &FetchTask) -> Result<TransportResponse, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(task)
    }
}

impl<F> Session for FnTransport<F>
where
    F: Fn(&FetchTask) -> Result<TransportResponse, String> + Sync,
{
    fn season_ids(&self) -> Vec<Value> {
        vec![json!(1)]
    }
}

pub fn ok(records: Vec<Value>) -> Result<TransportResponse, String> {
    Ok(TransportResponse { status: 200, records })
}

/// Authenticator that hands out a prepared session, or refuses.
pub struct StubAuthenticator<S> {
    session: std::sync::Mutex<Option<S>>,
}

impl<S> StubAuthenticator<S> {
    pub fn granting(session: S) -> Self {
        Self {
            session: std::sync::Mutex::new(Some(session)),
        }
    }

    pub fn refusing() -> Self {
        Self {
            session: std::sync::Mutex::new(None),
        }
    }
}

impl<S: Session> Authenticator for StubAuthenticator<S> {
    type Session = S;

    fn authenticate(&self) -> Result<S, AppError> {
        self.session
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| AppError::auth("Authentication failed with status 401 Unauthorized."))
    }
}
