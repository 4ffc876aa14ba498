//! IMEA API integration: authentication, season lookup, historical series and
//! current price quotes.

use std::time::Duration;

use log::{debug, error, info, warn};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::data::provider::{Authenticator, QuoteSource, Session, Transport, TransportResponse, records_from_body};
use crate::domain::{Crop, FetchTask};
use crate::error::AppError;

pub const DEFAULT_BASE_URL: &str = "https://api1.imea.com.br";

const TOKEN_PATH: &str = "/token";
const SEASONS_PATH: &str = "/api/safra/seriehistoricageral";
const SERIES_PATH: &str = "/api/seriehistorica";
const PORTAL_ORIGIN: &str = "https://portal.imea.com.br";
const USER_AGENT: &str = concat!("imea-extract/", env!("CARGO_PKG_VERSION"));

/// Seasons are listed once per run; give that call more room than a series fetch.
const SEASONS_TIMEOUT: Duration = Duration::from_secs(30);
const SEASONS_PAGE_SIZE: u32 = 100;
/// Large enough that a single window is never paginated by us.
const SERIES_PAGE_SIZE: u32 = 1000;

/// Unauthenticated client. Authenticate to obtain an `ImeaSession`.
pub struct ImeaClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl ImeaClient {
    /// Build a client from `IMEA_USERNAME` / `IMEA_PASSWORD` (and optional
    /// `IMEA_BASE_URL`), reading `.env` if present.
    pub fn from_env(request_timeout: Duration, insecure: bool) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let username = std::env::var("IMEA_USERNAME")
            .map_err(|_| AppError::config("Missing IMEA_USERNAME in environment (.env)."))?;
        let password = std::env::var("IMEA_PASSWORD")
            .map_err(|_| AppError::config("Missing IMEA_PASSWORD in environment (.env)."))?;
        let base_url = std::env::var("IMEA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, username, password, request_timeout, insecure)
    }

    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        request_timeout: Duration,
        insecure: bool,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            // The provider's TLS setup does not always validate; opt-in only.
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| AppError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
        })
    }
}

impl QuoteSource for ImeaClient {
    fn price_quotes(&self, crop: Crop) -> Result<Vec<Value>, AppError> {
        let url = format!("{}/api/v2/mobile/cadeias/{}/cotacoes", self.base_url, crop.chain_id());
        let resp = self
            .client
            .get(&url)
            .header("accept", "application/json, text/plain, */*")
            .header("accept-language", "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7")
            .send()
            .map_err(|e| AppError::data(format!("{crop} price request failed: {}", describe(&e))))?;

        if !resp.status().is_success() {
            return Err(AppError::data(format!(
                "{crop} price request failed with status {}.",
                resp.status()
            )));
        }

        let body: Value = resp
            .json()
            .map_err(|e| AppError::data(format!("Failed to parse {crop} price response: {e}")))?;
        Ok(records_from_body(body))
    }
}

impl Authenticator for ImeaClient {
    type Session = ImeaSession;

    fn authenticate(&self) -> Result<ImeaSession, AppError> {
        info!("Authenticating with IMEA API at {}", self.base_url);

        let form = [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("grant_type", "password"),
            ("client_id", "2"),
        ];
        let resp = self
            .client
            .post(format!("{}{TOKEN_PATH}", self.base_url))
            .header("authorization", "bearer undefined")
            .form(&form)
            .send()
            .map_err(|e| AppError::auth(format!("Authentication request failed: {}", describe(&e))))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            error!("Authentication failed with status {status}: {body}");
            return Err(AppError::auth(format!("Authentication failed with status {status}.")));
        }

        let token: TokenResponse = resp
            .json()
            .map_err(|e| AppError::auth(format!("Failed to parse token response: {e}")))?;

        match token.access_token.filter(|t| !t.is_empty()) {
            Some(token) => {
                info!("Authentication successful");
                Ok(ImeaSession {
                    client: self.client.clone(),
                    base_url: self.base_url.clone(),
                    token,
                })
            }
            None => Err(AppError::auth("No access token in authentication response.")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Bearer-authenticated session; the `Transport` used by the fetcher.
pub struct ImeaSession {
    client: Client,
    base_url: String,
    token: String,
}

impl ImeaSession {
    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .header("accept", "application/json, text/plain, */*")
            .header("origin", PORTAL_ORIGIN)
            .header("referer", format!("{PORTAL_ORIGIN}/"))
    }

    fn fetch_seasons(&self) -> Result<Vec<Value>, AppError> {
        let payload = json!({
            "nome": "",
            "pageSize": SEASONS_PAGE_SIZE,
            "page": 1,
            "cadeia": [],
            "grupo": [],
            "indicador": [],
            "estado": [],
            "regiao": [],
            "cidade": [],
        });

        let resp = self
            .post(SEASONS_PATH)
            .timeout(SEASONS_TIMEOUT)
            .json(&payload)
            .send()
            .map_err(|e| AppError::data(format!("Season request failed: {}", describe(&e))))?;

        if !resp.status().is_success() {
            return Err(AppError::data(format!(
                "Season request failed with status {}.",
                resp.status()
            )));
        }

        let body: Value = resp
            .json()
            .map_err(|e| AppError::data(format!("Failed to parse season response: {e}")))?;
        Ok(records_from_body(body))
    }
}

impl Session for ImeaSession {
    fn season_ids(&self) -> Vec<Value> {
        let seasons = match self.fetch_seasons() {
            Ok(seasons) => seasons,
            Err(e) => {
                warn!("{e}; proceeding without season filtering");
                return Vec::new();
            }
        };

        for season in seasons.iter().take(10) {
            debug!(
                "Season: {} (id {})",
                season.get("Nome").and_then(Value::as_str).unwrap_or("Unknown"),
                season.get("Id").map(Value::to_string).unwrap_or_default()
            );
        }

        let ids = season_ids_from_records(&seasons);
        if ids.is_empty() {
            warn!("No harvest seasons found; proceeding without season filtering");
        } else {
            info!("Using {} harvest seasons", ids.len());
        }
        ids
    }
}

impl Transport for ImeaSession {
    fn send(&self, task: &FetchTask) -> Result<TransportResponse, String> {
        let resp = self
            .post(SERIES_PATH)
            .json(&series_payload(task))
            .send()
            .map_err(|e| describe(&e))?;

        let status = resp.status();
        if !status.is_success() {
            return Ok(TransportResponse {
                status: status.as_u16(),
                records: Vec::new(),
            });
        }

        let body: Value = resp
            .json()
            .map_err(|e| format!("undecodable response body: {e}"))?;
        Ok(TransportResponse {
            status: status.as_u16(),
            records: records_from_body(body),
        })
    }
}

/// Request body for one historical-series task.
fn series_payload(task: &FetchTask) -> Value {
    json!({
        "pageSize": SERIES_PAGE_SIZE,
        "inicio": task.window.start.format("%Y-%m-%d").to_string(),
        "fim": task.window.end.format("%Y-%m-%d").to_string(),
        "cadeia": [],
        "grupo": [],
        "indicador": [task.indicator.id],
        "tipolocalidade": [task.locality_type],
        "estado": [],
        "regiao": [],
        "cidade": [],
        "tipoDestino": [],
        "estadoDestino": [],
        "regiaoDestino": [],
        "cidadeDestino": [],
        "safra": &*task.season_ids,
    })
}

/// Season `Id`s exactly as listed: numbers stay numbers, strings stay strings.
fn season_ids_from_records(seasons: &[Value]) -> Vec<Value> {
    seasons
        .iter()
        .filter_map(|s| match s.get("Id")? {
            Value::String(id) if id.is_empty() => None,
            id @ (Value::String(_) | Value::Number(_)) => Some(id.clone()),
            _ => None,
        })
        .collect()
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out ({err})")
    } else if err.is_connect() {
        format!("connection failed ({err})")
    } else {
        err.to_string()
    }
}
