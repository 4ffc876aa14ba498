//! Remote provider access.
//!
//! - transport/session seams used by the fetcher (`provider`)
//! - the IMEA HTTP client (`imea`)
//! - static indicator catalog (`catalog`)
//! - lenient field parsing shared by series and price records (`fields`)
//! - current price quotes (`prices`)

pub mod catalog;
pub mod fields;
pub mod imea;
pub mod prices;
pub mod provider;

pub use imea::{ImeaClient, ImeaSession};
pub use prices::{PriceQuote, fetch_current_prices};
pub use provider::{Authenticator, QuoteSource, Session, Transport, TransportResponse};
