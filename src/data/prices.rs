//! Current commodity price quotes.

use chrono::NaiveDate;
use log::{info, warn};
use serde_json::Value;

use crate::data::fields::{as_text, parse_date, parse_number};
use crate::data::provider::QuoteSource;
use crate::domain::Crop;

/// One normalized quote. Unparseable numeric fields are `None`, not errors.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub crop: Crop,
    pub chain_id: &'static str,
    pub locality: String,
    pub value: Option<f64>,
    pub variation: Option<f64>,
    pub season: Option<String>,
    pub unit: Option<String>,
    pub publication_date: Option<NaiveDate>,
}

/// Fetch quotes for every crop; a failing chain is logged and skipped.
pub fn fetch_current_prices<Q>(source: &Q, crops: &[Crop]) -> Vec<PriceQuote>
where
    Q: QuoteSource + ?Sized,
{
    let mut quotes = Vec::new();

    for &crop in crops {
        info!("Fetching {crop} prices (chain {})", crop.chain_id());
        match source.price_quotes(crop) {
            Ok(records) if records.is_empty() => warn!("No price data for {crop}"),
            Ok(records) => {
                let normalized = normalize_quotes(crop, &records);
                info!("Retrieved {} price records for {crop}", normalized.len());
                quotes.extend(normalized);
            }
            Err(e) => warn!("{e}"),
        }
    }

    if quotes.is_empty() {
        warn!("No price data retrieved");
    }
    quotes
}

pub fn normalize_quotes(crop: Crop, records: &[Value]) -> Vec<PriceQuote> {
    records
        .iter()
        .filter(|r| r.is_object())
        .map(|r| PriceQuote {
            crop,
            chain_id: crop.chain_id(),
            locality: r.get("Localidade").and_then(as_text).unwrap_or_default(),
            value: r.get("Valor").and_then(parse_number),
            variation: r.get("Variacao").and_then(parse_number),
            season: r.get("Safra").and_then(as_text),
            unit: r.get("UnidadeDescricao").and_then(as_text),
            publication_date: r.get("DataPublicacao").and_then(parse_date),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::AppError;

    /// Quote source backed by a closure.
    struct FnQuotes<F>(F);

    impl<F> QuoteSource for FnQuotes<F>
    where
        F: Fn(Crop) -> Result<Vec<Value>, AppError>,
    {
        fn price_quotes(&self, crop: Crop) -> Result<Vec<Value>, AppError> {
            (self.0)(crop)
        }
    }

    #[test]
    fn failing_chain_is_skipped() {
        let source = FnQuotes(|crop: Crop| match crop {
            Crop::Corn => Err(AppError::data("Corn price request failed with status 503.")),
            _ => Ok(vec![json!({"Localidade": "Sorriso", "Valor": 100.0})]),
        });

        let quotes = fetch_current_prices(&source, &Crop::ALL);
        let crops: Vec<Crop> = quotes.iter().map(|q| q.crop).collect();
        assert_eq!(crops, vec![Crop::Soy, Crop::Cotton]);
        assert_eq!(quotes[1].chain_id, "1");
    }

    #[test]
    fn no_quotes_anywhere_is_empty() {
        let empty = FnQuotes(|_: Crop| -> Result<Vec<Value>, AppError> { Ok(Vec::new()) });
        assert!(fetch_current_prices(&empty, &Crop::ALL).is_empty());

        let down = FnQuotes(|crop: Crop| -> Result<Vec<Value>, AppError> {
            Err(AppError::data(format!("{crop} price request failed")))
        });
        assert!(fetch_current_prices(&down, &Crop::ALL).is_empty());
    }

    #[test]
    fn quotes_are_normalized_leniently() {
        let records = vec![
            json!({
                "Localidade": "Sorriso",
                "Valor": "120,50",
                "Variacao": -1.2,
                "Safra": "23/24",
                "UnidadeDescricao": "R$/sc",
                "DataPublicacao": "2024-03-01T10:00:00"
            }),
            json!({"Localidade": "Sinop", "Valor": "-"}),
            json!("not an object"),
        ];

        let quotes = normalize_quotes(Crop::Soy, &records);
        assert_eq!(quotes.len(), 2);

        assert_eq!(quotes[0].chain_id, "4");
        assert_eq!(quotes[0].value, Some(120.5));
        assert_eq!(quotes[0].variation, Some(-1.2));
        assert_eq!(quotes[0].publication_date, NaiveDate::from_ymd_opt(2024, 3, 1));

        assert_eq!(quotes[1].locality, "Sinop");
        assert_eq!(quotes[1].value, None);
        assert_eq!(quotes[1].season, None);
    }
}
