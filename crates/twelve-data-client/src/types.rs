use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TwelveDataError;

/// Latest price for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    /// Last close
    pub price: f64,
    pub change: Option<f64>,
    pub percent_change: Option<f64>,
    pub volume: Option<u64>,
    pub fetched_at: DateTime<Utc>,
}

/// `/quote` response body, either a quote or an error payload
///
/// Twelve Data sends numbers as strings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct QuoteResponse {
    pub(crate) status: Option<String>,
    pub(crate) code: Option<u16>,
    pub(crate) message: Option<String>,
    pub(crate) symbol: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) exchange: Option<String>,
    pub(crate) currency: Option<String>,
    pub(crate) close: Option<String>,
    pub(crate) change: Option<String>,
    pub(crate) percent_change: Option<String>,
    pub(crate) volume: Option<String>,
}

impl QuoteResponse {
    pub(crate) fn into_quote(
        self,
        requested: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<Quote, TwelveDataError> {
        if self.status.as_deref() == Some("error") {
            return Err(TwelveDataError::Api {
                code: self.code,
                message: self
                    .message
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        let price = parse_number::<f64>(&self.close).ok_or_else(|| TwelveDataError::Api {
            code: None,
            message: format!("quote for {} has no close price", requested),
        })?;

        Ok(Quote {
            symbol: self.symbol.unwrap_or_else(|| requested.to_string()),
            name: self.name,
            exchange: self.exchange,
            currency: self.currency,
            price,
            change: parse_number(&self.change),
            percent_change: parse_number(&self.percent_change),
            volume: parse_number(&self.volume),
            fetched_at,
        })
    }
}

fn parse_number<T: std::str::FromStr>(raw: &Option<String>) -> Option<T> {
    raw.as_deref().and_then(|s| s.trim().parse().ok())
}
