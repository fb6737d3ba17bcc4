//! Twelve Data HTTP client

use crate::error::{Result, TwelveDataError};
use crate::types::{Quote, QuoteResponse};
use chrono::Utc;
use std::time::Duration;
use tracing::debug;

/// Client for the Twelve Data REST API
///
/// Performs no caching, rate limiting or retrying of its own; callers wrap
/// it in whatever policy they need.
pub struct TwelveDataClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TwelveDataClient {
    pub const BASE_URL: &'static str = "https://api.twelvedata.com";

    /// Create a client against the public API with a 30 second timeout
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, Self::BASE_URL, Duration::from_secs(30))
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TwelveDataError::MissingApiKey);
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Fetch the latest quote for `symbol`
    pub async fn quote(&self, symbol: &str) -> Result<Quote> {
        let url = format!(
            "{}/quote?symbol={}&apikey={}",
            self.base_url,
            urlencoding::encode(symbol),
            urlencoding::encode(&self.api_key)
        );

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TwelveDataError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: QuoteResponse = serde_json::from_str(&body)?;
        let quote = parsed.into_quote(symbol, Utc::now())?;
        debug!(symbol = %quote.symbol, price = quote.price, "Fetched quote");

        Ok(quote)
    }
}
