//! Error types for the Twelve Data client

use std::fmt;

/// Errors that can occur when talking to Twelve Data
#[derive(Debug)]
pub enum TwelveDataError {
    /// Request never produced a response (connect, timeout, body read)
    Http(reqwest::Error),
    /// Non-success HTTP status
    Status { status: u16, body: String },
    /// Error payload (`"status": "error"`) or a quote missing its price
    Api { code: Option<u16>, message: String },
    /// Response body was not the expected JSON
    Json(serde_json::Error),
    MissingApiKey,
}

impl TwelveDataError {
    /// Whether the same request may succeed if repeated later
    ///
    /// Network failures, server errors and rate limiting are transient.
    /// Client errors, error payloads and malformed bodies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => !(e.is_builder() || e.is_decode() || e.is_redirect()),
            Self::Status { status, .. } => is_retryable_code(*status),
            Self::Api { code, .. } => code.is_some_and(is_retryable_code),
            Self::Json(_) | Self::MissingApiKey => false,
        }
    }
}

fn is_retryable_code(code: u16) -> bool {
    code == 429 || code >= 500
}

impl fmt::Display for TwelveDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "Twelve Data HTTP error: {}", e),
            Self::Status { status, body } => {
                write!(f, "Twelve Data returned status {}: {}", status, body)
            }
            Self::Api {
                code: Some(code),
                message,
            } => write!(f, "Twelve Data API error {}: {}", code, message),
            Self::Api {
                code: None,
                message,
            } => write!(f, "Twelve Data API error: {}", message),
            Self::Json(e) => write!(f, "Twelve Data JSON parse error: {}", e),
            Self::MissingApiKey => write!(f, "Twelve Data API key is not set"),
        }
    }
}

impl std::error::Error for TwelveDataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TwelveDataError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

impl From<serde_json::Error> for TwelveDataError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Result type for Twelve Data operations
pub type Result<T> = std::result::Result<T, TwelveDataError>;
