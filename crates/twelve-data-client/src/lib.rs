//! Rust client for the [Twelve Data](https://twelvedata.com/) market data API
//!
//! Only the real-time quote endpoint is covered. Errors report whether they
//! are worth retrying via [`TwelveDataError::is_transient`].
//!
//! # Example
//!
//! ```no_run
//! use twelve_data_client::TwelveDataClient;
//!
//! # async fn example() -> Result<(), twelve_data_client::TwelveDataError> {
//! let client = TwelveDataClient::new("my-api-key")?;
//! let quote = client.quote("AAPL").await?;
//! println!("{} {:.2} ({:?}%)", quote.symbol, quote.price, quote.percent_change);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod types;

pub use client::TwelveDataClient;
pub use error::{Result, TwelveDataError};
pub use types::Quote;
