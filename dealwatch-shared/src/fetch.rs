/// Price-fetch collaborator contract
///
/// The core never scrapes product pages itself; it talks to a price source
/// through the `PriceFetcher` trait. Failures are split into transient
/// (worth a backoff retry) and permanent (mark the item stale and move on),
/// which is the only distinction the poller cares about.
///
/// `HttpPriceFetcher` is the production implementation: a GET against the
/// product link with a bounded timeout, expecting a JSON body with a
/// top-level `price` number. Whatever resolver sits behind that URL owns
/// the actual extraction technique.
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Price fetch failure
#[derive(Debug, Error)]
pub enum FetchError {
    /// Worth retrying with backoff (timeouts, connection resets, 5xx, 429)
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// Retrying will not help (bad link, 4xx, unparseable body)
    #[error("permanent fetch failure: {0}")]
    Permanent(String),
}

impl FetchError {
    /// Whether the poller should retry before declaring the item stale
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// A single observed price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    /// Current price in the room's currency
    pub price: f64,
}

/// Price fetch service contract
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    /// Fetches the current price for a product link
    async fn fetch(&self, url: &str) -> Result<PriceQuote, FetchError>;
}

#[derive(Debug, Deserialize)]
struct PriceBody {
    price: f64,
}

/// HTTP price fetcher
///
/// Carries its own request timeout so no fetch can block a poll cycle
/// indefinitely.
pub struct HttpPriceFetcher {
    client: reqwest::Client,
}

impl HttpPriceFetcher {
    /// Creates a fetcher with the given per-request timeout
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dealwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpPriceFetcher { client })
    }

    fn classify_status(status: reqwest::StatusCode) -> FetchError {
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            FetchError::Transient(format!("status {status}"))
        } else {
            FetchError::Permanent(format!("status {status}"))
        }
    }
}

#[async_trait]
impl PriceFetcher for HttpPriceFetcher {
    async fn fetch(&self, url: &str) -> Result<PriceQuote, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                FetchError::Transient(e.to_string())
            } else {
                FetchError::Permanent(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::classify_status(status));
        }

        let body: PriceBody = response
            .json()
            .await
            .map_err(|e| FetchError::Permanent(format!("bad price body: {e}")))?;

        if !body.price.is_finite() || body.price < 0.0 {
            return Err(FetchError::Permanent(format!(
                "nonsensical price {}",
                body.price
            )));
        }

        Ok(PriceQuote { price: body.price })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Transient("reset".to_string()).is_transient());
        assert!(!FetchError::Permanent("gone".to_string()).is_transient());
    }

    #[test]
    fn test_status_classification() {
        use reqwest::StatusCode;
        assert!(HttpPriceFetcher::classify_status(StatusCode::BAD_GATEWAY).is_transient());
        assert!(HttpPriceFetcher::classify_status(StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(!HttpPriceFetcher::classify_status(StatusCode::NOT_FOUND).is_transient());
        assert!(!HttpPriceFetcher::classify_status(StatusCode::GONE).is_transient());
    }
}
