use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::{
    ledger::RateSource,
    models::{ProgressionError, Result},
};

/// Exchange rate read from a JSON HTTP endpoint. `pointer` is a JSON pointer
/// (RFC 6901) to a number or numeric string holding tokens per base unit.
pub struct HttpPriceFeed {
    client: Client,
    url: String,
    pointer: String,
}

impl HttpPriceFeed {
    pub fn new(url: impl Into<String>, pointer: impl Into<String>, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            pointer: pointer.into(),
        })
    }

    fn feed_error(&self, message: String) -> ProgressionError {
        ProgressionError::LedgerError {
            source_name: self.url.clone(),
            message,
        }
    }

    /// Extract a positive rate from a feed response body.
    pub fn extract_rate(body: &Value, pointer: &str) -> std::result::Result<Decimal, String> {
        let raw = body
            .pointer(pointer)
            .ok_or_else(|| format!("no value at {}", pointer))?;

        let rate = match raw {
            Value::Number(n) => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .map_err(|e| format!("unparseable rate {}: {}", n, e))?,
            Value::String(s) => Decimal::from_str(s.trim()).map_err(|e| format!("unparseable rate '{}': {}", s, e))?,
            other => return Err(format!("unexpected rate value {}", other)),
        };

        if rate <= Decimal::ZERO {
            return Err(format!("non-positive rate {}", rate));
        }

        Ok(rate)
    }
}

#[async_trait]
impl RateSource for HttpPriceFeed {
    fn name(&self) -> String {
        format!("http_feed({})", self.url)
    }

    async fn tokens_per_base(&self) -> Result<Decimal> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(self.feed_error(format!("HTTP {}", response.status())));
        }

        let body: Value = response.json().await?;
        let rate = Self::extract_rate(&body, &self.pointer).map_err(|e| self.feed_error(e))?;

        debug!("Price feed {} returned {} tokens per base", self.url, rate);
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_rate_from_number_and_string() {
        let body = json!({ "tokens_per_base": 125000.5 });
        assert_eq!(
            HttpPriceFeed::extract_rate(&body, "/tokens_per_base").unwrap(),
            Decimal::from_str("125000.5").unwrap()
        );

        let nested = json!({ "data": { "rate": "98000" } });
        assert_eq!(
            HttpPriceFeed::extract_rate(&nested, "/data/rate").unwrap(),
            Decimal::from(98_000)
        );
    }

    #[test]
    fn test_extract_rate_rejects_bad_values() {
        assert!(HttpPriceFeed::extract_rate(&json!({}), "/tokens_per_base").is_err());
        assert!(HttpPriceFeed::extract_rate(&json!({ "r": 0 }), "/r").is_err());
        assert!(HttpPriceFeed::extract_rate(&json!({ "r": "-3" }), "/r").is_err());
        assert!(HttpPriceFeed::extract_rate(&json!({ "r": true }), "/r").is_err());
    }
}
