//! Yahoo Finance fundamentals provider.
//!
//! Fetches the `financialData`, `defaultKeyStatistics` and `summaryDetail`
//! modules from the v10 quoteSummary API and flattens them into one attribute
//! bag. Yahoo wraps numbers as `{"raw": 1.5, "fmt": "1.50"}` and reports
//! unknown values as `{}`; the wrapper is unwrapped to `raw`, and empty
//! objects are dropped so the key reads as absent.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes. The fixture provider is the fallback when Yahoo is unavailable.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataSource, FundamentalsProvider, RawAttributes, TickerRecord};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Modules requested from quoteSummary, in precedence order for duplicate keys.
const MODULES: [&str; 3] = ["financialData", "defaultKeyStatistics", "summaryDetail"];

/// Yahoo Finance v10 quoteSummary response.
#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryResult,
}

#[derive(Debug, Deserialize)]
struct SummaryResult {
    result: Option<Vec<serde_json::Map<String, Value>>>,
    error: Option<SummaryError>,
}

#[derive(Debug, Deserialize)]
struct SummaryError {
    code: String,
    description: String,
}

/// Yahoo Finance fundamentals provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    base_url: String,
}

impl YahooProvider {
    /// Build a provider whose HTTP calls are bounded by `timeout`.
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            base_url: "https://query2.finance.yahoo.com".into(),
        })
    }

    /// Point the provider at a different host (proxies, mirrors).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// quoteSummary URL for `symbol`, with the symbol encoded as one path segment.
    fn summary_url(&self, symbol: &str) -> Result<reqwest::Url, DataError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| DataError::Other(format!("invalid base URL '{}': {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| DataError::Other(format!("base URL '{}' cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .extend(["v10", "finance", "quoteSummary", symbol]);
        url.set_query(Some(&format!("modules={}", MODULES.join(","))));
        Ok(url)
    }

    /// Flatten the quoteSummary response into one attribute bag.
    fn parse_response(symbol: &str, resp: SummaryResponse) -> Result<RawAttributes, DataError> {
        let result = resp.quote_summary.result.ok_or_else(|| {
            match resp.quote_summary.error {
                Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                },
                Some(err) => {
                    DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
                None => DataError::ResponseFormatChanged("empty result with no error".into()),
            }
        })?;

        let modules = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        let mut bag = RawAttributes::new();
        for module in MODULES {
            let Some(Value::Object(fields)) = modules.get(module) else {
                continue;
            };
            for (key, value) in fields {
                if bag.contains_key(key) {
                    continue;
                }
                if let Some(v) = unwrap_value(value) {
                    bag.insert(key.clone(), v);
                }
            }
        }

        if bag.is_empty() {
            return Err(DataError::ResponseFormatChanged(format!(
                "no known modules in response for {symbol}"
            )));
        }

        Ok(bag)
    }

    fn fetch_once(&self, symbol: &str) -> Result<RawAttributes, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let resp = self.client.get(self.summary_url(symbol)?).send().map_err(|e| {
            if e.is_connect() {
                self.circuit_breaker.record_failure();
            }
            DataError::NetworkUnreachable(e.to_string())
        })?;

        let status = resp.status();

        if status == reqwest::StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(DataError::CircuitBreakerTripped);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.circuit_breaker.record_failure();
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.circuit_breaker.record_failure();
            return Err(DataError::AuthenticationRequired(
                "Yahoo Finance requires authentication".into(),
            ));
        }

        // quoteSummary answers unknown symbols with 404 and an error body.
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        if !status.is_success() {
            return Err(DataError::Other(format!("HTTP {status} for {symbol}")));
        }

        let summary: SummaryResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        let bag = Self::parse_response(symbol, summary)?;
        self.circuit_breaker.record_success();
        Ok(bag)
    }
}

/// Unwrap Yahoo's `{raw, fmt}` number wrapper; `None` means "treat as absent".
fn unwrap_value(value: &Value) -> Option<Value> {
    match value {
        Value::Object(obj) => obj.get("raw").cloned(),
        other => Some(other.clone()),
    }
}

impl FundamentalsProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str) -> Result<TickerRecord, DataError> {
        let raw_attributes = self.fetch_once(symbol)?;
        Ok(TickerRecord {
            symbol: symbol.to_string(),
            raw_attributes,
            source: DataSource::YahooFinance,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }

    fn retry_after(&self) -> Option<Duration> {
        let remaining = self.circuit_breaker.remaining_cooldown();
        (!remaining.is_zero()).then_some(remaining)
    }
}
