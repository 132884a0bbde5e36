//! Fundamentals provider trait and structured error types.
//!
//! The FundamentalsProvider trait abstracts over data sources (Yahoo Finance,
//! JSON fixture files) so we can swap implementations and mock for tests.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Loosely-typed attribute bag returned by a provider for one symbol.
///
/// Keys follow Yahoo's naming (`currentPrice`, `trailingPE`, ...). Values may
/// be numbers, placeholder strings, nulls, or absent altogether.
pub type RawAttributes = serde_json::Map<String, serde_json::Value>;

/// Structured error types for data operations.
///
/// These are designed to be displayable in both CLI logs and export reports.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("fetch for '{symbol}' timed out after {timeout_ms}ms")]
    Timeout { symbol: String, timeout_ms: u64 },

    #[error("fixture error: {0}")]
    Fixture(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Whether the failure says something about the provider rather than the symbol.
    ///
    /// A batch in which every symbol failed for one of these reasons learned
    /// nothing about the universe; per-symbol failures (unknown ticker, odd
    /// payload) are a valid, if empty, answer.
    pub fn is_provider_level(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_)
                | DataError::RateLimited { .. }
                | DataError::AuthenticationRequired(_)
                | DataError::CircuitBreakerTripped
                | DataError::Timeout { .. }
        )
    }
}

/// One successfully fetched symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerRecord {
    pub symbol: String,
    pub raw_attributes: RawAttributes,
    pub source: DataSource,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    Fixture,
}

/// Trait for fundamentals providers (Yahoo Finance, fixture files, etc).
///
/// Implementations must be callable from several pool threads at once.
/// Providers never retry on their own; a failed symbol stays failed for the run.
pub trait FundamentalsProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the raw attribute bag for one symbol.
    fn fetch(&self, symbol: &str) -> Result<TickerRecord, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;

    /// How long until an unavailable provider accepts requests again, if known.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Progress callback for multi-symbol fetches.
///
/// Called from pool threads, so `index` reflects dispatch order, not completion order.
pub trait FetchProgress: Send + Sync {
    /// Called when starting to fetch a symbol.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called when a symbol fetch completes.
    fn on_complete(&self, symbol: &str, index: usize, total: usize, result: &Result<(), DataError>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that prints to stderr, keeping stdout free for the result table.
pub struct StderrProgress;

impl FetchProgress for StderrProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        eprintln!("[{}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: &Result<(), DataError>,
    ) {
        match result {
            Ok(()) => eprintln!("  OK: {symbol}"),
            Err(e) => eprintln!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        eprintln!("\nFetch complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}
