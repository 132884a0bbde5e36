//! Concurrent fundamentals fetch over a universe.
//!
//! One task per symbol runs on a private rayon pool (never the global one).
//! Each task returns its own `Result`; the batch is aggregated once, after
//! every task has finished, in universe order. A failed symbol is logged and
//! dropped. It is never retried and never turned into a placeholder row.
//!
//! Every task is bounded by `task_timeout`. The provider call runs on a helper
//! thread so a hung connection cannot hold the batch past the deadline; the
//! helper is abandoned and its late answer discarded.
//!
//! At most `pool_size` provider calls are in flight at once. An abandoned
//! helper keeps its slot until its call returns, so a pile of hung requests
//! throttles the rest of the batch instead of multiplying connections.
//!
//! The batch is fatal when the provider is unavailable up front, or when
//! nothing was fetched and every failure was a provider-level one (network,
//! ban, rate limit, auth, timeout). A universe of unknown symbols is an empty
//! report, not an error.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use thiserror::Error;

use rvscreen_core::data::{DataError, FetchProgress, FundamentalsProvider, TickerRecord, Universe};

use crate::config::FetchConfig;

/// Fatal fetch outcomes. Per-symbol failures never show up here.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("provider '{provider}' is unavailable (circuit breaker open{})", retry_hint(.retry_after_secs))]
    ProviderUnavailable {
        provider: String,
        /// Seconds until the provider accepts requests again, when it knows.
        retry_after_secs: Option<u64>,
    },

    #[error("provider '{provider}' returned no data for any of {requested} symbols (first error: {first_error})")]
    NothingFetched {
        provider: String,
        requested: usize,
        first_error: String,
    },

    #[error("failed to start fetch pool: {0}")]
    Pool(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(", retry in {secs}s"),
        None => String::new(),
    }
}

/// Pool sizing and per-task deadline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchOptions {
    pub pool_size: usize,
    pub task_timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for FetchOptions {
    fn from(cfg: &FetchConfig) -> Self {
        Self {
            pool_size: cfg.pool_size.max(1),
            task_timeout: cfg.task_timeout(),
        }
    }
}

/// Outcome of one fetch batch.
#[derive(Debug)]
pub struct FetchReport {
    /// Successful fetches, in universe order.
    pub records: Vec<TickerRecord>,
    /// Failed symbols with their errors, in universe order.
    pub failures: Vec<(String, DataError)>,
    pub requested: usize,
    pub provider: String,
    pub elapsed: Duration,
}

impl FetchReport {
    pub fn succeeded(&self) -> usize {
        self.records.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn failed_symbols(&self) -> Vec<String> {
        self.failures.iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fetch every symbol of the universe, tolerating per-symbol failures.
///
/// Blocks until every task has completed, failed, or timed out.
pub fn fetch_universe(
    universe: &Universe,
    provider: Arc<dyn FundamentalsProvider>,
    opts: &FetchOptions,
    progress: Option<&dyn FetchProgress>,
) -> Result<FetchReport, FetchError> {
    let provider_name = provider.name().to_string();

    if !provider.is_available() {
        let retry_after_secs = provider.retry_after().map(|d| d.as_secs_f64().ceil() as u64);
        return Err(FetchError::ProviderUnavailable {
            provider: provider_name,
            retry_after_secs,
        });
    }

    let symbols = universe.tickers();
    let total = symbols.len();
    let started = Instant::now();

    tracing::info!(
        provider = %provider_name,
        symbols = total,
        pool_size = opts.pool_size,
        timeout_ms = opts.task_timeout.as_millis() as u64,
        "starting fundamentals fetch"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.pool_size.max(1))
        .thread_name(|i| format!("rvscreen-fetch-{i}"))
        .build()
        .map_err(|e| FetchError::Pool(e.to_string()))?;
    let in_flight = InFlight::new(opts.pool_size);

    let outcomes: Vec<Result<TickerRecord, DataError>> = pool.install(|| {
        symbols
            .par_iter()
            .enumerate()
            .map(|(i, symbol)| {
                if let Some(p) = progress {
                    p.on_start(symbol, i, total);
                }
                let result = fetch_one(&provider, &in_flight, symbol, opts.task_timeout);
                if let Some(p) = progress {
                    let status = result.as_ref().map(|_| ()).map_err(clone_for_progress);
                    p.on_complete(symbol, i, total, &status);
                }
                result
            })
            .collect()
    });

    // Single aggregation step, after the join.
    let mut records = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for (symbol, outcome) in symbols.iter().zip(outcomes) {
        match outcome {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "fetch failed, dropping symbol");
                failures.push((symbol.clone(), e));
            }
        }
    }

    let report = FetchReport {
        records,
        failures,
        requested: total,
        provider: provider_name,
        elapsed: started.elapsed(),
    };

    if let Some(p) = progress {
        p.on_batch_complete(report.succeeded(), report.failed(), total);
    }
    tracing::info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "fundamentals fetch complete"
    );

    let provider_failed = report.failures.iter().all(|(_, e)| e.is_provider_level());
    if total > 0 && report.records.is_empty() && provider_failed {
        let first_error = report
            .failures
            .first()
            .map(|(s, e)| format!("{s}: {e}"))
            .unwrap_or_default();
        return Err(FetchError::NothingFetched {
            provider: report.provider,
            requested: total,
            first_error,
        });
    }

    if report.records.is_empty() && total > 0 {
        tracing::warn!(
            requested = total,
            "nothing fetched; every failure was specific to its symbol"
        );
    }

    Ok(report)
}

/// Counts provider calls in flight across one batch.
struct InFlight {
    active: Mutex<usize>,
    freed: Condvar,
    limit: usize,
}

impl InFlight {
    fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            active: Mutex::new(0),
            freed: Condvar::new(),
            limit: limit.max(1),
        })
    }

    /// Wait for a free slot, giving up at `deadline`.
    fn acquire_until(self: &Arc<Self>, deadline: Instant) -> Option<Permit> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        while *active >= self.limit {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .freed
                .wait_timeout(active, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            active = guard;
        }
        *active += 1;
        Some(Permit(Arc::clone(self)))
    }
}

/// One in-flight slot, released on drop.
struct Permit(Arc<InFlight>);

impl Drop for Permit {
    fn drop(&mut self) {
        let mut active = self.0.active.lock().unwrap_or_else(PoisonError::into_inner);
        *active = active.saturating_sub(1);
        drop(active);
        self.0.freed.notify_one();
    }
}

/// One symbol, bounded by `timeout` including the wait for a free slot.
fn fetch_one(
    provider: &Arc<dyn FundamentalsProvider>,
    in_flight: &Arc<InFlight>,
    symbol: &str,
    timeout: Duration,
) -> Result<TickerRecord, DataError> {
    let deadline = Instant::now() + timeout;
    let timed_out = || DataError::Timeout {
        symbol: symbol.to_string(),
        timeout_ms: timeout.as_millis() as u64,
    };

    // Once the breaker is open, skip the helper thread entirely.
    if !provider.is_available() {
        return Err(DataError::CircuitBreakerTripped);
    }

    let permit = in_flight.acquire_until(deadline).ok_or_else(timed_out)?;

    // The breaker may have opened while this task waited for a slot.
    if !provider.is_available() {
        return Err(DataError::CircuitBreakerTripped);
    }

    let (tx, rx) = mpsc::sync_channel(1);
    let task_provider = Arc::clone(provider);
    let task_symbol = symbol.to_string();
    thread::Builder::new()
        .name(format!("fetch-{symbol}"))
        .spawn(move || {
            let _permit = permit;
            // The receiver is gone if we already timed out.
            let _ = tx.send(task_provider.fetch(&task_symbol));
        })
        .map_err(|e| DataError::Other(format!("spawn fetch thread for {symbol}: {e}")))?;

    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(result) => result.and_then(|record| {
            if record.symbol == symbol {
                Ok(record)
            } else {
                Err(DataError::ResponseFormatChanged(format!(
                    "asked for {symbol}, provider answered for {}",
                    record.symbol
                )))
            }
        }),
        Err(RecvTimeoutError::Timeout) => Err(timed_out()),
        Err(RecvTimeoutError::Disconnected) => Err(DataError::Other(format!(
            "fetch thread for {symbol} exited without a result"
        ))),
    }
}

/// `DataError` is not `Clone`; observers only need something displayable.
fn clone_for_progress(e: &DataError) -> DataError {
    match e {
        DataError::SymbolNotFound { symbol } => DataError::SymbolNotFound {
            symbol: symbol.clone(),
        },
        DataError::CircuitBreakerTripped => DataError::CircuitBreakerTripped,
        DataError::Timeout { symbol, timeout_ms } => DataError::Timeout {
            symbol: symbol.clone(),
            timeout_ms: *timeout_ms,
        },
        other => DataError::Other(other.to_string()),
    }
}
