//! Screen pipeline: fetch, extract, rank, allocate.
//!
//! Two entry points:
//! - `run_screen()`: fetches the universe (through the session cache) and scores it. Used by the CLI.
//! - `screen_records()`: scores already-fetched records, no I/O. Used when re-allocating
//!   a cached fetch with a different capital amount, and by tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rvscreen_core::data::{FetchProgress, FundamentalsProvider, TickerRecord, Universe, UniverseError};
use rvscreen_core::domain::PortfolioRow;
use rvscreen_core::{allocate, extract_all, rank, AllocationError, AllocationMode, RankSummary};

use crate::config::{ConfigError, ScreenConfig};
use crate::fetcher::{fetch_universe, FetchError, FetchOptions, FetchReport};
use crate::session::{universe_key, CacheStatus, FetchCache};

/// Errors that end a screen run.
#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("universe error: {0}")]
    Universe(#[from] UniverseError),
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("allocation error: {0}")]
    Allocation(#[from] AllocationError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of one screen run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub provider: String,
    pub universe_size: usize,
    /// Symbols with a successful fetch.
    pub fetched: usize,
    /// Symbols dropped at fetch time, in universe order.
    pub failed_symbols: Vec<String>,
    pub rank_summary: RankSummary,
    pub mode: AllocationMode,
    pub rows: Vec<PortfolioRow>,
    /// Total cost of the recommended shares at the quoted prices; zero in preview.
    #[serde(default)]
    pub invested: f64,
    /// blake3 over the fetched attribute bags.
    pub dataset_hash: String,
    #[serde(default)]
    pub cache_hit: bool,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl ScreenResult {
    pub fn is_preview(&self) -> bool {
        matches!(self.mode, AllocationMode::Preview)
    }
}

/// Fetch the universe (or reuse the session's cached fetch) and score it.
///
/// `capital` of `None` or zero gives the full preview ranking.
pub fn run_screen(
    universe: &Universe,
    provider: Arc<dyn FundamentalsProvider>,
    config: &ScreenConfig,
    capital: Option<f64>,
    cache: &FetchCache,
    progress: Option<&dyn FetchProgress>,
) -> Result<ScreenResult, ScreenError> {
    config.validate()?;

    let key = universe_key(universe, provider.name());
    let opts = FetchOptions::from(&config.fetch);
    let (report, status) =
        cache.get_or_fetch(&key, || fetch_universe(universe, Arc::clone(&provider), &opts, progress))?;

    let mut result = screen_records(
        &report.records,
        &report.provider,
        universe.ticker_count(),
        config,
        capital,
    )?;
    result.failed_symbols = report.failed_symbols();
    result.cache_hit = status == CacheStatus::Hit;
    Ok(result)
}

/// Score a fetch report without touching the network.
pub fn screen_report(
    report: &FetchReport,
    config: &ScreenConfig,
    capital: Option<f64>,
) -> Result<ScreenResult, ScreenError> {
    let mut result = screen_records(&report.records, &report.provider, report.requested, config, capital)?;
    result.failed_symbols = report.failed_symbols();
    Ok(result)
}

/// Extract, rank and allocate already-fetched records. No I/O.
pub fn screen_records(
    records: &[TickerRecord],
    provider: &str,
    universe_size: usize,
    config: &ScreenConfig,
    capital: Option<f64>,
) -> Result<ScreenResult, ScreenError> {
    let rows = extract_all(records);
    let ranking = rank(&rows, config.portfolio.order);

    tracing::info!(
        extracted = rows.len(),
        ranked = ranking.summary.ranked_rows,
        excluded = ranking.summary.excluded.len(),
        "ranking complete"
    );

    let allocation = allocate(ranking.rows, capital, config.portfolio.top_n)?;
    let invested = allocation.invested();

    if let AllocationMode::EqualWeight {
        capital,
        position_size,
    } = allocation.mode
    {
        tracing::info!(
            capital,
            position_size,
            holdings = allocation.rows.len(),
            invested,
            "equal-weight allocation complete"
        );
    }

    Ok(ScreenResult {
        schema_version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        provider: provider.to_string(),
        universe_size,
        fetched: records.len(),
        failed_symbols: Vec::new(),
        rank_summary: ranking.summary,
        mode: allocation.mode,
        rows: allocation.rows,
        invested,
        dataset_hash: dataset_hash(records),
        cache_hit: false,
    })
}

/// Content hash of the fetched bags, order-sensitive.
///
/// `serde_json::Map` keeps keys sorted, so equal bags hash equally.
pub fn dataset_hash(records: &[TickerRecord]) -> String {
    let mut hasher = blake3::Hasher::new();
    for record in records {
        hasher.update(record.symbol.as_bytes());
        hasher.update(&[0]);
        match serde_json::to_vec(&record.raw_attributes) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(b"?"),
        };
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}
