//! rvscreen core: fundamentals providers, metric extraction, ranking, allocation.
//!
//! This crate holds the scoring engine:
//! - Provider trait with Yahoo Finance and JSON fixture implementations
//! - Universe loading from a `Ticker` CSV
//! - Metric extraction from loosely-typed attribute bags
//! - Cross-sectional imputation, percentile ranking and composite score
//! - Equal-weight allocation over the top of the ranking
//!
//! Everything here is synchronous and free of shared state; concurrency lives
//! in `rvscreen-runner`.

pub mod allocate;
pub mod data;
pub mod domain;
pub mod extract;
pub mod rank;

pub use allocate::{allocate, Allocation, AllocationError, AllocationMode, DEFAULT_TOP_N};
pub use extract::{extract_all, extract_metrics};
pub use rank::{rank, RankSummary, Ranking, ScoreOrder};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed across the fetch pool are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<data::TickerRecord>();
        require_sync::<data::TickerRecord>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::FixtureProvider>();
        require_sync::<data::FixtureProvider>();

        require_send::<domain::MetricRow>();
        require_sync::<domain::MetricRow>();
        require_send::<domain::ScoredRow>();
        require_sync::<domain::ScoredRow>();
        require_send::<domain::PortfolioRow>();
        require_sync::<domain::PortfolioRow>();
    }

    /// Architecture contract: extraction sees one attribute bag and nothing else.
    ///
    /// The signature takes a symbol and a bag and returns a row, no `Result`.
    /// If extraction ever becomes fallible or starts reading other tickers,
    /// this stops compiling.
    #[test]
    fn extraction_is_infallible_and_per_ticker() {
        fn _check(symbol: &str, bag: &data::RawAttributes) -> domain::MetricRow {
            extract_metrics(symbol, bag)
        }
    }
}
