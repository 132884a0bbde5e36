//! Fundamentals providers and universe loading

pub mod circuit_breaker;
pub mod fixture;
pub mod provider;
pub mod universe;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use fixture::FixtureProvider;
pub use provider::{
    DataError, DataSource, FetchProgress, FundamentalsProvider, RawAttributes, StderrProgress,
    TickerRecord,
};
pub use universe::{Universe, UniverseError};
pub use yahoo::YahooProvider;
