//! rvscreen runner: concurrent fetch, session cache, screen pipeline, export.
//!
//! This crate builds on `rvscreen-core` to provide:
//! - Bounded, timeout-guarded concurrent fetch of a universe
//! - An explicit in-memory session cache with pluggable invalidation
//! - TOML configuration
//! - The end-to-end screen (fetch, extract, rank, allocate)
//! - CSV, JSON and Markdown export of the result table

pub mod config;
pub mod export;
pub mod fetcher;
pub mod screen;
pub mod session;

pub use config::{CacheConfig, ConfigError, FetchConfig, PortfolioConfig, ScreenConfig};
pub use fetcher::{fetch_universe, FetchError, FetchOptions, FetchReport};
pub use screen::{
    dataset_hash, run_screen, screen_records, screen_report, ScreenError, ScreenResult,
    SCHEMA_VERSION,
};
pub use session::{
    universe_key, CacheStatus, FetchCache, InvalidationPolicy, ManualRefresh, TtlPolicy,
};
