//! Domain types for the value screen

pub mod metric;
pub mod rows;

pub use metric::{Metric, MetricValues};
pub use rows::{MetricRow, PortfolioRow, ScoredRow};
