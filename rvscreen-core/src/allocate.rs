//! Equal-weight allocation over the top of the ranking.

use crate::domain::{PortfolioRow, ScoredRow};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of names held.
pub const DEFAULT_TOP_N: usize = 50;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    #[error("no scored tickers to allocate over")]
    EmptySelection,

    #[error("capital must be a finite, non-negative amount (got {0})")]
    InvalidCapital(f64),

    #[error("portfolio size must be at least 1")]
    InvalidTopN,
}

/// How the rows were produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AllocationMode {
    /// No capital given: the full ranking, no share counts.
    Preview,
    /// Capital split evenly across the selected names.
    EqualWeight { capital: f64, position_size: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub rows: Vec<PortfolioRow>,
    pub mode: AllocationMode,
}

impl Allocation {
    /// Total cost of the recommended shares at the quoted prices.
    pub fn invested(&self) -> f64 {
        self.rows
            .iter()
            .map(|r| match (r.shares_to_buy, r.scored.price) {
                (Some(shares), Some(price)) if shares > 0 => shares as f64 * price,
                _ => 0.0,
            })
            .sum()
    }
}

/// Whole shares affordable with `position_size` at `price`.
///
/// A missing, zero, negative or non-finite price buys nothing.
pub fn shares_for(position_size: f64, price: Option<f64>) -> u64 {
    match price {
        Some(p) if p.is_finite() && p > 0.0 => {
            let shares = (position_size / p).floor();
            if shares.is_finite() && shares > 0.0 {
                // `as` saturates for values beyond u64::MAX.
                shares as u64
            } else {
                0
            }
        }
        _ => 0,
    }
}

/// Allocate `capital` over the first `top_n` rows of an already sorted ranking.
///
/// `None` or zero capital is preview mode and returns every row unallocated.
pub fn allocate(
    ranked: Vec<ScoredRow>,
    capital: Option<f64>,
    top_n: usize,
) -> Result<Allocation, AllocationError> {
    if top_n == 0 {
        return Err(AllocationError::InvalidTopN);
    }
    let capital = capital.unwrap_or(0.0);
    if !capital.is_finite() || capital < 0.0 {
        return Err(AllocationError::InvalidCapital(capital));
    }
    if ranked.is_empty() {
        return Err(AllocationError::EmptySelection);
    }

    if capital == 0.0 {
        let rows = ranked
            .into_iter()
            .map(|scored| PortfolioRow {
                scored,
                shares_to_buy: None,
            })
            .collect();
        return Ok(Allocation {
            rows,
            mode: AllocationMode::Preview,
        });
    }

    let selected = top_n.min(ranked.len());
    let position_size = capital / selected as f64;

    let rows = ranked
        .into_iter()
        .take(selected)
        .map(|scored| {
            let shares = shares_for(position_size, scored.price);
            PortfolioRow {
                scored,
                shares_to_buy: Some(shares),
            }
        })
        .collect();

    Ok(Allocation {
        rows,
        mode: AllocationMode::EqualWeight {
            capital,
            position_size,
        },
    })
}
