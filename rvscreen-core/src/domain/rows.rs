//! Rows flowing through the pipeline: extracted, scored, allocated.

use super::metric::{Metric, MetricValues};
use serde::{Deserialize, Serialize};

/// Valuation metrics for one fetched ticker.
///
/// `None` is the missing sentinel: absent key, placeholder string, falsy value,
/// or an undefined division. Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub symbol: String,
    pub price: Option<f64>,
    pub pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub ev_to_ebitda: Option<f64>,
    pub ev_to_gross_profit: Option<f64>,
}

impl MetricRow {
    /// A row with every field missing.
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price: None,
            pe: None,
            price_to_book: None,
            price_to_sales: None,
            ev_to_ebitda: None,
            ev_to_gross_profit: None,
        }
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Pe => self.pe,
            Metric::PriceToBook => self.price_to_book,
            Metric::PriceToSales => self.price_to_sales,
            Metric::EvToEbitda => self.ev_to_ebitda,
            Metric::EvToGrossProfit => self.ev_to_gross_profit,
        }
    }

    /// Metrics this row is missing.
    pub fn missing_metrics(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|&m| self.metric(m).is_none())
            .collect()
    }
}

/// A ranked row: ratios after imputation, their percentiles, and the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    pub symbol: String,
    pub price: Option<f64>,
    pub ratios: MetricValues,
    /// Each in `[0, 1]`.
    pub percentiles: MetricValues,
    /// Mean of the five percentiles.
    pub score: f64,
    /// Metrics whose ratio was filled with the cross-sectional mean.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imputed: Vec<Metric>,
}

/// A scored row with its recommended share count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRow {
    #[serde(flatten)]
    pub scored: ScoredRow,
    /// `None` in preview mode, where no capital was given.
    pub shares_to_buy: Option<u64>,
}

impl PortfolioRow {
    pub fn symbol(&self) -> &str {
        &self.scored.symbol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_row_misses_everything() {
        let row = MetricRow::empty("AAPL");
        assert_eq!(row.missing_metrics(), Metric::ALL.to_vec());
        assert_eq!(row.price, None);
    }

    #[test]
    fn metric_accessor_reads_matching_field() {
        let row = MetricRow {
            price_to_sales: Some(3.5),
            ..MetricRow::empty("KO")
        };
        assert_eq!(row.metric(Metric::PriceToSales), Some(3.5));
        assert_eq!(row.missing_metrics().len(), 4);
    }
}
