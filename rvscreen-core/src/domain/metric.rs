//! The five valuation ratios that feed the composite score.

use serde::{Deserialize, Serialize};

/// One of the five ranked valuation metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Pe,
    PriceToBook,
    PriceToSales,
    EvToEbitda,
    EvToGrossProfit,
}

impl Metric {
    /// All metrics in column order.
    pub const ALL: [Metric; 5] = [
        Metric::Pe,
        Metric::PriceToBook,
        Metric::PriceToSales,
        Metric::EvToEbitda,
        Metric::EvToGrossProfit,
    ];

    /// Column title of the raw ratio.
    pub fn label(self) -> &'static str {
        match self {
            Metric::Pe => "Price-to-Earnings Ratio",
            Metric::PriceToBook => "Price-to-Book Ratio",
            Metric::PriceToSales => "Price-to-Sales Ratio",
            Metric::EvToEbitda => "EV/EBITDA",
            Metric::EvToGrossProfit => "EV/GP",
        }
    }

    /// Column title of the percentile.
    pub fn percentile_label(self) -> &'static str {
        match self {
            Metric::Pe => "PE Percentile",
            Metric::PriceToBook => "PB Percentile",
            Metric::PriceToSales => "PS Percentile",
            Metric::EvToEbitda => "EV/EBITDA Percentile",
            Metric::EvToGrossProfit => "EV/GP Percentile",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A fully-resolved value for each of the five metrics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricValues {
    pub pe: f64,
    pub price_to_book: f64,
    pub price_to_sales: f64,
    pub ev_to_ebitda: f64,
    pub ev_to_gross_profit: f64,
}

impl MetricValues {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Pe => self.pe,
            Metric::PriceToBook => self.price_to_book,
            Metric::PriceToSales => self.price_to_sales,
            Metric::EvToEbitda => self.ev_to_ebitda,
            Metric::EvToGrossProfit => self.ev_to_gross_profit,
        }
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        match metric {
            Metric::Pe => self.pe = value,
            Metric::PriceToBook => self.price_to_book = value,
            Metric::PriceToSales => self.price_to_sales = value,
            Metric::EvToEbitda => self.ev_to_ebitda = value,
            Metric::EvToGrossProfit => self.ev_to_gross_profit = value,
        }
    }

    /// Arithmetic mean of the five values.
    pub fn mean(&self) -> f64 {
        Metric::ALL.iter().map(|&m| self.get(m)).sum::<f64>() / Metric::ALL.len() as f64
    }
}
