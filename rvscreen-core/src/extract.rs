//! Metric extraction: raw attribute bag → `MetricRow`.
//!
//! Extraction never fails. Any anomaly (absent key, placeholder string, null,
//! zero, non-finite number, undefined division) degrades that one field to
//! `None` and leaves the rest of the row intact.

use crate::data::provider::{RawAttributes, TickerRecord};
use crate::domain::MetricRow;
use serde_json::Value;

/// Price keys in fallback order.
pub const PRICE_KEYS: [&str; 3] = ["currentPrice", "regularMarketPreviousClose", "previousClose"];

pub const TRAILING_PE: &str = "trailingPE";
pub const PRICE_TO_BOOK: &str = "priceToBook";
pub const PRICE_TO_SALES: &str = "priceToSalesTrailing12Months";
pub const ENTERPRISE_VALUE: &str = "enterpriseValue";
pub const EBITDA: &str = "ebitda";
pub const ENTERPRISE_TO_EBITDA: &str = "enterpriseToEbitda";
pub const GROSS_MARGINS: &str = "grossMargins";
pub const TOTAL_REVENUE: &str = "totalRevenue";

/// A numeric value that is present, is a JSON number, and is finite.
///
/// Strings are rejected even when they parse as numbers: providers put
/// placeholders such as `"N/A"` or `"Infinity"` in numeric slots.
fn accepted(bag: &RawAttributes, key: &str) -> Option<f64> {
    match bag.get(key)? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// An accepted value that is also non-zero.
fn truthy(bag: &RawAttributes, key: &str) -> Option<f64> {
    accepted(bag, key).filter(|&v| v != 0.0)
}

/// `numerator / denominator`, or `None` when either side is missing, the
/// denominator is zero, or the quotient is not finite.
pub fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (n, d) = (numerator?, denominator?);
    if d == 0.0 {
        return None;
    }
    Some(n / d).filter(|q| q.is_finite())
}

/// Extract the price and five valuation ratios for one symbol.
pub fn extract_metrics(symbol: &str, bag: &RawAttributes) -> MetricRow {
    let price = PRICE_KEYS.iter().find_map(|key| accepted(bag, key));

    let enterprise_value = truthy(bag, ENTERPRISE_VALUE);
    let ebitda = truthy(bag, EBITDA);
    let gross_profit = match (truthy(bag, GROSS_MARGINS), truthy(bag, TOTAL_REVENUE)) {
        (Some(margin), Some(revenue)) => Some(margin * revenue).filter(|gp| gp.is_finite()),
        _ => None,
    };

    let ev_to_ebitda = truthy(bag, ENTERPRISE_TO_EBITDA).or_else(|| ratio(enterprise_value, ebitda));
    let ev_to_gross_profit = ratio(enterprise_value, gross_profit);

    MetricRow {
        symbol: symbol.to_string(),
        price,
        pe: truthy(bag, TRAILING_PE),
        price_to_book: truthy(bag, PRICE_TO_BOOK),
        price_to_sales: truthy(bag, PRICE_TO_SALES),
        ev_to_ebitda,
        ev_to_gross_profit,
    }
}

/// Extract every fetched record, preserving order.
pub fn extract_all(records: &[TickerRecord]) -> Vec<MetricRow> {
    records
        .iter()
        .map(|rec| extract_metrics(&rec.symbol, &rec.raw_attributes))
        .collect()
}
