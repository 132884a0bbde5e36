//! Cross-sectional ranking: imputation, percentile ranks, composite score.
//!
//! Pipeline for one run:
//! 1. Fill each metric's missing values with that metric's mean across all rows.
//!    A metric with no values at all cannot be imputed; rows left incomplete are
//!    excluded from the ranked set.
//! 2. Percentile-rank every metric over the ranked set. Ties share the average
//!    of their ranks, so a value's percentile is in `(0, 1]`.
//! 3. Score = mean of the five percentiles.
//! 4. Sort by score, highest first by default. Ties keep input order.
//!
//! A higher raw ratio maps to a higher percentile and so a higher score.

use crate::domain::{Metric, MetricRow, MetricValues, ScoredRow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sort direction applied after scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrder {
    /// Highest composite score first.
    #[default]
    HighestFirst,
    /// Lowest composite score first.
    LowestFirst,
}

/// Bookkeeping from one ranking pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankSummary {
    pub input_rows: usize,
    pub ranked_rows: usize,
    /// Number of values filled with the column mean, per metric.
    pub imputed: BTreeMap<Metric, usize>,
    /// Metrics missing for every row, so imputation was impossible.
    pub failed_metrics: Vec<Metric>,
    /// Symbols dropped because a metric could not be imputed.
    pub excluded: Vec<String>,
}

/// Sorted scored rows plus the summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    pub rows: Vec<ScoredRow>,
    pub summary: RankSummary,
}

/// Mean of the present values, or `None` when there are none.
///
/// Accumulated incrementally so that extreme finite inputs cannot overflow
/// a running sum. A non-finite mean is reported as `None`.
pub fn column_mean(values: &[Option<f64>]) -> Option<f64> {
    let mut mean = 0.0_f64;
    let mut count = 0usize;
    for &v in values.iter().flatten() {
        count += 1;
        let k = count as f64;
        mean += v / k - mean / k;
    }
    (count > 0).then_some(mean).filter(|m| m.is_finite())
}

/// Replace missing values with the column mean. Returns how many were filled,
/// or `None` when the column has no values to average.
pub fn impute_mean(values: &mut [Option<f64>]) -> Option<usize> {
    let mean = column_mean(values)?;
    let mut filled = 0;
    for v in values.iter_mut().filter(|v| v.is_none()) {
        *v = Some(mean);
        filled += 1;
    }
    Some(filled)
}

/// Percentile of every value within its own column, in `O(n log n)`.
pub fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    values
        .iter()
        .map(|&v| {
            let left = sorted.partition_point(|&x| x < v);
            let right = sorted.partition_point(|&x| x <= v);
            let present = usize::from(right > left);
            (left + right + present) as f64 / (2 * n) as f64
        })
        .collect()
}

/// Rank one run's metric rows.
pub fn rank(rows: &[MetricRow], order: ScoreOrder) -> Ranking {
    let mut summary = RankSummary {
        input_rows: rows.len(),
        ..RankSummary::default()
    };

    // Impute column by column over the whole run.
    let mut columns: Vec<Vec<Option<f64>>> = Metric::ALL
        .iter()
        .map(|&m| rows.iter().map(|r| r.metric(m)).collect())
        .collect();

    for (&metric, column) in Metric::ALL.iter().zip(columns.iter_mut()) {
        match impute_mean(column) {
            Some(filled) => {
                if filled > 0 {
                    tracing::debug!(metric = %metric, filled, "imputed missing values with column mean");
                }
                summary.imputed.insert(metric, filled);
            }
            None if !rows.is_empty() => {
                tracing::warn!(metric = %metric, "metric missing for every ticker, cannot impute");
                summary.failed_metrics.push(metric);
            }
            None => {}
        }
    }

    // Keep rows that are complete after imputation.
    let mut kept: Vec<(usize, MetricValues)> = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let mut ratios = MetricValues::default();
        let mut complete = true;
        for (&metric, column) in Metric::ALL.iter().zip(&columns) {
            match column[i] {
                Some(v) => ratios.set(metric, v),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            kept.push((i, ratios));
        } else {
            summary.excluded.push(row.symbol.clone());
        }
    }

    if !summary.excluded.is_empty() {
        tracing::warn!(
            excluded = summary.excluded.len(),
            "rows excluded from scoring after failed imputation"
        );
    }

    // Percentiles per metric over the kept set.
    let mut percentiles = vec![MetricValues::default(); kept.len()];
    for &metric in &Metric::ALL {
        let column: Vec<f64> = kept.iter().map(|(_, r)| r.get(metric)).collect();
        for (p, pct) in percentiles.iter_mut().zip(percentile_ranks(&column)) {
            p.set(metric, pct);
        }
    }

    let mut scored: Vec<ScoredRow> = kept
        .into_iter()
        .zip(percentiles)
        .map(|((i, ratios), pcts)| {
            let source = &rows[i];
            ScoredRow {
                symbol: source.symbol.clone(),
                price: source.price,
                ratios,
                percentiles: pcts,
                score: pcts.mean(),
                imputed: source.missing_metrics(),
            }
        })
        .collect();

    // Stable sort: equal scores keep input order.
    match order {
        ScoreOrder::HighestFirst => scored.sort_by(|a, b| b.score.total_cmp(&a.score)),
        ScoreOrder::LowestFirst => scored.sort_by(|a, b| a.score.total_cmp(&b.score)),
    }

    summary.ranked_rows = scored.len();
    Ranking {
        rows: scored,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Percentile of `score` within `values`, ties averaged.
    ///
    /// `(count(< score) + count(<= score) + [score is present]) / (2n)`. Returns 0
    /// for an empty set.
    fn percentile_of_score(values: &[f64], score: f64) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let left = values.iter().filter(|&&v| v < score).count();
        let right = values.iter().filter(|&&v| v <= score).count();
        let present = usize::from(right > left);
        (left + right + present) as f64 / (2 * values.len()) as f64
    }

    fn row(symbol: &str, pe: Option<f64>) -> MetricRow {
        MetricRow {
            symbol: symbol.into(),
            price: Some(10.0),
            pe,
            price_to_book: Some(1.0),
            price_to_sales: Some(1.0),
            ev_to_ebitda: Some(1.0),
            ev_to_gross_profit: Some(1.0),
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn percentile_matches_fractional_rank() {
        let values = [10.0, 20.0, 15.0];
        let ranks = percentile_ranks(&values);
        assert!(approx(ranks[0], 1.0 / 3.0));
        assert!(approx(ranks[1], 1.0));
        assert!(approx(ranks[2], 2.0 / 3.0));
    }

    #[test]
    fn ties_average_their_ranks() {
        let ranks = percentile_ranks(&[1.0, 1.0, 1.0, 1.0]);
        for r in ranks {
            assert!(approx(r, 0.625));
        }

        let ranks = percentile_ranks(&[1.0, 2.0, 2.0, 3.0]);
        assert!(approx(ranks[0], 0.25));
        assert!(approx(ranks[1], 0.625));
        assert!(approx(ranks[2], 0.625));
        assert!(approx(ranks[3], 1.0));
    }

    #[test]
    fn fast_and_direct_percentiles_agree() {
        let values = [3.0, -1.0, 3.0, 7.5, 0.0, 3.0, 12.0];
        let fast = percentile_ranks(&values);
        for (v, f) in values.iter().zip(fast) {
            assert!(approx(percentile_of_score(&values, *v), f));
        }
    }

    #[test]
    fn percentile_of_absent_score() {
        assert!(approx(percentile_of_score(&[1.0, 2.0, 3.0, 4.0], 2.5), 0.5));
        assert_eq!(percentile_of_score(&[], 1.0), 0.0);
    }

    #[test]
    fn imputation_fills_with_mean() {
        let mut col = vec![Some(10.0), None, Some(20.0)];
        assert_eq!(impute_mean(&mut col), Some(1));
        assert_eq!(col, vec![Some(10.0), Some(15.0), Some(20.0)]);
    }

    #[test]
    fn imputation_of_all_missing_column_fails() {
        let mut col = vec![None, None];
        assert_eq!(impute_mean(&mut col), None);
        assert_eq!(column_mean(&[]), None);
    }

    #[test]
    fn mean_of_extreme_values_stays_finite() {
        assert_eq!(column_mean(&[Some(f64::MAX), Some(f64::MAX), None]), Some(f64::MAX));
        assert_eq!(column_mean(&[Some(f64::MAX), Some(-f64::MAX)]), Some(0.0));
        assert!(approx(column_mean(&[Some(1.0), Some(2.0), Some(6.0)]).unwrap(), 3.0));
    }

    #[test]
    fn extreme_ratios_impute_a_finite_value() {
        let rows = vec![
            row("A", Some(f64::MAX)),
            row("B", Some(f64::MAX)),
            row("C", None),
        ];
        let ranking = rank(&rows, ScoreOrder::HighestFirst);
        assert_eq!(ranking.summary.ranked_rows, 3);
        assert!(ranking.summary.failed_metrics.is_empty());
        for r in &ranking.rows {
            assert!(r.ratios.pe.is_finite());
            assert!(r.score.is_finite());
        }
    }

    #[test]
    fn three_ticker_example() {
        let rows = vec![row("A", Some(10.0)), row("B", Some(20.0)), row("C", None)];
        let ranking = rank(&rows, ScoreOrder::HighestFirst);

        let order: Vec<&str> = ranking.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["B", "C", "A"]);

        let c = &ranking.rows[1];
        assert!(approx(c.ratios.pe, 15.0));
        assert!(approx(c.percentiles.pe, 2.0 / 3.0));
        assert_eq!(c.imputed, vec![Metric::Pe]);

        let a = &ranking.rows[2];
        assert!(approx(a.percentiles.pe, 1.0 / 3.0));
        assert_eq!(ranking.summary.imputed[&Metric::Pe], 1);
        assert_eq!(ranking.summary.ranked_rows, 3);
    }

    #[test]
    fn score_is_mean_of_percentiles() {
        let rows = vec![row("A", Some(10.0)), row("B", Some(20.0))];
        for r in rank(&rows, ScoreOrder::HighestFirst).rows {
            assert!(approx(r.score, r.percentiles.mean()));
        }
    }

    #[test]
    fn lowest_first_reverses_order() {
        let rows = vec![row("A", Some(10.0)), row("B", Some(20.0)), row("C", None)];
        let ranking = rank(&rows, ScoreOrder::LowestFirst);
        let order: Vec<&str> = ranking.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["A", "C", "B"]);
    }

    #[test]
    fn equal_scores_keep_input_order() {
        let rows = vec![row("Z", Some(5.0)), row("M", Some(5.0)), row("A", Some(5.0))];
        let ranking = rank(&rows, ScoreOrder::HighestFirst);
        let order: Vec<&str> = ranking.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["Z", "M", "A"]);
    }

    #[test]
    fn metric_missing_everywhere_excludes_all_rows() {
        let rows = vec![row("A", None), row("B", None)];
        let ranking = rank(&rows, ScoreOrder::HighestFirst);
        assert!(ranking.rows.is_empty());
        assert_eq!(ranking.summary.failed_metrics, vec![Metric::Pe]);
        assert_eq!(ranking.summary.excluded, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn empty_input_ranks_nothing() {
        let ranking = rank(&[], ScoreOrder::HighestFirst);
        assert!(ranking.rows.is_empty());
        assert!(ranking.summary.failed_metrics.is_empty());
    }
}
