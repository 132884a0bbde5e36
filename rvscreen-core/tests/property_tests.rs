//! Property tests for scoring invariants.
//!
//! Uses proptest to verify:
//! 1. Percentiles stay in [0, 1] and the score is their mean
//! 2. Mean imputation leaves a column's mean unchanged
//! 3. Allocation never overspends and selects min(top_n, N) names
//! 4. Extraction never panics on arbitrary attribute bags

use proptest::prelude::*;
use rvscreen_core::data::RawAttributes;
use rvscreen_core::domain::{Metric, MetricRow, MetricValues, ScoredRow};
use rvscreen_core::rank::{column_mean, impute_mean, rank, ScoreOrder};
use rvscreen_core::{allocate, extract_metrics, DEFAULT_TOP_N};
use serde_json::{json, Value};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_ratio() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        4 => (-50.0..500.0_f64).prop_map(|v| Some((v * 100.0).round() / 100.0)),
        1 => Just(None),
    ]
}

fn arb_price() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        8 => (0.5..2_000.0_f64).prop_map(Some),
        1 => Just(Some(0.0)),
        1 => Just(None),
    ]
}

fn arb_rows(max: usize) -> impl Strategy<Value = Vec<MetricRow>> {
    prop::collection::vec(
        (arb_price(), arb_ratio(), arb_ratio(), arb_ratio(), arb_ratio(), arb_ratio()),
        1..max,
    )
    .prop_map(|cols| {
        cols.into_iter()
            .enumerate()
            .map(|(i, (price, pe, pb, ps, ev_e, ev_gp))| MetricRow {
                symbol: format!("T{i:03}"),
                price,
                pe,
                price_to_book: pb,
                price_to_sales: ps,
                ev_to_ebitda: ev_e,
                ev_to_gross_profit: ev_gp,
            })
            .collect()
    })
}

fn arb_json_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|v| json!(v)),
        (-1e12..1e12_f64).prop_map(|v| json!(v)),
        Just(json!(0)),
        Just(json!("N/A")),
        Just(json!({})),
        Just(json!([1, 2])),
    ]
}

const BAG_KEYS: [&str; 13] = [
    "currentPrice",
    "regularMarketPreviousClose",
    "previousClose",
    "trailingPE",
    "priceToBook",
    "priceToSalesTrailing12Months",
    "enterpriseValue",
    "ebitda",
    "enterpriseToEbitda",
    "grossMargins",
    "totalRevenue",
    "marketCap",
    "currency",
];

fn arb_bag() -> impl Strategy<Value = RawAttributes> {
    prop::collection::vec((prop::sample::select(BAG_KEYS.to_vec()), arb_json_value()), 0..16)
        .prop_map(|pairs| {
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect()
        })
}

fn scored(symbol: String, price: Option<f64>, score: f64) -> ScoredRow {
    ScoredRow {
        symbol,
        price,
        ratios: MetricValues::default(),
        percentiles: MetricValues::default(),
        score,
        imputed: Vec::new(),
    }
}

// ── 1. Percentile bounds and score identity ─────────────────────────

proptest! {
    #[test]
    fn percentiles_are_bounded(rows in arb_rows(80)) {
        let ranking = rank(&rows, ScoreOrder::HighestFirst);
        for r in &ranking.rows {
            for m in Metric::ALL {
                let p = r.percentiles.get(m);
                prop_assert!((0.0..=1.0).contains(&p), "{m} percentile {p} out of range");
            }
        }
    }

    #[test]
    fn score_is_mean_of_five_percentiles(rows in arb_rows(80)) {
        let ranking = rank(&rows, ScoreOrder::HighestFirst);
        for r in &ranking.rows {
            let manual = (r.percentiles.pe
                + r.percentiles.price_to_book
                + r.percentiles.price_to_sales
                + r.percentiles.ev_to_ebitda
                + r.percentiles.ev_to_gross_profit)
                / 5.0;
            prop_assert!((r.score - manual).abs() < 1e-12);
        }
    }

    #[test]
    fn ranking_is_sorted_descending(rows in arb_rows(80)) {
        let ranking = rank(&rows, ScoreOrder::HighestFirst);
        for pair in ranking.rows.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn every_row_is_ranked_or_excluded(rows in arb_rows(80)) {
        let ranking = rank(&rows, ScoreOrder::HighestFirst);
        prop_assert_eq!(
            ranking.rows.len() + ranking.summary.excluded.len(),
            rows.len()
        );
        // Exclusion only happens when some metric is missing everywhere.
        if ranking.summary.failed_metrics.is_empty() {
            prop_assert!(ranking.summary.excluded.is_empty());
        } else {
            prop_assert!(ranking.rows.is_empty());
        }
    }
}

// ── 2. Imputation preserves the mean ────────────────────────────────

proptest! {
    #[test]
    fn imputation_preserves_column_mean(
        mut column in prop::collection::vec(arb_ratio(), 1..60)
    ) {
        prop_assume!(column.iter().any(|v| v.is_some()));
        let before = column_mean(&column).unwrap();
        impute_mean(&mut column).unwrap();
        prop_assert!(column.iter().all(|v| v.is_some()));
        let after = column_mean(&column).unwrap();
        prop_assert!((before - after).abs() <= 1e-9 * before.abs().max(1.0));
    }
}

// ── 3. Allocation ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn allocation_never_overspends(
        prices in prop::collection::vec(arb_price(), 1..120),
        capital in 1.0..10_000_000.0_f64,
    ) {
        let ranked: Vec<ScoredRow> = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| scored(format!("T{i}"), p, 1.0))
            .collect();
        let n = ranked.len();
        let alloc = allocate(ranked, Some(capital), DEFAULT_TOP_N).unwrap();

        prop_assert_eq!(alloc.rows.len(), n.min(DEFAULT_TOP_N));
        prop_assert!(alloc.invested() <= capital * (1.0 + 1e-12));

        let position = capital / alloc.rows.len() as f64;
        for r in &alloc.rows {
            let shares = r.shares_to_buy.unwrap();
            match r.scored.price {
                Some(p) if p > 0.0 => prop_assert!(shares as f64 * p <= position * (1.0 + 1e-12)),
                _ => prop_assert_eq!(shares, 0),
            }
        }
    }
}

// ── 4. Extraction is total ──────────────────────────────────────────

proptest! {
    #[test]
    fn extraction_never_panics_and_never_yields_non_finite(bag in arb_bag()) {
        let row = extract_metrics("X", &bag);
        let fields = [
            row.price,
            row.pe,
            row.price_to_book,
            row.price_to_sales,
            row.ev_to_ebitda,
            row.ev_to_gross_profit,
        ];
        for v in fields.into_iter().flatten() {
            prop_assert!(v.is_finite());
        }
        for m in Metric::ALL {
            if let Some(v) = row.metric(m) {
                prop_assert!(v != 0.0, "{m} must not be zero");
            }
        }
    }
}
