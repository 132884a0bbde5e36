//! Reporting and export: JSON, CSV, and Markdown.
//!
//! - **JSON**: full `ScreenResult` round-trip with schema versioning
//! - **CSV**: the result table, one row per ticker, original column titles
//! - **Markdown**: the same table plus run metadata, for terminals and reports
//!
//! Persisted JSON carries a `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rvscreen_core::domain::{Metric, PortfolioRow};
use rvscreen_core::AllocationMode;

use crate::screen::{ScreenResult, SCHEMA_VERSION};

/// Result table header, in output order.
pub const RESULT_COLUMNS: [&str; 14] = [
    "Ticker",
    "Price",
    "Number of Shares to Buy",
    "Price-to-Earnings Ratio",
    "PE Percentile",
    "Price-to-Book Ratio",
    "PB Percentile",
    "Price-to-Sales Ratio",
    "PS Percentile",
    "EV/EBITDA",
    "EV/EBITDA Percentile",
    "EV/GP",
    "EV/GP Percentile",
    "RV Score",
];

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `ScreenResult` to pretty JSON.
pub fn export_json(result: &ScreenResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize ScreenResult to JSON")
}

/// Deserialize a `ScreenResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<ScreenResult> {
    let result: ScreenResult =
        serde_json::from_str(json).context("failed to deserialize ScreenResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

/// Write the JSON result to `path`.
pub fn save_json(result: &ScreenResult, path: &Path) -> Result<()> {
    let json = export_json(result)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

// ─── CSV export ─────────────────────────────────────────────────────

fn table_cells(row: &PortfolioRow) -> Vec<String> {
    let s = &row.scored;
    let mut cells = Vec::with_capacity(RESULT_COLUMNS.len());
    cells.push(s.symbol.clone());
    cells.push(s.price.map(|p| format!("{p:.2}")).unwrap_or_default());
    cells.push(row.shares_to_buy.map(|n| n.to_string()).unwrap_or_default());
    for metric in Metric::ALL {
        cells.push(format!("{:.4}", s.ratios.get(metric)));
        cells.push(format!("{:.4}", s.percentiles.get(metric)));
    }
    cells.push(format!("{:.4}", s.score));
    cells
}

/// Export the result table as CSV.
///
/// Returns `None` for an empty table: there is nothing worth a header-only file.
/// Missing prices and preview-mode share counts are written as empty cells.
pub fn export_csv(rows: &[PortfolioRow]) -> Result<Option<String>> {
    if rows.is_empty() {
        return Ok(None);
    }

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(RESULT_COLUMNS)?;
    for row in rows {
        wtr.write_record(table_cells(row))?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data)
        .map(Some)
        .context("CSV output is not valid UTF-8")
}

/// Write the CSV table to `path`. An empty table writes nothing and returns `None`.
pub fn save_csv(rows: &[PortfolioRow], path: &Path) -> Result<Option<PathBuf>> {
    let Some(csv) = export_csv(rows)? else {
        tracing::info!(path = %path.display(), "empty result, CSV not written");
        return Ok(None);
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(Some(path.to_path_buf()))
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Markdown table of the rows, no metadata.
pub fn render_table(rows: &[PortfolioRow]) -> String {
    let mut md = String::with_capacity(256 + rows.len() * 160);
    md.push_str(&format!("| {} |\n", RESULT_COLUMNS.join(" | ")));
    md.push('|');
    for i in 0..RESULT_COLUMNS.len() {
        md.push_str(if i == 0 { " --- |" } else { " ---: |" });
    }
    md.push('\n');
    for row in rows {
        md.push_str(&format!("| {} |\n", table_cells(row).join(" | ")));
    }
    md
}

/// Full Markdown report for one run.
pub fn render_markdown(result: &ScreenResult) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# Robust Value Screen\n\n");

    md.push_str("## Run\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!(
        "| Generated | {} |\n",
        result.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!("| Provider | {} |\n", result.provider));
    md.push_str(&format!(
        "| Universe | {} tickers ({} fetched, {} failed) |\n",
        result.universe_size,
        result.fetched,
        result.failed_symbols.len()
    ));
    md.push_str(&format!(
        "| Ranked | {} |\n",
        result.rank_summary.ranked_rows
    ));
    match result.mode {
        AllocationMode::Preview => md.push_str("| Mode | Preview (no capital) |\n"),
        AllocationMode::EqualWeight {
            capital,
            position_size,
        } => {
            md.push_str(&format!("| Capital | ${capital:.2} |\n"));
            md.push_str(&format!("| Position Size | ${position_size:.2} |\n"));
            md.push_str(&format!("| Invested | ${:.2} |\n", result.invested));
        }
    }
    md.push_str(&format!("| Dataset Hash | {} |\n", result.dataset_hash));
    if result.cache_hit {
        md.push_str("| Fetch | cached |\n");
    }
    md.push('\n');

    md.push_str("## Holdings\n\n");
    md.push_str(&render_table(&result.rows));
    md.push('\n');

    let summary = &result.rank_summary;
    let imputed: Vec<String> = summary
        .imputed
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(m, n)| format!("{m}: {n}"))
        .collect();
    if !result.failed_symbols.is_empty()
        || !imputed.is_empty()
        || !summary.failed_metrics.is_empty()
        || !summary.excluded.is_empty()
    {
        md.push_str("## Data Quality\n\n");
        if !result.failed_symbols.is_empty() {
            md.push_str(&format!(
                "- Fetch failed: {}\n",
                result.failed_symbols.join(", ")
            ));
        }
        if !imputed.is_empty() {
            md.push_str(&format!("- Imputed with column mean: {}\n", imputed.join(", ")));
        }
        for metric in &summary.failed_metrics {
            md.push_str(&format!("- No values at all for {metric}\n"));
        }
        if !summary.excluded.is_empty() {
            md.push_str(&format!(
                "- Excluded from scoring: {}\n",
                summary.excluded.join(", ")
            ));
        }
        md.push('\n');
    }

    md
}
