//! Universe loading: the ordered list of tickers eligible for scoring.
//!
//! The universe is stored as a one-column CSV file with header `Ticker`.
//! Extra columns are ignored. Symbols are trimmed and upper-cased, blank rows
//! skipped, and duplicates dropped (first occurrence wins).

use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Name of the column holding ticker symbols.
pub const TICKER_COLUMN: &str = "Ticker";

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse universe CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("universe CSV has no 'Ticker' column")]
    MissingTickerColumn,
}

/// Ordered set of unique ticker symbols, immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    tickers: Vec<String>,
}

impl Universe {
    /// Build a universe from symbols, normalizing and de-duplicating.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut tickers = Vec::new();
        for raw in symbols {
            let symbol = raw.as_ref().trim().to_uppercase();
            if symbol.is_empty() {
                continue;
            }
            if seen.insert(symbol.clone()) {
                tickers.push(symbol);
            } else {
                tracing::warn!(symbol = %symbol, "duplicate ticker in universe, keeping first");
            }
        }
        Self { tickers }
    }

    /// Load a universe from a CSV file.
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_csv_str(&content)
    }

    /// Parse a universe from CSV text.
    pub fn from_csv_str(content: &str) -> Result<Self, UniverseError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let column = reader
            .headers()?
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}') == TICKER_COLUMN)
            .ok_or(UniverseError::MissingTickerColumn)?;

        let mut symbols = Vec::new();
        for record in reader.records() {
            let record = record?;
            if let Some(symbol) = record.get(column) {
                symbols.push(symbol.to_string());
            }
        }

        Ok(Self::from_symbols(symbols))
    }

    /// All tickers in file order.
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Total number of tickers.
    pub fn ticker_count(&self) -> usize {
        self.tickers.len()
    }
}
