//! Offline provider backed by a JSON document.
//!
//! The document is a single object mapping each symbol to its attribute bag,
//! in the same flattened shape `YahooProvider` produces:
//!
//! ```json
//! { "AAPL": { "currentPrice": 189.5, "trailingPE": 29.4 }, "MSFT": { ... } }
//! ```
//!
//! Symbols not present in the document fail with `SymbolNotFound`, which the
//! fetcher treats like any other per-symbol failure.

use super::provider::{DataError, DataSource, FundamentalsProvider, RawAttributes, TickerRecord};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct FixtureProvider {
    bags: HashMap<String, RawAttributes>,
}

impl FixtureProvider {
    pub fn new(bags: HashMap<String, RawAttributes>) -> Self {
        Self { bags }
    }

    /// Load fixtures from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DataError::Fixture(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    /// Parse fixtures from a JSON string.
    pub fn from_json_str(content: &str) -> Result<Self, DataError> {
        let doc: Value = serde_json::from_str(content)
            .map_err(|e| DataError::Fixture(format!("parse fixture JSON: {e}")))?;

        let Value::Object(symbols) = doc else {
            return Err(DataError::Fixture(
                "fixture document must be an object keyed by symbol".into(),
            ));
        };

        let mut bags = HashMap::with_capacity(symbols.len());
        for (symbol, bag) in symbols {
            match bag {
                Value::Object(attrs) => {
                    bags.insert(symbol.trim().to_uppercase(), attrs);
                }
                other => {
                    return Err(DataError::Fixture(format!(
                        "attributes for '{symbol}' must be an object, got {other}"
                    )))
                }
            }
        }

        Ok(Self { bags })
    }

    /// Number of symbols with fixture data.
    pub fn len(&self) -> usize {
        self.bags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bags.is_empty()
    }
}

impl FundamentalsProvider for FixtureProvider {
    fn name(&self) -> &str {
        "fixture"
    }

    fn fetch(&self, symbol: &str) -> Result<TickerRecord, DataError> {
        let attrs = self
            .bags
            .get(symbol)
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;
        Ok(TickerRecord {
            symbol: symbol.to_string(),
            raw_attributes: attrs.clone(),
            source: DataSource::Fixture,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}
