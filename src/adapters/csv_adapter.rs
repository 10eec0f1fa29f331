//! CSV bar files, one `<SYMBOL>.csv` per symbol.
//!
//! Columns: timestamp, open, high, low, close, volume. The timestamp is either a
//! date (`2024-03-04`) or a date-time (`2024-03-04 09:31:00`).

use crate::domain::error::TraderError;
use crate::domain::ohlcv::{OhlcvBar, SymbolSeries};
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    /// Every bar in `<symbol>.csv`, sorted; duplicate timestamps keep the last row.
    pub fn load_series(&self, symbol: &str) -> Result<SymbolSeries, TraderError> {
        let path = self.csv_path(symbol);
        let unavailable = |reason: String| TraderError::DataUnavailable {
            symbol: symbol.to_string(),
            reason,
        };

        let content = fs::read_to_string(&path)
            .map_err(|e| unavailable(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| unavailable(format!("CSV parse error: {}", e)))?;

            let ts_str = record
                .get(0)
                .ok_or_else(|| unavailable("missing timestamp column".into()))?;
            let timestamp = parse_timestamp(ts_str.trim())
                .ok_or_else(|| unavailable(format!("invalid timestamp '{}'", ts_str)))?;

            let mut prices = [0.0f64; 4];
            for (i, (column, slot)) in ["open", "high", "low", "close"]
                .iter()
                .zip(prices.iter_mut())
                .enumerate()
            {
                *slot = record
                    .get(i + 1)
                    .ok_or_else(|| unavailable(format!("missing {} column", column)))?
                    .trim()
                    .parse()
                    .map_err(|e| unavailable(format!("invalid {} value: {}", column, e)))?;
            }

            let volume: i64 = record
                .get(5)
                .ok_or_else(|| unavailable("missing volume column".into()))?
                .trim()
                .parse()
                .map_err(|e| unavailable(format!("invalid volume value: {}", e)))?;

            let [open, high, low, close] = prices;
            bars.push(OhlcvBar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        Ok(SymbolSeries::from_unordered(symbol, bars))
    }

    pub fn list_symbols(&self) -> Result<Vec<String>, TraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| TraderError::DataUnavailable {
            symbol: "*".into(),
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(symbol) = name_str.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
