//! OHLCV bars and per-symbol series.

use crate::domain::error::TraderError;
use chrono::{NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// high - low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Ordered bars for one symbol. Timestamps are strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSeries {
    symbol: String,
    bars: Vec<OhlcvBar>,
}

impl SymbolSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<OhlcvBar>) -> Result<Self, TraderError> {
        let symbol = symbol.into();
        for pair in bars.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(TraderError::InvalidSeries {
                    symbol,
                    reason: format!(
                        "timestamp {} does not follow {}",
                        pair[1].timestamp, pair[0].timestamp
                    ),
                });
            }
        }
        Ok(Self { symbol, bars })
    }

    /// Sorts by timestamp and keeps the last bar seen for any duplicated timestamp.
    pub fn from_unordered(symbol: impl Into<String>, mut bars: Vec<OhlcvBar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        let mut deduped: Vec<OhlcvBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self {
            symbol: symbol.into(),
            bars: deduped,
        }
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&OhlcvBar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// The trailing `n` bars (or all of them when shorter).
    pub fn tail(&self, n: usize) -> SymbolSeries {
        let start = self.bars.len().saturating_sub(n);
        Self {
            symbol: self.symbol.clone(),
            bars: self.bars[start..].to_vec(),
        }
    }

    /// Collapse intraday bars into one bar per calendar date: first open, max high,
    /// min low, last close, summed volume. Daily input passes through unchanged.
    pub fn to_daily(&self) -> SymbolSeries {
        let mut daily: Vec<OhlcvBar> = Vec::new();
        for bar in &self.bars {
            match daily.last_mut() {
                Some(day) if day.date() == bar.date() => {
                    day.high = day.high.max(bar.high);
                    day.low = day.low.min(bar.low);
                    day.close = bar.close;
                    day.volume += bar.volume;
                }
                _ => daily.push(OhlcvBar {
                    timestamp: bar.date().and_time(chrono::NaiveTime::MIN),
                    ..bar.clone()
                }),
            }
        }
        Self {
            symbol: self.symbol.clone(),
            bars: daily,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M").unwrap()
    }

    fn bar(at: NaiveDateTime, open: f64, high: f64, low: f64, close: f64) -> OhlcvBar {
        OhlcvBar {
            timestamp: at,
            open,
            high,
            low,
            close,
            volume: 100,
        }
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let at = ts("2024-01-02", "09:30");
        let result = SymbolSeries::new(
            "NVDA",
            vec![bar(at, 1.0, 1.0, 1.0, 1.0), bar(at, 2.0, 2.0, 2.0, 2.0)],
        );
        assert!(matches!(result, Err(TraderError::InvalidSeries { .. })));
    }

    #[test]
    fn rejects_decreasing_timestamps() {
        let result = SymbolSeries::new(
            "NVDA",
            vec![
                bar(ts("2024-01-03", "00:00"), 1.0, 1.0, 1.0, 1.0),
                bar(ts("2024-01-02", "00:00"), 1.0, 1.0, 1.0, 1.0),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn from_unordered_sorts_and_dedups() {
        let series = SymbolSeries::from_unordered(
            "AMD",
            vec![
                bar(ts("2024-01-03", "00:00"), 3.0, 3.0, 3.0, 3.0),
                bar(ts("2024-01-02", "00:00"), 2.0, 2.0, 2.0, 2.0),
                bar(ts("2024-01-03", "00:00"), 4.0, 4.0, 4.0, 4.0),
            ],
        );
        assert_eq!(series.closes(), vec![2.0, 4.0]);
    }

    #[test]
    fn to_daily_aggregates_intraday_bars() {
        let series = SymbolSeries::new(
            "TSLA",
            vec![
                bar(ts("2024-01-02", "09:30"), 10.0, 11.0, 9.5, 10.5),
                bar(ts("2024-01-02", "09:31"), 10.5, 12.0, 10.0, 11.5),
                bar(ts("2024-01-03", "09:30"), 11.5, 11.6, 8.0, 9.0),
            ],
        )
        .unwrap();

        let daily = series.to_daily();
        assert_eq!(daily.len(), 2);
        let first = &daily.bars()[0];
        assert_eq!(first.open, 10.0);
        assert_eq!(first.high, 12.0);
        assert_eq!(first.low, 9.5);
        assert_eq!(first.close, 11.5);
        assert_eq!(first.volume, 200);
        assert_eq!(first.timestamp, ts("2024-01-02", "00:00"));
    }

    #[test]
    fn tail_keeps_most_recent_bars() {
        let bars = (1..=5)
            .map(|d| {
                bar(
                    ts(&format!("2024-01-0{d}"), "00:00"),
                    d as f64,
                    d as f64,
                    d as f64,
                    d as f64,
                )
            })
            .collect();
        let series = SymbolSeries::new("PLTR", bars).unwrap();
        assert_eq!(series.tail(2).closes(), vec![4.0, 5.0]);
        assert_eq!(series.tail(10).len(), 5);
    }
}
