//! Symbol universe parsing and history coverage checks.

use crate::domain::error::TraderError;
use crate::ports::store_port::TradeStorePort;
use std::collections::HashSet;

/// Daily bars needed to arm every strategy variant with default settings.
pub const MIN_DAILY_BARS: usize = 21;

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub symbols: Vec<String>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.symbols.len()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Coverage {
    Ready { bars: usize },
    Partial { bars: usize },
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverageReport {
    pub universe: Universe,
    pub coverage: Vec<(String, Coverage)>,
}

impl CoverageReport {
    pub fn ready_count(&self) -> usize {
        self.coverage
            .iter()
            .filter(|(_, c)| matches!(c, Coverage::Ready { .. }))
            .count()
    }
}

/// How much stored daily history each symbol has. Partial or missing coverage is
/// reported, not fatal: those symbols simply stay un-armed on the day.
pub fn check_coverage(
    store: &dyn TradeStorePort,
    symbols: Vec<String>,
    lookback: usize,
) -> Result<CoverageReport, TraderError> {
    let mut coverage = Vec::with_capacity(symbols.len());
    let required = MIN_DAILY_BARS.min(lookback.max(1));

    for symbol in &symbols {
        let bars = store.query_recent_history(symbol, lookback)?.to_daily().len();
        let status = match bars {
            0 => Coverage::Missing,
            n if n < required => Coverage::Partial { bars: n },
            n => Coverage::Ready { bars: n },
        };
        coverage.push((symbol.clone(), status));
    }

    Ok(CoverageReport {
        universe: Universe { symbols },
        coverage,
    })
}
