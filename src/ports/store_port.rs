//! Persistence port: trade log, bar history and calibration records.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::SymbolSeries;
use crate::domain::trade::{StrategyParams, TradeRecord};

pub trait TradeStorePort: Send + Sync {
    fn append_trade_record(&self, record: &TradeRecord) -> Result<(), TraderError>;

    /// The most recent `n` stored bars for `symbol`, oldest first.
    fn query_recent_history(&self, symbol: &str, n: usize) -> Result<SymbolSeries, TraderError>;

    /// Upserts bars; returns how many were written.
    fn store_bars(&self, series: &SymbolSeries) -> Result<usize, TraderError>;

    fn record_strategy_params(&self, params: &StrategyParams) -> Result<(), TraderError>;

    /// Newest first.
    fn list_trade_records(
        &self,
        symbol: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TradeRecord>, TraderError>;
}
