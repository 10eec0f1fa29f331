//! Brokerage and market-data port.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::SymbolSeries;
use crate::domain::position::PositionSnapshot;
use crate::domain::signal::Side;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Market clock as reported by the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketStatus {
    /// Broker's notion of "now".
    pub timestamp: DateTime<Utc>,
    pub is_open: bool,
    pub next_open: DateTime<Utc>,
    pub next_close: DateTime<Utc>,
}

#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Daily bars ending with the last completed session, oldest first.
    async fn get_daily_history(
        &self,
        symbol: &str,
        lookback: usize,
    ) -> Result<SymbolSeries, TraderError>;

    async fn get_current_price(&self, symbol: &str) -> Result<f64, TraderError>;

    /// Today's opening price, or `None` before the session's first print.
    async fn get_opening_price(&self, symbol: &str) -> Result<Option<f64>, TraderError>;

    /// `Ok(None)` means no position. A failed lookup is an error, never "flat".
    async fn get_position(&self, symbol: &str) -> Result<Option<PositionSnapshot>, TraderError>;

    async fn get_market_status(&self) -> Result<MarketStatus, TraderError>;

    /// Market order; returns the broker's order id.
    async fn submit_order(
        &self,
        symbol: &str,
        quantity: i64,
        side: Side,
    ) -> Result<String, TraderError>;

    async fn get_account_equity(&self) -> Result<f64, TraderError>;
}
