//! Append-only trade audit records.

use crate::domain::signal::Side;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub side: Side,
    pub quantity: i64,
    pub price: f64,
    pub reason: String,
    pub order_id: String,
    pub strategy_name: String,
}

impl TradeRecord {
    pub fn notional(&self) -> f64 {
        self.quantity as f64 * self.price
    }
}

/// Calibration output persisted once per symbol per day.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub date: chrono::NaiveDate,
    pub symbol: String,
    pub k: f64,
    pub target_price: Option<f64>,
}
