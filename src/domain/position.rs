//! Broker position snapshots.

/// Quantity held and average entry price for one symbol, as reported by the broker
/// for the current tick. Never carried over to the next tick.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub quantity: i64,
    pub avg_entry_price: f64,
}

impl PositionSnapshot {
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            quantity: 0,
            avg_entry_price: 0.0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity.unsigned_abs() as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.avg_entry_price)
    }
}

/// (price - entry) / entry, or `None` without a usable entry price.
pub fn return_from_entry(current_price: f64, avg_entry_price: f64) -> Option<f64> {
    if avg_entry_price > 0.0 {
        Some((current_price - avg_entry_price) / avg_entry_price)
    } else {
        None
    }
}
