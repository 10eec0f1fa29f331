//! Order sizing and the order-in-flight guard.
//!
//! Sizing is whole shares only: quantity = floor(allocation / price). A zero quantity
//! means the order is not placed.
//!
//! The guard suppresses repeat submissions for a symbol while an earlier order has not
//! yet shown up in the broker's position snapshot.

use crate::domain::position::PositionSnapshot;
use crate::domain::signal::Side;
use std::collections::HashMap;

/// Whole shares purchasable with `allocation` at `price`.
pub fn order_quantity(allocation: f64, price: f64) -> i64 {
    if !(price > 0.0) || !(allocation > 0.0) {
        return 0;
    }
    (allocation / price).floor() as i64
}

/// Capital per symbol when the allocation is derived from account equity.
pub fn allocation_per_symbol(equity: f64, allocation_factor: f64, symbol_count: usize) -> f64 {
    if symbol_count == 0 || equity <= 0.0 {
        return 0.0;
    }
    equity * allocation_factor / symbol_count as f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct InFlightOrder {
    side: Side,
    submitted_tick: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderGuard {
    expiry_ticks: u64,
    in_flight: HashMap<String, InFlightOrder>,
}

impl OrderGuard {
    pub fn new(expiry_ticks: u64) -> Self {
        Self {
            expiry_ticks,
            in_flight: HashMap::new(),
        }
    }

    pub fn record(&mut self, symbol: &str, side: Side, tick: u64) {
        self.in_flight.insert(
            symbol.to_string(),
            InFlightOrder {
                side,
                submitted_tick: tick,
            },
        );
    }

    /// Clears the symbol's entry once `position` reflects the order or the entry
    /// expires. Returns true while the symbol is still blocked.
    pub fn is_blocked(&mut self, position: &PositionSnapshot, tick: u64) -> bool {
        let Some(order) = self.in_flight.get(&position.symbol).copied() else {
            return false;
        };

        let filled = match order.side {
            Side::Buy => position.is_long(),
            Side::Sell => position.is_flat(),
        };
        let expired = tick.saturating_sub(order.submitted_tick) >= self.expiry_ticks;

        if filled || expired {
            if expired && !filled {
                log::warn!(
                    "[{}] {} order unconfirmed after {} ticks; releasing guard",
                    position.symbol,
                    order.side,
                    self.expiry_ticks
                );
            }
            self.in_flight.remove(&position.symbol);
            return false;
        }
        true
    }

    pub fn pending(&self, symbol: &str) -> Option<Side> {
        self.in_flight.get(symbol).map(|o| o.side)
    }

    pub fn clear(&mut self) {
        self.in_flight.clear();
    }
}
