//! Volatility breakout.
//!
//! target = today's open + (prior high - prior low) * k
//!
//! The range component is known before the session; the open is not. The target is
//! therefore built in two steps: `on_market_open` leaves it [`BreakoutTarget::Pending`]
//! and `update_target` arms it once the opening price is published.
//!
//! Rules, in evaluation order:
//! 1. Long and down 3% or more from entry: SELL (regardless of target state)
//! 2. Target not armed: no signal
//! 3. Flat, price >= target, and price >= trend SMA (when the filter is active): BUY

use super::{SignalInputs, Strategy, StrategyKind};
use crate::domain::error::TraderError;
use crate::domain::indicator::sma;
use crate::domain::ohlcv::SymbolSeries;
use crate::domain::optimizer::optimize_k;
use crate::domain::position::return_from_entry;
use crate::domain::signal::Signal;

pub const STOP_LOSS_PCT: f64 = 0.03;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BreakoutTarget {
    /// No history processed for today.
    Unarmed,
    /// Range component known, waiting for the session open.
    Pending { range_k: f64 },
    Armed { target: f64 },
}

#[derive(Debug, Clone)]
pub struct Breakout {
    symbol: String,
    k: f64,
    trend_window: Option<usize>,
    trend_sma: Option<f64>,
    target: BreakoutTarget,
}

impl Breakout {
    pub fn new(symbol: &str, k: f64, trend_window: Option<usize>) -> Self {
        Self {
            symbol: symbol.to_string(),
            k,
            trend_window,
            trend_sma: None,
            target: BreakoutTarget::Unarmed,
        }
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    pub fn set_k(&mut self, k: f64) {
        self.k = k;
    }

    pub fn target(&self) -> BreakoutTarget {
        self.target
    }

    pub fn trend_sma(&self) -> Option<f64> {
        self.trend_sma
    }
}

impl Strategy for Breakout {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Breakout
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn calibrate(&mut self, daily_history: &SymbolSeries) -> Result<Option<f64>, TraderError> {
        let result = optimize_k(daily_history)?;
        log::info!(
            "[{}] {} optimized k={:.1} (aggregate return {:.4})",
            self.symbol,
            self.name(),
            result.best_k,
            result.best_return
        );
        self.k = result.best_k;
        Ok(Some(result.best_k))
    }

    fn on_market_open(&mut self, daily_history: &SymbolSeries) -> Result<(), TraderError> {
        let Some(last) = daily_history.last() else {
            self.target = BreakoutTarget::Unarmed;
            self.trend_sma = None;
            return Err(TraderError::InsufficientHistory {
                required: 1,
                available: 0,
            });
        };

        let range_k = last.range() * self.k;
        // Too little history for the trend window disables the filter for the day.
        self.trend_sma = self
            .trend_window
            .and_then(|window| sma(&daily_history.closes(), window).ok());
        self.target = BreakoutTarget::Pending { range_k };

        log::info!(
            "[{}] {} initialized: k={:.1} range={:.2} trend_sma={}",
            self.symbol,
            self.name(),
            self.k,
            last.range(),
            self.trend_sma
                .map(|v| format!("{v:.2}"))
                .unwrap_or_else(|| "off".to_string())
        );
        Ok(())
    }

    fn generate_signal(&self, inputs: &SignalInputs) -> Option<Signal> {
        let price = inputs.current_price;

        if inputs.current_qty > 0 {
            if let Some(change) = return_from_entry(price, inputs.avg_entry_price) {
                if change <= -STOP_LOSS_PCT {
                    return Some(Signal::sell(price, "Stop Loss (-3%)"));
                }
            }
        }

        let BreakoutTarget::Armed { target } = self.target else {
            return None;
        };

        if inputs.current_qty == 0 && price >= target {
            if let Some(trend) = self.trend_sma {
                if price < trend {
                    return None;
                }
            }
            return Some(Signal::buy(price, "Volatility Breakout"));
        }

        None
    }

    fn on_market_close(&mut self) {
        self.target = BreakoutTarget::Unarmed;
        self.trend_sma = None;
    }

    fn is_ready(&self) -> bool {
        matches!(self.target, BreakoutTarget::Armed { .. })
    }

    fn awaiting_open_price(&self) -> bool {
        matches!(self.target, BreakoutTarget::Pending { .. })
    }

    fn update_target(&mut self, open_price: f64) {
        if let BreakoutTarget::Pending { range_k } = self.target {
            let target = open_price + range_k;
            self.target = BreakoutTarget::Armed { target };
            log::info!(
                "[{}] {} target set: {:.2} (open {:.2} + range*k {:.2})",
                self.symbol,
                self.name(),
                target,
                open_price,
                range_k
            );
        }
    }

    fn target_price(&self) -> Option<f64> {
        match self.target {
            BreakoutTarget::Armed { target } => Some(target),
            _ => None,
        }
    }

    fn calibrated_k(&self) -> Option<f64> {
        Some(self.k)
    }

    fn describe(&self) -> String {
        match self.target {
            BreakoutTarget::Unarmed => format!("{} k={:.1} unarmed", self.name(), self.k),
            BreakoutTarget::Pending { range_k } => {
                format!("{} k={:.1} waiting for open (range*k {:.2})", self.name(), self.k, range_k)
            }
            BreakoutTarget::Armed { target } => {
                format!("{} k={:.1} target {:.2}", self.name(), self.k, target)
            }
        }
    }
}
