//! RSI pullback in an uptrend.
//!
//! Daily SMA(trend window) is fixed at market open; the RSI is supplied per call by
//! the caller, since an intraday RSI cannot be derived from daily bars alone.
//! - No RSI supplied: no signal
//! - Flat, price > SMA and 40 <= RSI <= 50: BUY
//! - Long and up 5% or more from entry: SELL
//! - Long and RSI >= 70: SELL

use super::{SignalInputs, Strategy, StrategyKind};
use crate::domain::error::TraderError;
use crate::domain::indicator::{rsi, sma};
use crate::domain::ohlcv::SymbolSeries;
use crate::domain::position::return_from_entry;
use crate::domain::signal::Signal;

pub const ENTRY_RSI_LOW: f64 = 40.0;
pub const ENTRY_RSI_HIGH: f64 = 50.0;
pub const EXIT_RSI: f64 = 70.0;
pub const TAKE_PROFIT_PCT: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct Momentum {
    symbol: String,
    sma_period: usize,
    rsi_period: usize,
    daily_sma: Option<f64>,
    prev_rsi: Option<f64>,
}

impl Momentum {
    pub fn new(symbol: &str, sma_period: usize, rsi_period: usize) -> Self {
        Self {
            symbol: symbol.to_string(),
            sma_period,
            rsi_period,
            daily_sma: None,
            prev_rsi: None,
        }
    }

    pub fn daily_sma(&self) -> Option<f64> {
        self.daily_sma
    }

    /// RSI as of the prior session's close.
    pub fn prev_rsi(&self) -> Option<f64> {
        self.prev_rsi
    }
}

impl Strategy for Momentum {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Momentum
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn on_market_open(&mut self, daily_history: &SymbolSeries) -> Result<(), TraderError> {
        let closes = daily_history.closes();
        let computed = sma(&closes, self.sma_period)
            .and_then(|trend| rsi(&closes, self.rsi_period).map(|r| (trend, r)));

        match computed {
            Ok((trend, prev)) => {
                log::info!(
                    "[{}] {} initialized: sma={:.2} prev_rsi={:.2}",
                    self.symbol,
                    self.name(),
                    trend,
                    prev
                );
                self.daily_sma = Some(trend);
                self.prev_rsi = Some(prev);
                Ok(())
            }
            Err(e) => {
                self.daily_sma = None;
                self.prev_rsi = None;
                Err(e)
            }
        }
    }

    fn generate_signal(&self, inputs: &SignalInputs) -> Option<Signal> {
        let current_rsi = inputs.current_rsi?;
        let trend = self.daily_sma?;
        let price = inputs.current_price;

        if inputs.current_qty == 0 {
            if price > trend && (ENTRY_RSI_LOW..=ENTRY_RSI_HIGH).contains(&current_rsi) {
                return Some(Signal::buy(price, "Momentum (RSI Dip)"));
            }
        } else if inputs.current_qty > 0 {
            if let Some(change) = return_from_entry(price, inputs.avg_entry_price) {
                if change >= TAKE_PROFIT_PCT {
                    return Some(Signal::sell(price, "Momentum (Target 5%)"));
                }
            }
            if current_rsi >= EXIT_RSI {
                return Some(Signal::sell(price, "Momentum (RSI > 70)"));
            }
        }

        None
    }

    fn on_market_close(&mut self) {
        self.daily_sma = None;
        self.prev_rsi = None;
    }

    fn is_ready(&self) -> bool {
        self.daily_sma.is_some()
    }

    fn rsi_period(&self) -> Option<usize> {
        Some(self.rsi_period)
    }

    fn describe(&self) -> String {
        match (self.daily_sma, self.prev_rsi) {
            (Some(trend), Some(prev)) => {
                format!("{} sma {:.2} prev_rsi {:.1}", self.name(), trend, prev)
            }
            _ => format!("{} unarmed", self.name()),
        }
    }
}
