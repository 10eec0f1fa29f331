//! Strategy contract and the per-symbol strategy variants.
//!
//! Every variant owns its own state for exactly one symbol. The lifecycle is:
//! 1. [`Strategy::calibrate`] (optional parameter search over trailing history)
//! 2. [`Strategy::on_market_open`] computes the day's thresholds
//! 3. [`Strategy::generate_signal`] is called once per tick
//! 4. [`Strategy::on_market_close`] drops the day's thresholds

pub mod book;
pub mod breakout;
pub mod mean_reversion;
pub mod momentum;

pub use book::{StrategyBook, StrategyKey};
pub use breakout::{Breakout, BreakoutTarget};
pub use mean_reversion::MeanReversion;
pub use momentum::Momentum;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::SymbolSeries;
use crate::domain::signal::Signal;
use std::fmt;

/// Per-call market state handed to [`Strategy::generate_signal`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalInputs {
    pub current_price: f64,
    pub current_qty: i64,
    pub avg_entry_price: f64,
    /// Intraday RSI supplied by the caller, when it could be computed.
    pub current_rsi: Option<f64>,
}

impl SignalInputs {
    pub fn flat(current_price: f64) -> Self {
        Self {
            current_price,
            current_qty: 0,
            avg_entry_price: 0.0,
            current_rsi: None,
        }
    }

    pub fn long(current_price: f64, current_qty: i64, avg_entry_price: f64) -> Self {
        Self {
            current_price,
            current_qty,
            avg_entry_price,
            current_rsi: None,
        }
    }

    pub fn with_rsi(mut self, rsi: f64) -> Self {
        self.current_rsi = Some(rsi);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StrategyKind {
    Breakout,
    MeanReversion,
    Momentum,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::Breakout,
        StrategyKind::MeanReversion,
        StrategyKind::Momentum,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Breakout => "Breakout",
            StrategyKind::MeanReversion => "MeanReversion",
            StrategyKind::Momentum => "Momentum",
        }
    }

    pub fn build(&self, symbol: &str, settings: &StrategySettings) -> Box<dyn Strategy> {
        match self {
            StrategyKind::Breakout => Box::new(Breakout::new(
                symbol,
                settings.breakout_initial_k,
                settings.breakout_trend_window,
            )),
            StrategyKind::MeanReversion => Box::new(MeanReversion::new(
                symbol,
                settings.bollinger_period,
                settings.bollinger_z,
            )),
            StrategyKind::Momentum => Box::new(Momentum::new(
                symbol,
                settings.momentum_sma_period,
                settings.momentum_rsi_period,
            )),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tunables for building strategy instances.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySettings {
    pub breakout_initial_k: f64,
    /// SMA window for the breakout trend filter; `None` disables the filter.
    pub breakout_trend_window: Option<usize>,
    pub bollinger_period: usize,
    pub bollinger_z: f64,
    pub momentum_sma_period: usize,
    pub momentum_rsi_period: usize,
}

impl Default for StrategySettings {
    fn default() -> Self {
        StrategySettings {
            breakout_initial_k: 0.5,
            breakout_trend_window: Some(20),
            bollinger_period: 20,
            bollinger_z: 2.0,
            momentum_sma_period: 20,
            momentum_rsi_period: 14,
        }
    }
}

pub trait Strategy: Send {
    fn kind(&self) -> StrategyKind;

    fn symbol(&self) -> &str;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Re-fit calibrated parameters against trailing daily history. Returns the
    /// calibrated coefficient for variants that have one.
    fn calibrate(&mut self, _daily_history: &SymbolSeries) -> Result<Option<f64>, TraderError> {
        Ok(None)
    }

    /// Compute today's thresholds from daily bars ending the prior session.
    /// Safe to call again with updated history.
    fn on_market_open(&mut self, daily_history: &SymbolSeries) -> Result<(), TraderError>;

    /// Evaluate current market state. Reads only the strategy's own state and `inputs`.
    fn generate_signal(&self, inputs: &SignalInputs) -> Option<Signal>;

    /// Drop the day's thresholds; calibrated parameters survive.
    fn on_market_close(&mut self);

    /// Whether today's thresholds are fully known.
    fn is_ready(&self) -> bool;

    /// True while the strategy still needs the session's opening price.
    fn awaiting_open_price(&self) -> bool {
        false
    }

    fn update_target(&mut self, _open_price: f64) {}

    fn target_price(&self) -> Option<f64> {
        None
    }

    /// Calibrated parameter worth persisting alongside the target, if any.
    fn calibrated_k(&self) -> Option<f64> {
        None
    }

    /// RSI period the caller should compute and pass in `SignalInputs::current_rsi`.
    fn rsi_period(&self) -> Option<usize> {
        None
    }

    /// One-line state summary for heartbeat logging.
    fn describe(&self) -> String;
}
