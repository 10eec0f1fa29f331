//! Bollinger-band mean reversion.
//!
//! Bands: SMA(period) +/- z * STDDEV(period), recomputed at each market open.
//! - Flat and price <= lower band: BUY
//! - Long and price >= SMA: SELL (take profit at the mean)
//! - Long and down 5% or more from entry: SELL (stop loss)

use super::{SignalInputs, Strategy, StrategyKind};
use crate::domain::error::TraderError;
use crate::domain::indicator::{bollinger_bands, BollingerBands};
use crate::domain::ohlcv::SymbolSeries;
use crate::domain::position::return_from_entry;
use crate::domain::signal::Signal;

pub const STOP_LOSS_PCT: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct MeanReversion {
    symbol: String,
    period: usize,
    z: f64,
    bands: Option<BollingerBands>,
}

impl MeanReversion {
    pub fn new(symbol: &str, period: usize, z: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            period,
            z,
            bands: None,
        }
    }

    pub fn bands(&self) -> Option<BollingerBands> {
        self.bands
    }
}

impl Strategy for MeanReversion {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MeanReversion
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn on_market_open(&mut self, daily_history: &SymbolSeries) -> Result<(), TraderError> {
        match bollinger_bands(&daily_history.closes(), self.period, self.z) {
            Ok(bands) => {
                log::info!(
                    "[{}] {} initialized: sma={:.2} upper={:.2} lower={:.2}",
                    self.symbol,
                    self.name(),
                    bands.middle,
                    bands.upper,
                    bands.lower
                );
                self.bands = Some(bands);
                Ok(())
            }
            Err(e) => {
                self.bands = None;
                Err(e)
            }
        }
    }

    fn generate_signal(&self, inputs: &SignalInputs) -> Option<Signal> {
        let bands = self.bands?;
        let price = inputs.current_price;

        if inputs.current_qty == 0 {
            if price <= bands.lower {
                return Some(Signal::buy(price, "MeanReversion (Oversold)"));
            }
        } else if inputs.current_qty > 0 {
            if price >= bands.middle {
                return Some(Signal::sell(price, "MeanReversion (Mean Reversion)"));
            }
            if let Some(change) = return_from_entry(price, inputs.avg_entry_price) {
                if change <= -STOP_LOSS_PCT {
                    return Some(Signal::sell(price, "MeanReversion (Stop Loss -5%)"));
                }
            }
        }

        None
    }

    fn on_market_close(&mut self) {
        self.bands = None;
    }

    fn is_ready(&self) -> bool {
        self.bands.is_some()
    }

    fn describe(&self) -> String {
        match self.bands {
            Some(b) => format!(
                "{} lower {:.2} sma {:.2} upper {:.2}",
                self.name(),
                b.lower,
                b.middle,
                b.upper
            ),
            None => format!("{} unarmed", self.name()),
        }
    }
}
