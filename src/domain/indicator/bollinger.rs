//! Bollinger Bands.
//!
//! - Middle: SMA(period)
//! - Upper: middle + z * STDDEV(period)
//! - Lower: middle - z * STDDEV(period)

use super::{sma, stddev};
use crate::domain::error::TraderError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

pub fn bollinger_bands(closes: &[f64], period: usize, z: f64) -> Result<BollingerBands, TraderError> {
    let middle = sma(closes, period)?;
    let width = z * stddev(closes, period)?;
    Ok(BollingerBands {
        upper: middle + width,
        middle,
        lower: middle - width,
    })
}
