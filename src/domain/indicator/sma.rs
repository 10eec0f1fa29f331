//! Simple Moving Average.
//!
//! SMA(n) = sum(C[i-j] for j in 0..n) / n over the last n closes.

use super::trailing;
use crate::domain::error::TraderError;

pub fn sma(closes: &[f64], period: usize) -> Result<f64, TraderError> {
    let window = trailing(closes, period)?;
    Ok(window.iter().sum::<f64>() / window.len() as f64)
}
