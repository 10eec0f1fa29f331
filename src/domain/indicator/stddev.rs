//! Rolling standard deviation.
//!
//! Sample standard deviation (divides by n - 1) over the last n closes:
//! STDDEV(n) = sqrt(sum((C[i-j] - SMA(n))^2 for j in 0..n) / (n - 1))
//! Requires n >= 2.

use super::trailing;
use crate::domain::error::TraderError;

pub fn stddev(closes: &[f64], period: usize) -> Result<f64, TraderError> {
    let window = trailing(closes, period.max(2))?;
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window
        .iter()
        .map(|c| {
            let diff = c - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1.0);
    Ok(variance.sqrt())
}
