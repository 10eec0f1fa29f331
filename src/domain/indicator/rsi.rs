//! RSI (Relative Strength Index).
//!
//! Simple rolling averages of the last `period` signed close-to-close deltas:
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! avg_loss == 0 and avg_gain > 0: RSI = 100
//! avg_loss == 0 and avg_gain == 0: RSI = 50
//!
//! Needs period + 1 closes.

use super::trailing;
use crate::domain::error::TraderError;

pub const NEUTRAL_RSI: f64 = 50.0;

pub fn rsi(closes: &[f64], period: usize) -> Result<f64, TraderError> {
    let period = period.max(1);
    let window = trailing(closes, period + 1)?;

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for pair in window.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gain_sum += change;
        } else {
            loss_sum -= change;
        }
    }

    let avg_gain = gain_sum / period as f64;
    let avg_loss = loss_sum / period as f64;

    let value = if avg_loss == 0.0 {
        if avg_gain == 0.0 { NEUTRAL_RSI } else { 100.0 }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn rsi_all_gains_saturates_at_100() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        assert_relative_eq!(rsi(&closes, 14).unwrap(), 100.0);
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        assert_relative_eq!(rsi(&closes, 14).unwrap(), 0.0);
    }

    #[test]
    fn rsi_flat_prices_are_neutral() {
        let closes = [42.0; 15];
        assert_relative_eq!(rsi(&closes, 14).unwrap(), NEUTRAL_RSI);
    }

    #[test]
    fn rsi_known_calculation() {
        // deltas: +2, -1, +2, -1 => avg_gain 1.0, avg_loss 0.5, RS 2
        let closes = [10.0, 12.0, 11.0, 13.0, 12.0];
        assert_relative_eq!(rsi(&closes, 4).unwrap(), 100.0 - 100.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn rsi_ignores_older_deltas() {
        let closes = [1.0, 50.0, 10.0, 12.0, 11.0, 13.0, 12.0];
        assert_relative_eq!(rsi(&closes, 4).unwrap(), 100.0 - 100.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn rsi_needs_period_plus_one_closes() {
        let closes = [1.0; 14];
        assert!(matches!(
            rsi(&closes, 14),
            Err(TraderError::InsufficientHistory {
                required: 15,
                available: 14
            })
        ));
    }

    proptest! {
        #[test]
        fn rsi_stays_in_range(closes in prop::collection::vec(1.0f64..1000.0, 15..60)) {
            let value = rsi(&closes, 14).unwrap();
            prop_assert!((0.0..=100.0).contains(&value));
        }
    }
}
