//! Technical indicators over ordered daily closes.
//!
//! Every function reads the trailing window of `closes` (oldest first) and returns the
//! latest value. A window longer than the input fails with
//! [`TraderError::InsufficientHistory`], which callers treat as "not ready yet".

pub mod bollinger;
pub mod rsi;
pub mod sma;
pub mod stddev;

pub use bollinger::{bollinger_bands, BollingerBands};
pub use rsi::rsi;
pub use sma::sma;
pub use stddev::stddev;

use crate::domain::error::TraderError;

/// The trailing `len` values, or `InsufficientHistory` when there are fewer.
pub(crate) fn trailing(closes: &[f64], len: usize) -> Result<&[f64], TraderError> {
    let required = len.max(1);
    if closes.len() < required {
        return Err(TraderError::InsufficientHistory {
            required,
            available: closes.len(),
        });
    }
    Ok(&closes[closes.len() - required..])
}
