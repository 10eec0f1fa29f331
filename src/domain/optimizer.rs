//! Breakout sensitivity (k) calibration.
//!
//! Grid search over k in 0.3..=0.9 (step 0.1). For each k, a vectorised replay of the
//! trailing daily bars:
//! - target[t] = open[t] + (high[t-1] - low[t-1]) * k
//! - breakout day when high[t] >= target[t], return (close[t] - target[t]) / target[t]
//! - otherwise the day returns 0
//!
//! The aggregate is the compounded product of (1 + daily return). The largest
//! aggregate wins; ties keep the smaller k.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::{OhlcvBar, SymbolSeries};

pub const K_GRID: [f64; 7] = [0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KCandidate {
    pub k: f64,
    pub aggregate_return: f64,
    pub breakout_days: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KOptimization {
    pub best_k: f64,
    pub best_return: f64,
    pub candidates: Vec<KCandidate>,
}

/// Replay one k over `bars`.
pub fn evaluate_k(bars: &[OhlcvBar], k: f64) -> KCandidate {
    let mut aggregate_return = 1.0;
    let mut breakout_days = 0;

    for pair in bars.windows(2) {
        let (prev, today) = (&pair[0], &pair[1]);
        let target = today.open + prev.range() * k;
        if target <= 0.0 || today.high < target {
            continue;
        }
        breakout_days += 1;
        aggregate_return *= 1.0 + (today.close - target) / target;
    }

    KCandidate {
        k,
        aggregate_return,
        breakout_days,
    }
}

pub fn optimize_k(history: &SymbolSeries) -> Result<KOptimization, TraderError> {
    if history.len() < 2 {
        return Err(TraderError::InsufficientHistory {
            required: 2,
            available: history.len(),
        });
    }

    let candidates: Vec<KCandidate> = K_GRID
        .iter()
        .map(|&k| evaluate_k(history.bars(), k))
        .collect();

    let mut best = candidates[0];
    for candidate in &candidates[1..] {
        if candidate.aggregate_return > best.aggregate_return {
            best = *candidate;
        }
    }

    Ok(KOptimization {
        best_k: best.k,
        best_return: best.aggregate_return,
        candidates,
    })
}
