//! Domain error types.

use crate::domain::lifecycle::DayPhase;

/// Top-level error type for daytrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("insufficient history: have {available} observations, need {required}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("history unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("quote unavailable for {symbol}: {reason}")]
    QuoteUnavailable { symbol: String, reason: String },

    #[error("position fetch failed for {symbol}: {reason}")]
    PositionFetchError { symbol: String, reason: String },

    #[error("order rejected for {symbol}: {reason}")]
    OrderRejected { symbol: String, reason: String },

    #[error("{operation} for {symbol} timed out after {millis} ms")]
    Timeout {
        symbol: String,
        operation: String,
        millis: u64,
    },

    #[error("market status unavailable: {reason}")]
    MarketStatusUnavailable { reason: String },

    #[error("invalid lifecycle transition {from} -> {to}")]
    InvalidTransition { from: DayPhase, to: DayPhase },

    #[error("invalid series for {symbol}: {reason}")]
    InvalidSeries { symbol: String, reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    /// Errors that only cost the affected (symbol, strategy) pair its current tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TraderError::DataUnavailable { .. }
                | TraderError::QuoteUnavailable { .. }
                | TraderError::PositionFetchError { .. }
                | TraderError::OrderRejected { .. }
                | TraderError::Timeout { .. }
                | TraderError::MarketStatusUnavailable { .. }
        )
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::Database { .. } | TraderError::DatabaseQuery { .. } => 3,
            TraderError::InvalidTransition { .. } => 4,
            TraderError::InsufficientHistory { .. }
            | TraderError::DataUnavailable { .. }
            | TraderError::QuoteUnavailable { .. }
            | TraderError::PositionFetchError { .. }
            | TraderError::OrderRejected { .. }
            | TraderError::Timeout { .. }
            | TraderError::MarketStatusUnavailable { .. }
            | TraderError::InvalidSeries { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
