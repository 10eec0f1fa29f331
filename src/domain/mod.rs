//! Core domain types and logic.

pub mod config_validation;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod lifecycle;
pub mod ohlcv;
pub mod optimizer;
pub mod position;
pub mod signal;
pub mod strategy;
pub mod trade;
pub mod universe;
