//! Port traits the trading core depends on.

pub mod broker_port;
pub mod config_port;
pub mod store_port;
