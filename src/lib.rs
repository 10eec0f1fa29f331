//! daytrader: intraday equity trading agent.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], and the lifecycle controller,
//! execution loop and scheduler that tie them together in [`agent`].

pub mod adapters;
pub mod agent;
pub mod cli;
pub mod domain;
pub mod ports;
