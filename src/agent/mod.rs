//! The trading agent: typed configuration, the day lifecycle controller, the
//! per-tick execution loop and the wall-clock scheduler that drives them.

pub mod config;
pub mod controller;
pub mod execution_loop;
pub mod scheduler;

pub use config::{AgentConfig, ScheduleSettings};
pub use controller::{InitReport, LifecycleController, LiquidationReport};
pub use execution_loop::TickReport;
pub use scheduler::Scheduler;
