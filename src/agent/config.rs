//! Typed agent configuration built from the INI sections.

use crate::domain::config_validation::{
    validate_agent_config, validate_schedule_config, validate_strategy_config,
};
use crate::domain::error::TraderError;
use crate::domain::strategy::StrategySettings;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use std::time::Duration;

/// Lead times before the broker's session boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSettings {
    pub init_lead: chrono::Duration,
    pub arm_lead: chrono::Duration,
    pub liquidate_lead: chrono::Duration,
    /// Longest single sleep while waiting for a trigger.
    pub poll_interval: Duration,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            init_lead: chrono::Duration::minutes(30),
            arm_lead: chrono::Duration::minutes(1),
            liquidate_lead: chrono::Duration::minutes(5),
            poll_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub symbols: Vec<String>,
    /// Fixed capital per symbol; `None` derives it from account equity.
    pub allocation_per_symbol: Option<f64>,
    pub allocation_factor: f64,
    pub history_lookback_days: usize,
    pub tick_interval: Duration,
    pub fetch_timeout: Duration,
    pub order_guard_ticks: u64,
    pub heartbeat_ticks: u64,
    pub strategies: StrategySettings,
    pub schedule: ScheduleSettings,
}

impl AgentConfig {
    pub fn new(symbols: Vec<String>) -> Self {
        Self {
            symbols,
            allocation_per_symbol: None,
            allocation_factor: 0.9,
            history_lookback_days: 30,
            tick_interval: Duration::from_millis(1000),
            fetch_timeout: Duration::from_millis(5000),
            order_guard_ticks: 30,
            heartbeat_ticks: 10,
            strategies: StrategySettings::default(),
            schedule: ScheduleSettings::default(),
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        validate_agent_config(config)?;
        validate_schedule_config(config)?;
        validate_strategy_config(config)?;

        let raw_symbols = config
            .get_string("agent", "symbols")
            .ok_or_else(|| TraderError::ConfigMissing {
                section: "agent".into(),
                key: "symbols".into(),
            })?;
        let symbols = parse_symbols(&raw_symbols).map_err(|e| TraderError::ConfigInvalid {
            section: "agent".into(),
            key: "symbols".into(),
            reason: e.to_string(),
        })?;

        let defaults = StrategySettings::default();
        let strategies = StrategySettings {
            breakout_initial_k: config.get_double(
                "strategy",
                "breakout_initial_k",
                defaults.breakout_initial_k,
            ),
            breakout_trend_window: config
                .get_bool("strategy", "breakout_trend_filter", true)
                .then_some(20),
            bollinger_period: config.get_int("strategy", "bollinger_period", 20) as usize,
            bollinger_z: config.get_double("strategy", "bollinger_z", defaults.bollinger_z),
            momentum_sma_period: config.get_int("strategy", "momentum_sma_period", 20) as usize,
            momentum_rsi_period: config.get_int("strategy", "momentum_rsi_period", 14) as usize,
        };

        let schedule = ScheduleSettings {
            init_lead: chrono::Duration::minutes(config.get_int("schedule", "init_lead_minutes", 30)),
            arm_lead: chrono::Duration::minutes(config.get_int("schedule", "arm_lead_minutes", 1)),
            liquidate_lead: chrono::Duration::minutes(config.get_int(
                "schedule",
                "liquidate_lead_minutes",
                5,
            )),
            poll_interval: Duration::from_secs(
                config.get_int("schedule", "poll_interval_secs", 30) as u64,
            ),
        };

        Ok(Self {
            symbols,
            allocation_per_symbol: config
                .get_string("agent", "allocation_per_symbol")
                .map(|_| config.get_double("agent", "allocation_per_symbol", 0.0)),
            allocation_factor: config.get_double("agent", "allocation_factor", 0.9),
            history_lookback_days: config.get_int("agent", "history_lookback_days", 30) as usize,
            tick_interval: Duration::from_millis(
                config.get_int("agent", "tick_interval_ms", 1000) as u64,
            ),
            fetch_timeout: Duration::from_millis(
                config.get_int("agent", "fetch_timeout_ms", 5000) as u64,
            ),
            order_guard_ticks: config.get_int("agent", "order_guard_ticks", 30) as u64,
            heartbeat_ticks: config.get_int("agent", "heartbeat_ticks", 10) as u64,
            strategies,
            schedule,
        })
    }
}
