//! Configuration validation.
//!
//! Validates every agent config field before the session starts.

use crate::domain::error::TraderError;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveTime;

pub fn validate_agent_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_symbols(config)?;
    validate_allocation(config)?;
    validate_positive_int(config, "agent", "history_lookback_days", 30)?;
    validate_positive_int(config, "agent", "tick_interval_ms", 1000)?;
    validate_positive_int(config, "agent", "fetch_timeout_ms", 5000)?;
    validate_positive_int(config, "agent", "order_guard_ticks", 30)?;
    validate_positive_int(config, "agent", "heartbeat_ticks", 10)?;
    Ok(())
}

pub fn validate_schedule_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let init = config.get_int("schedule", "init_lead_minutes", 30);
    let arm = config.get_int("schedule", "arm_lead_minutes", 1);
    let liquidate = config.get_int("schedule", "liquidate_lead_minutes", 5);

    for (key, value) in [
        ("init_lead_minutes", init),
        ("arm_lead_minutes", arm),
        ("liquidate_lead_minutes", liquidate),
    ] {
        if value < 0 {
            return Err(invalid("schedule", key, format!("{key} must be non-negative")));
        }
    }
    if init < arm {
        return Err(invalid(
            "schedule",
            "init_lead_minutes",
            "initialization must not start after arming".to_string(),
        ));
    }
    validate_positive_int(config, "schedule", "poll_interval_secs", 30)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let k = config.get_double("strategy", "breakout_initial_k", 0.5);
    if k <= 0.0 || k >= 1.0 {
        return Err(invalid(
            "strategy",
            "breakout_initial_k",
            "breakout_initial_k must be between 0 and 1".to_string(),
        ));
    }

    let bollinger_period = config.get_int("strategy", "bollinger_period", 20);
    if bollinger_period < 2 {
        return Err(invalid(
            "strategy",
            "bollinger_period",
            "bollinger_period must be at least 2".to_string(),
        ));
    }

    let z = config.get_double("strategy", "bollinger_z", 2.0);
    if z <= 0.0 {
        return Err(invalid(
            "strategy",
            "bollinger_z",
            "bollinger_z must be positive".to_string(),
        ));
    }

    validate_positive_int(config, "strategy", "momentum_sma_period", 20)?;
    validate_positive_int(config, "strategy", "momentum_rsi_period", 14)?;
    Ok(())
}

pub fn validate_paper_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let cash = config.get_double("paper", "starting_cash", 100_000.0);
    if cash <= 0.0 {
        return Err(invalid(
            "paper",
            "starting_cash",
            "starting_cash must be positive".to_string(),
        ));
    }

    let offset = config.get_int("paper", "utc_offset_hours", -5);
    if !(-12..=14).contains(&offset) {
        return Err(invalid(
            "paper",
            "utc_offset_hours",
            "utc_offset_hours must be between -12 and 14".to_string(),
        ));
    }

    let open = parse_time(config, "open_time", "09:30")?;
    let close = parse_time(config, "close_time", "16:00")?;
    if open >= close {
        return Err(invalid(
            "paper",
            "open_time",
            "open_time must be before close_time".to_string(),
        ));
    }

    let volatility = config.get_double("paper", "volatility_pct", 0.002);
    if !(0.0..0.5).contains(&volatility) {
        return Err(invalid(
            "paper",
            "volatility_pct",
            "volatility_pct must be between 0 and 0.5".to_string(),
        ));
    }
    Ok(())
}

/// Parses `[paper] <key>` as `HH:MM`, falling back to `default` when absent.
pub fn parse_time(
    config: &dyn ConfigPort,
    key: &str,
    default: &str,
) -> Result<NaiveTime, TraderError> {
    let raw = config
        .get_string("paper", key)
        .unwrap_or_else(|| default.to_string());
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| invalid("paper", key, format!("invalid time '{raw}', expected HH:MM")))
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let raw = config
        .get_string("agent", "symbols")
        .ok_or_else(|| TraderError::ConfigMissing {
            section: "agent".to_string(),
            key: "symbols".to_string(),
        })?;
    parse_symbols(&raw).map_err(|e| invalid("agent", "symbols", e.to_string()))?;
    Ok(())
}

fn validate_allocation(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if config.get_string("agent", "allocation_per_symbol").is_some() {
        let value = config.get_double("agent", "allocation_per_symbol", 0.0);
        if value <= 0.0 {
            return Err(invalid(
                "agent",
                "allocation_per_symbol",
                "allocation_per_symbol must be positive".to_string(),
            ));
        }
    }

    let factor = config.get_double("agent", "allocation_factor", 0.9);
    if factor <= 0.0 || factor > 1.0 {
        return Err(invalid(
            "agent",
            "allocation_factor",
            "allocation_factor must be in (0, 1]".to_string(),
        ));
    }
    Ok(())
}

fn validate_positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<(), TraderError> {
    if config.get_int(section, key, default) <= 0 {
        return Err(invalid(section, key, format!("{key} must be positive")));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: String) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}
