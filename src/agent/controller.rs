//! Day lifecycle controller.
//!
//! Owns the strategy book, the order guard and the current [`DayPhase`]. Every
//! phase change goes through [`DayPhase::transition`], so an out-of-order trigger
//! surfaces as [`TraderError::InvalidTransition`] instead of silently re-running a
//! step.

use crate::agent::config::AgentConfig;
use crate::agent::execution_loop::{self, ExecutionContext, TickReport, with_timeout};
use crate::domain::error::TraderError;
use crate::domain::execution::{OrderGuard, allocation_per_symbol};
use crate::domain::lifecycle::DayPhase;
use crate::domain::ohlcv::SymbolSeries;
use crate::domain::signal::Side;
use crate::domain::strategy::{StrategyBook, StrategyKind};
use crate::domain::trade::{StrategyParams, TradeRecord};
use crate::ports::broker_port::{BrokerPort, MarketStatus};
use crate::ports::store_port::TradeStorePort;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

pub const LIQUIDATION_REASON: &str = "Time Cut";
pub const LIQUIDATION_STRATEGY: &str = "Liquidation";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitReport {
    pub armed_symbols: Vec<String>,
    pub unarmed_symbols: Vec<String>,
    pub allocation: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiquidationReport {
    pub orders_submitted: usize,
    pub failures: usize,
}

pub struct LifecycleController {
    broker: Arc<dyn BrokerPort>,
    store: Arc<dyn TradeStorePort>,
    config: AgentConfig,
    book: StrategyBook,
    guard: OrderGuard,
    phase: DayPhase,
    allocation: f64,
    tick: u64,
    session_date: NaiveDate,
    /// Phases entered since the current day's cycle began.
    day_phases: Vec<DayPhase>,
}

impl LifecycleController {
    pub fn new(
        broker: Arc<dyn BrokerPort>,
        store: Arc<dyn TradeStorePort>,
        config: AgentConfig,
    ) -> Self {
        let book = StrategyBook::build(&config.symbols, &StrategyKind::ALL, &config.strategies);
        Self {
            guard: OrderGuard::new(config.order_guard_ticks),
            broker,
            store,
            book,
            config,
            phase: DayPhase::Idle,
            allocation: 0.0,
            tick: 0,
            session_date: Utc::now().date_naive(),
            day_phases: vec![DayPhase::Idle],
        }
    }

    pub fn phase(&self) -> DayPhase {
        self.phase
    }

    pub fn book(&self) -> &StrategyBook {
        &self.book
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn allocation(&self) -> f64 {
        self.allocation
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn session_date(&self) -> NaiveDate {
        self.session_date
    }

    /// Every phase entered since the day's cycle last left Idle, starting with Idle.
    pub fn day_phases(&self) -> &[DayPhase] {
        &self.day_phases
    }

    fn advance(&mut self, to: DayPhase) -> Result<(), TraderError> {
        let from = self.phase;
        self.phase = from.transition(to)?;
        if to == DayPhase::Initializing {
            self.day_phases = vec![from];
        }
        self.day_phases.push(to);
        log::info!("Lifecycle: {} -> {}", from, to);
        Ok(())
    }

    /// Idle -> Initializing -> Armed: reload history, calibrate, open every strategy
    /// and size the per-symbol allocation.
    pub async fn initialize(&mut self) -> Result<InitReport, TraderError> {
        self.advance(DayPhase::Initializing)?;

        self.session_date = self.fetch_session_date().await;
        let session_date = self.session_date;
        let mut report = InitReport::default();

        for symbol in self.book.symbols().to_vec() {
            let Some(history) = self.load_history(&symbol).await? else {
                log::warn!("[{}] no usable history; strategies stay un-armed today", symbol);
                report.unarmed_symbols.push(symbol);
                continue;
            };

            let mut calibrated_k = None;
            let mut any_ready = false;
            let keys: Vec<_> = self
                .book
                .keys()
                .into_iter()
                .filter(|k| k.symbol == symbol)
                .collect();

            for key in keys {
                let Some(strategy) = self.book.get_mut(&key) else {
                    continue;
                };
                match strategy.calibrate(&history) {
                    Ok(Some(k)) => calibrated_k = Some(k),
                    Ok(None) => {}
                    Err(e) => log::warn!("[{}] {} calibration skipped: {}", symbol, key.kind, e),
                }
                match strategy.on_market_open(&history) {
                    Ok(()) => any_ready = true,
                    Err(e) => log::warn!("[{}] {} not armed: {}", symbol, key.kind, e),
                }
            }

            if let Some(k) = calibrated_k {
                self.store.record_strategy_params(&StrategyParams {
                    date: session_date,
                    symbol: symbol.clone(),
                    k,
                    target_price: None,
                })?;
            }

            self.book.set_history(history);
            if any_ready {
                report.armed_symbols.push(symbol);
            } else {
                report.unarmed_symbols.push(symbol);
            }
        }

        self.allocation = self.resolve_allocation().await?;
        report.allocation = self.allocation;
        log::info!(
            "Initialized {} symbol(s), {} un-armed, allocation {:.2} per symbol",
            report.armed_symbols.len(),
            report.unarmed_symbols.len(),
            self.allocation
        );

        self.advance(DayPhase::Armed)?;
        Ok(report)
    }

    /// Broker history first, persisted on success; the store when the broker
    /// cannot serve it. `None` when neither has bars.
    async fn load_history(&self, symbol: &str) -> Result<Option<SymbolSeries>, TraderError> {
        let lookback = self.config.history_lookback_days;
        let fetched = with_timeout(
            symbol,
            "get_daily_history",
            self.config.fetch_timeout,
            self.broker.get_daily_history(symbol, lookback),
        )
        .await;

        let history = match fetched {
            Ok(series) if !series.is_empty() => {
                let stored = self.store.store_bars(&series)?;
                log::debug!("[{}] stored {} bar(s)", symbol, stored);
                series
            }
            Ok(_) => self.store.query_recent_history(symbol, lookback)?,
            Err(e) if e.is_transient() => {
                log::warn!("[{}] broker history unavailable ({}); using stored bars", symbol, e);
                self.store.query_recent_history(symbol, lookback)?
            }
            Err(e) => return Err(e),
        };

        let daily = history.to_daily().tail(lookback);
        Ok((!daily.is_empty()).then_some(daily))
    }

    async fn resolve_allocation(&self) -> Result<f64, TraderError> {
        if let Some(fixed) = self.config.allocation_per_symbol {
            return Ok(fixed);
        }
        let equity = with_timeout(
            "*",
            "get_account_equity",
            self.config.fetch_timeout,
            self.broker.get_account_equity(),
        )
        .await?;
        Ok(allocation_per_symbol(
            equity,
            self.config.allocation_factor,
            self.book.symbols().len(),
        ))
    }

    pub async fn broker_status(&self) -> Result<MarketStatus, TraderError> {
        match tokio::time::timeout(self.config.fetch_timeout, self.broker.get_market_status()).await
        {
            Ok(result) => result,
            Err(_) => Err(TraderError::MarketStatusUnavailable {
                reason: format!("no answer within {:?}", self.config.fetch_timeout),
            }),
        }
    }

    async fn fetch_session_date(&self) -> NaiveDate {
        match self.broker_status().await {
            Ok(status) => status.timestamp.date_naive(),
            Err(_) => Utc::now().date_naive(),
        }
    }

    /// Armed -> Trading.
    pub fn start_trading(&mut self) -> Result<(), TraderError> {
        self.advance(DayPhase::Trading)?;
        self.tick = 0;
        self.guard.clear();
        Ok(())
    }

    /// One execution-loop pass. Outside Trading nothing is evaluated.
    pub async fn run_tick(&mut self) -> TickReport {
        if !self.phase.accepts_entries() {
            log::debug!("tick ignored in phase {}", self.phase);
            return TickReport::default();
        }

        self.tick += 1;
        let report = execution_loop::run_tick(ExecutionContext {
            broker: self.broker.as_ref(),
            store: self.store.as_ref(),
            book: &mut self.book,
            guard: &mut self.guard,
            allocation: self.allocation,
            fetch_timeout: self.config.fetch_timeout,
            tick: self.tick,
            session_date: self.session_date,
        })
        .await;

        if self.config.heartbeat_ticks > 0 && self.tick % self.config.heartbeat_ticks == 0 {
            self.log_heartbeat(&report);
        }
        report
    }

    fn log_heartbeat(&self, report: &TickReport) {
        let targets: Vec<String> = self
            .book
            .iter()
            .filter(|s| s.kind() == StrategyKind::Breakout)
            .map(|s| match s.target_price() {
                Some(target) => format!("{}={:.2}", s.symbol(), target),
                None => format!("{}=pending", s.symbol()),
            })
            .collect();
        log::info!(
            "[heartbeat] tick {} evaluated={} skipped={} orders={} targets: {}",
            report.tick,
            report.evaluated,
            report.skipped,
            report.orders_submitted,
            targets.join(", ")
        );
    }

    /// Trading -> Liquidating: flatten every nonzero position. Failures are logged
    /// per symbol and do not stop the remaining symbols.
    pub async fn liquidate(&mut self) -> Result<LiquidationReport, TraderError> {
        self.advance(DayPhase::Liquidating)?;
        let mut report = LiquidationReport::default();

        for symbol in self.book.symbols().to_vec() {
            match self.liquidate_symbol(&symbol).await {
                Ok(true) => report.orders_submitted += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failures += 1;
                    log::error!("[{}] liquidation failed: {}", symbol, e);
                }
            }
        }

        log::info!(
            "Liquidation complete: {} order(s), {} failure(s)",
            report.orders_submitted,
            report.failures
        );
        Ok(report)
    }

    async fn liquidate_symbol(&self, symbol: &str) -> Result<bool, TraderError> {
        let timeout = self.config.fetch_timeout;
        let position =
            with_timeout(symbol, "get_position", timeout, self.broker.get_position(symbol)).await?;
        let Some(position) = position.filter(|p| !p.is_flat()) else {
            return Ok(false);
        };

        // Short positions are bought back; the agent itself only opens longs.
        let (side, quantity) = if position.is_long() {
            (Side::Sell, position.quantity)
        } else {
            (Side::Buy, -position.quantity)
        };

        let price = match with_timeout(
            symbol,
            "get_current_price",
            timeout,
            self.broker.get_current_price(symbol),
        )
        .await
        {
            Ok(price) => price,
            Err(e) => {
                log::warn!("[{}] no quote for liquidation record ({}); using entry price", symbol, e);
                position.avg_entry_price
            }
        };

        let order_id = match with_timeout(
            symbol,
            "submit_order",
            timeout,
            self.broker.submit_order(symbol, quantity, side),
        )
        .await
        {
            Ok(order_id) => order_id,
            Err(e @ TraderError::OrderRejected { .. }) => return Err(e),
            Err(e) => {
                log::error!(
                    "[{}] liquidation {} {} outcome unknown, check the broker: {}",
                    symbol,
                    side,
                    quantity,
                    e
                );
                return Err(e);
            }
        };
        log::info!(
            "[{}] liquidated {} {} ({}) value {:.2} pnl {:.2}",
            symbol,
            side,
            quantity,
            order_id,
            position.market_value(price),
            position.unrealized_pnl(price)
        );

        let record = TradeRecord {
            timestamp: Utc::now().naive_utc(),
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            reason: LIQUIDATION_REASON.to_string(),
            order_id,
            strategy_name: LIQUIDATION_STRATEGY.to_string(),
        };
        if let Err(e) = self.store.append_trade_record(&record) {
            log::error!("[{}] failed to record liquidation {}: {}", symbol, record.order_id, e);
        }
        Ok(true)
    }

    /// Liquidating -> Closed: drop every strategy's daily thresholds.
    pub fn close(&mut self) -> Result<(), TraderError> {
        self.advance(DayPhase::Closed)?;
        for strategy in self.book.iter_mut() {
            strategy.on_market_close();
        }
        self.guard.clear();
        self.book.clear_histories();
        Ok(())
    }

    /// Closed -> Idle, ready for the next session.
    pub fn rollover(&mut self) -> Result<(), TraderError> {
        self.advance(DayPhase::Idle)?;
        let journey: Vec<String> = self.day_phases.iter().map(|p| p.to_string()).collect();
        log::info!("Session {} complete: {}", self.session_date, journey.join(" -> "));
        Ok(())
    }

    /// When started while the session is already open (and before the liquidation
    /// window), run initialization and start trading immediately. Returns whether
    /// recovery happened.
    pub async fn recover_late_start(&mut self) -> Result<bool, TraderError> {
        if self.phase != DayPhase::Idle {
            return Ok(false);
        }
        let status = self.broker_status().await?;
        let cutoff = status.next_close - self.config.schedule.liquidate_lead;
        if !status.is_open || status.timestamp >= cutoff {
            return Ok(false);
        }

        log::warn!("Late start detected: market already open, initializing now");
        self.initialize().await?;
        self.start_trading()?;
        Ok(true)
    }
}
