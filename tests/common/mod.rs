#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use daytrader::agent::AgentConfig;
use daytrader::domain::error::TraderError;
pub use daytrader::domain::ohlcv::{OhlcvBar, SymbolSeries};
use daytrader::domain::position::PositionSnapshot;
use daytrader::domain::signal::Side;
use daytrader::domain::trade::{StrategyParams, TradeRecord};
use daytrader::ports::broker_port::{BrokerPort, MarketStatus};
use daytrader::ports::store_port::TradeStorePort;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Single-session market clock that follows tokio's (pausable) time.
#[derive(Debug, Clone, Copy)]
pub struct MockClock {
    pub start: DateTime<Utc>,
    pub started: tokio::time::Instant,
    pub open: DateTime<Utc>,
    pub close: DateTime<Utc>,
}

impl MockClock {
    pub fn now(&self) -> DateTime<Utc> {
        self.start + Duration::from_std(self.started.elapsed()).unwrap()
    }

    pub fn status(&self) -> MarketStatus {
        let now = self.now();
        let mut next_open = self.open;
        while next_open <= now {
            next_open += Duration::days(1);
        }
        let mut next_close = self.close;
        while next_close <= now {
            next_close += Duration::days(1);
        }
        MarketStatus {
            timestamp: now,
            is_open: now >= self.open && now < self.close,
            next_open,
            next_close,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedOrder {
    pub symbol: String,
    pub quantity: i64,
    pub side: Side,
}

#[derive(Default)]
pub struct MockState {
    pub history: HashMap<String, SymbolSeries>,
    pub prices: HashMap<String, f64>,
    pub opens: HashMap<String, f64>,
    pub positions: HashMap<String, PositionSnapshot>,
    pub history_errors: HashSet<String>,
    pub quote_errors: HashSet<String>,
    pub position_errors: HashSet<String>,
    pub slow_quotes: HashSet<String>,
    pub rejected: HashSet<String>,
    /// Orders accepted but acknowledged only after an hour.
    pub slow_acks: HashSet<String>,
    pub orders: Vec<SubmittedOrder>,
    pub equity: f64,
    /// Apply fills to `positions` on submission.
    pub fill_orders: bool,
    pub clock: Option<MockClock>,
    pub status: Option<MarketStatus>,
}

pub struct MockBroker {
    pub state: Mutex<MockState>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                equity: 100_000.0,
                fill_orders: true,
                ..MockState::default()
            }),
        }
    }

    pub fn with_history(self, series: SymbolSeries) -> Self {
        self.state
            .lock()
            .unwrap()
            .history
            .insert(series.symbol().to_string(), series);
        self
    }

    pub fn with_price(self, symbol: &str, price: f64) -> Self {
        self.set_price(symbol, price);
        self
    }

    pub fn with_open(self, symbol: &str, open: f64) -> Self {
        self.set_open(symbol, open);
        self
    }

    pub fn with_position(self, symbol: &str, quantity: i64, avg_entry_price: f64) -> Self {
        self.set_position(symbol, quantity, avg_entry_price);
        self
    }

    pub fn with_status(self, status: MarketStatus) -> Self {
        self.state.lock().unwrap().status = Some(status);
        self
    }

    pub fn with_clock(self, clock: MockClock) -> Self {
        self.state.lock().unwrap().clock = Some(clock);
        self
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.state.lock().unwrap().prices.insert(symbol.into(), price);
    }

    pub fn set_open(&self, symbol: &str, open: f64) {
        self.state.lock().unwrap().opens.insert(symbol.into(), open);
    }

    pub fn set_position(&self, symbol: &str, quantity: i64, avg_entry_price: f64) {
        self.state.lock().unwrap().positions.insert(
            symbol.into(),
            PositionSnapshot {
                symbol: symbol.into(),
                quantity,
                avg_entry_price,
            },
        );
    }

    pub fn fail_history(&self, symbol: &str) {
        self.state.lock().unwrap().history_errors.insert(symbol.into());
    }

    pub fn fail_quotes(&self, symbol: &str) {
        self.state.lock().unwrap().quote_errors.insert(symbol.into());
    }

    pub fn fail_positions(&self, symbol: &str) {
        self.state.lock().unwrap().position_errors.insert(symbol.into());
    }

    pub fn slow_quotes(&self, symbol: &str) {
        self.state.lock().unwrap().slow_quotes.insert(symbol.into());
    }

    pub fn reject_orders(&self, symbol: &str) {
        self.state.lock().unwrap().rejected.insert(symbol.into());
    }

    pub fn slow_acks(&self, symbol: &str) {
        self.state.lock().unwrap().slow_acks.insert(symbol.into());
    }

    pub fn hold_fills(&self) {
        self.state.lock().unwrap().fill_orders = false;
    }

    pub fn orders(&self) -> Vec<SubmittedOrder> {
        self.state.lock().unwrap().orders.clone()
    }

    pub fn orders_for(&self, symbol: &str, side: Side) -> Vec<SubmittedOrder> {
        self.orders()
            .into_iter()
            .filter(|o| o.symbol == symbol && o.side == side)
            .collect()
    }
}

#[async_trait]
impl BrokerPort for MockBroker {
    async fn get_daily_history(
        &self,
        symbol: &str,
        lookback: usize,
    ) -> Result<SymbolSeries, TraderError> {
        let state = self.state.lock().unwrap();
        if state.history_errors.contains(symbol) {
            return Err(TraderError::DataUnavailable {
                symbol: symbol.into(),
                reason: "mock outage".into(),
            });
        }
        Ok(state
            .history
            .get(symbol)
            .map(|s| s.tail(lookback))
            .unwrap_or_else(|| SymbolSeries::empty(symbol)))
    }

    async fn get_current_price(&self, symbol: &str) -> Result<f64, TraderError> {
        let slow = self.state.lock().unwrap().slow_quotes.contains(symbol);
        if slow {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        let state = self.state.lock().unwrap();
        if state.quote_errors.contains(symbol) {
            return Err(TraderError::QuoteUnavailable {
                symbol: symbol.into(),
                reason: "mock outage".into(),
            });
        }
        state
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| TraderError::QuoteUnavailable {
                symbol: symbol.into(),
                reason: "no price".into(),
            })
    }

    async fn get_opening_price(&self, symbol: &str) -> Result<Option<f64>, TraderError> {
        Ok(self.state.lock().unwrap().opens.get(symbol).copied())
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<PositionSnapshot>, TraderError> {
        let state = self.state.lock().unwrap();
        if state.position_errors.contains(symbol) {
            return Err(TraderError::PositionFetchError {
                symbol: symbol.into(),
                reason: "mock outage".into(),
            });
        }
        Ok(state.positions.get(symbol).filter(|p| p.quantity != 0).cloned())
    }

    async fn get_market_status(&self) -> Result<MarketStatus, TraderError> {
        let state = self.state.lock().unwrap();
        if let Some(clock) = state.clock {
            return Ok(clock.status());
        }
        state
            .status
            .clone()
            .ok_or_else(|| TraderError::MarketStatusUnavailable {
                reason: "no status configured".into(),
            })
    }

    async fn submit_order(
        &self,
        symbol: &str,
        quantity: i64,
        side: Side,
    ) -> Result<String, TraderError> {
        let slow = {
            let mut state = self.state.lock().unwrap();
            if state.slow_acks.contains(symbol) {
                state.orders.push(SubmittedOrder {
                    symbol: symbol.into(),
                    quantity,
                    side,
                });
                true
            } else {
                false
            }
        };
        if slow {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            return Ok(format!("mock-slow-{}", symbol));
        }

        let mut state = self.state.lock().unwrap();
        if state.rejected.contains(symbol) {
            return Err(TraderError::OrderRejected {
                symbol: symbol.into(),
                reason: "mock rejection".into(),
            });
        }
        state.orders.push(SubmittedOrder {
            symbol: symbol.into(),
            quantity,
            side,
        });
        let order_id = format!("mock-{}", state.orders.len());

        if state.fill_orders {
            let price = state.prices.get(symbol).copied().unwrap_or(0.0);
            let held = state
                .positions
                .get(symbol)
                .map(|p| p.quantity)
                .unwrap_or(0);
            let quantity = match side {
                Side::Buy => held + quantity,
                Side::Sell => held - quantity,
            };
            state.positions.insert(
                symbol.into(),
                PositionSnapshot {
                    symbol: symbol.into(),
                    quantity,
                    avg_entry_price: price,
                },
            );
        }
        Ok(order_id)
    }

    async fn get_account_equity(&self) -> Result<f64, TraderError> {
        Ok(self.state.lock().unwrap().equity)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub bars: Mutex<HashMap<String, Vec<OhlcvBar>>>,
    pub trades: Mutex<Vec<TradeRecord>>,
    pub params: Mutex<Vec<StrategyParams>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(self, series: SymbolSeries) -> Self {
        self.store_bars(&series).unwrap();
        self
    }

    pub fn trades(&self) -> Vec<TradeRecord> {
        self.trades.lock().unwrap().clone()
    }

    pub fn params(&self) -> Vec<StrategyParams> {
        self.params.lock().unwrap().clone()
    }
}

impl TradeStorePort for MemoryStore {
    fn append_trade_record(&self, record: &TradeRecord) -> Result<(), TraderError> {
        self.trades.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn query_recent_history(&self, symbol: &str, n: usize) -> Result<SymbolSeries, TraderError> {
        let bars = self
            .bars
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default();
        Ok(SymbolSeries::from_unordered(symbol, bars).tail(n))
    }

    fn store_bars(&self, series: &SymbolSeries) -> Result<usize, TraderError> {
        let mut bars = self.bars.lock().unwrap();
        let entry = bars.entry(series.symbol().to_string()).or_default();
        entry.extend(series.bars().iter().cloned());
        let merged = SymbolSeries::from_unordered(series.symbol(), std::mem::take(entry));
        *entry = merged.bars().to_vec();
        Ok(series.len())
    }

    fn record_strategy_params(&self, params: &StrategyParams) -> Result<(), TraderError> {
        self.params.lock().unwrap().push(params.clone());
        Ok(())
    }

    fn list_trade_records(
        &self,
        symbol: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TradeRecord>, TraderError> {
        Ok(self
            .trades
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|t| symbol.is_none_or(|s| t.symbol == s))
            .take(limit)
            .cloned()
            .collect())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn utc(y: i32, m: u32, d: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, hour, minute, 0).unwrap()
}

/// Daily bars from `closes`, one per day from 2024-01-01. Each bar spans close ± 1.
pub fn daily_series(symbol: &str, closes: &[f64]) -> SymbolSeries {
    let start = date(2024, 1, 1);
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            timestamp: (start + Duration::days(i as i64))
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000,
        })
        .collect();
    SymbolSeries::new(symbol, bars).unwrap()
}

/// 30 flat days at `level`: every indicator is defined and the last range is 2.
pub fn flat_series(symbol: &str, level: f64) -> SymbolSeries {
    daily_series(symbol, &vec![level; 30])
}

pub fn open_status(now: DateTime<Utc>) -> MarketStatus {
    MarketStatus {
        timestamp: now,
        is_open: true,
        next_open: now + Duration::hours(20),
        next_close: now + Duration::hours(4),
    }
}

pub fn closed_status(now: DateTime<Utc>) -> MarketStatus {
    MarketStatus {
        timestamp: now,
        is_open: false,
        next_open: now + Duration::hours(1),
        next_close: now + Duration::hours(8),
    }
}

pub fn agent_config(symbols: &[&str]) -> AgentConfig {
    let mut config = AgentConfig::new(symbols.iter().map(|s| s.to_string()).collect());
    config.allocation_per_symbol = Some(1_000.0);
    config.fetch_timeout = std::time::Duration::from_millis(200);
    config
}
