//! Simulated broker for paper trading.
//!
//! Quotes follow a bounded random walk from the last known close. Orders fill
//! immediately at the current quote; long-only, cash-limited. The market clock is a
//! fixed weekday session in a fixed UTC offset.

use crate::domain::config_validation::parse_time;
use crate::domain::error::TraderError;
use crate::domain::ohlcv::SymbolSeries;
use crate::domain::position::PositionSnapshot;
use crate::domain::signal::Side;
use crate::ports::broker_port::{BrokerPort, MarketStatus};
use crate::ports::config_port::ConfigPort;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use parking_lot::Mutex;
use rand::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct PaperSettings {
    pub starting_cash: f64,
    pub utc_offset_hours: i64,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    /// Maximum per-quote move as a fraction of price.
    pub volatility_pct: f64,
    pub seed: Option<u64>,
}

impl Default for PaperSettings {
    fn default() -> Self {
        Self {
            starting_cash: 100_000.0,
            utc_offset_hours: -5,
            open_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            close_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
            volatility_pct: 0.002,
            seed: None,
        }
    }
}

impl PaperSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let defaults = Self::default();
        let seed = config.get_int("paper", "seed", -1);
        Ok(Self {
            starting_cash: config.get_double("paper", "starting_cash", defaults.starting_cash),
            utc_offset_hours: config.get_int("paper", "utc_offset_hours", defaults.utc_offset_hours),
            open_time: parse_time(config, "open_time", "09:30")?,
            close_time: parse_time(config, "close_time", "16:00")?,
            volatility_pct: config.get_double("paper", "volatility_pct", defaults.volatility_pct),
            seed: (seed >= 0).then_some(seed as u64),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Holding {
    quantity: i64,
    avg_entry_price: f64,
}

struct PaperState {
    cash: f64,
    holdings: HashMap<String, Holding>,
    prices: HashMap<String, f64>,
    opens: HashMap<String, (NaiveDate, f64)>,
    next_order_id: u64,
    frozen_now: Option<DateTime<Utc>>,
    rng: StdRng,
}

pub struct PaperBroker {
    settings: PaperSettings,
    history: Mutex<HashMap<String, SymbolSeries>>,
    state: Mutex<PaperState>,
}

impl PaperBroker {
    pub fn new(settings: PaperSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            state: Mutex::new(PaperState {
                cash: settings.starting_cash,
                holdings: HashMap::new(),
                prices: HashMap::new(),
                opens: HashMap::new(),
                next_order_id: 1,
                frozen_now: None,
                rng,
            }),
            history: Mutex::new(HashMap::new()),
            settings,
        }
    }

    /// Bars served by `get_daily_history`; the last close seeds the quote walk.
    pub fn seed_history(&self, series: SymbolSeries) {
        if let Some(last) = series.last() {
            self.state
                .lock()
                .prices
                .entry(series.symbol().to_string())
                .or_insert(last.close);
        }
        self.history.lock().insert(series.symbol().to_string(), series);
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.state.lock().prices.insert(symbol.to_string(), price);
    }

    /// Pins the broker clock; `None` returns to wall-clock time.
    pub fn freeze_clock(&self, at: Option<DateTime<Utc>>) {
        self.state.lock().frozen_now = at;
    }

    pub fn cash(&self) -> f64 {
        self.state.lock().cash
    }

    fn now(&self) -> DateTime<Utc> {
        self.state.lock().frozen_now.unwrap_or_else(Utc::now)
    }

    fn to_local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.naive_utc() + Duration::hours(self.settings.utc_offset_hours)
    }

    fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(
            local - Duration::hours(self.settings.utc_offset_hours),
            Utc,
        )
    }

    fn is_session_day(date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    fn session_open(&self, at: DateTime<Utc>) -> Option<NaiveDate> {
        let local = self.to_local(at);
        let time = local.time();
        (Self::is_session_day(local.date())
            && time >= self.settings.open_time
            && time < self.settings.close_time)
            .then(|| local.date())
    }

    /// Earliest session open strictly after `local`.
    fn next_session_open(&self, local: NaiveDateTime) -> NaiveDateTime {
        let mut day = local.date();
        loop {
            let open = day.and_time(self.settings.open_time);
            if Self::is_session_day(day) && open > local {
                return open;
            }
            day = day.succ_opt().unwrap_or(day);
        }
    }

    fn quote(&self, symbol: &str) -> Result<f64, TraderError> {
        let now = self.now();
        let open_session = self.session_open(now);
        let mut state = self.state.lock();
        let last = *state
            .prices
            .get(symbol)
            .ok_or_else(|| TraderError::QuoteUnavailable {
                symbol: symbol.to_string(),
                reason: "no reference price".to_string(),
            })?;

        let Some(today) = open_session else {
            return Ok(last);
        };

        let v = self.settings.volatility_pct;
        let step = if v > 0.0 { state.rng.gen_range(-v..=v) } else { 0.0 };
        let price = (last * (1.0 + step)).max(0.01);
        state.prices.insert(symbol.to_string(), price);
        match state.opens.get(symbol) {
            Some((date, _)) if *date == today => {}
            _ => {
                state.opens.insert(symbol.to_string(), (today, price));
            }
        }
        Ok(price)
    }
}

#[async_trait]
impl BrokerPort for PaperBroker {
    async fn get_daily_history(
        &self,
        symbol: &str,
        lookback: usize,
    ) -> Result<SymbolSeries, TraderError> {
        let history = self.history.lock();
        let series = history
            .get(symbol)
            .ok_or_else(|| TraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "no history loaded".to_string(),
            })?;
        let today = self.to_local(self.now()).date();
        let completed: Vec<_> = series
            .to_daily()
            .bars()
            .iter()
            .filter(|b| b.date() < today)
            .cloned()
            .collect();
        Ok(SymbolSeries::new(symbol, completed)?.tail(lookback))
    }

    async fn get_current_price(&self, symbol: &str) -> Result<f64, TraderError> {
        self.quote(symbol)
    }

    async fn get_opening_price(&self, symbol: &str) -> Result<Option<f64>, TraderError> {
        let Some(today) = self.session_open(self.now()) else {
            return Ok(None);
        };
        let recorded = matches!(self.state.lock().opens.get(symbol), Some((date, _)) if *date == today);
        if !recorded {
            // The session's first print is the first quote taken after the open.
            self.quote(symbol)?;
        }
        Ok(self
            .state
            .lock()
            .opens
            .get(symbol)
            .filter(|(date, _)| *date == today)
            .map(|(_, price)| *price))
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<PositionSnapshot>, TraderError> {
        Ok(self
            .state
            .lock()
            .holdings
            .get(symbol)
            .filter(|h| h.quantity != 0)
            .map(|h| PositionSnapshot {
                symbol: symbol.to_string(),
                quantity: h.quantity,
                avg_entry_price: h.avg_entry_price,
            }))
    }

    async fn get_market_status(&self) -> Result<MarketStatus, TraderError> {
        let now = self.now();
        let local = self.to_local(now);
        let is_open = self.session_open(now).is_some();
        let next_open = self.next_session_open(local);
        let close_day = if is_open { local.date() } else { next_open.date() };
        let next_close = close_day.and_time(self.settings.close_time);

        Ok(MarketStatus {
            timestamp: now,
            is_open,
            next_open: self.to_utc(next_open),
            next_close: self.to_utc(next_close),
        })
    }

    async fn submit_order(
        &self,
        symbol: &str,
        quantity: i64,
        side: Side,
    ) -> Result<String, TraderError> {
        let reject = |reason: String| TraderError::OrderRejected {
            symbol: symbol.to_string(),
            reason,
        };
        if quantity <= 0 {
            return Err(reject(format!("quantity must be positive, got {quantity}")));
        }
        if self.session_open(self.now()).is_none() {
            return Err(reject("market is closed".to_string()));
        }

        let price = self.quote(symbol)?;
        let mut state = self.state.lock();
        let held = state.holdings.get(symbol).copied().unwrap_or(Holding {
            quantity: 0,
            avg_entry_price: 0.0,
        });

        let updated = match side {
            Side::Buy => {
                let cost = price * quantity as f64;
                if cost > state.cash {
                    return Err(reject(format!(
                        "insufficient buying power: need {cost:.2}, have {:.2}",
                        state.cash
                    )));
                }
                state.cash -= cost;
                let total = held.quantity + quantity;
                Holding {
                    quantity: total,
                    avg_entry_price: (held.avg_entry_price * held.quantity as f64 + cost)
                        / total as f64,
                }
            }
            Side::Sell => {
                if quantity > held.quantity {
                    return Err(reject(format!(
                        "cannot sell {quantity}, holding {}",
                        held.quantity
                    )));
                }
                state.cash += price * quantity as f64;
                Holding {
                    quantity: held.quantity - quantity,
                    avg_entry_price: held.avg_entry_price,
                }
            }
        };

        if updated.quantity == 0 {
            state.holdings.remove(symbol);
        } else {
            state.holdings.insert(symbol.to_string(), updated);
        }

        let order_id = format!("paper-{}", state.next_order_id);
        state.next_order_id += 1;
        log::debug!("[{}] paper fill {} {} @ {:.2} ({})", symbol, side, quantity, price, order_id);
        Ok(order_id)
    }

    async fn get_account_equity(&self) -> Result<f64, TraderError> {
        let state = self.state.lock();
        let holdings: f64 = state
            .holdings
            .iter()
            .map(|(symbol, h)| {
                let price = state.prices.get(symbol).copied().unwrap_or(h.avg_entry_price);
                h.quantity as f64 * price
            })
            .sum();
        Ok(state.cash + holdings)
    }
}
