//! One polling cycle over every (symbol, strategy) pair.
//!
//! Per pair: quote, position, opening price (Breakout only, until armed), RSI
//! (Momentum only), signal, sizing, guard, submission, trade record. Any failed
//! fetch skips the pair for this tick only; a failed position lookup is never
//! read as "flat". Only an explicit rejection leaves a symbol free for the next
//! tick; any other submission failure is treated as an order in flight.

use crate::domain::error::TraderError;
use crate::domain::execution::{OrderGuard, order_quantity};
use crate::domain::indicator::rsi;
use crate::domain::position::PositionSnapshot;
use crate::domain::signal::{Side, Signal};
use crate::domain::strategy::{SignalInputs, StrategyBook, StrategyKey};
use crate::domain::trade::{StrategyParams, TradeRecord};
use crate::ports::broker_port::BrokerPort;
use crate::ports::store_port::TradeStorePort;
use chrono::{NaiveDate, Utc};
use std::future::Future;
use std::time::Duration;

/// Counters for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub evaluated: usize,
    pub skipped: usize,
    pub signals: usize,
    pub guarded: usize,
    pub orders_submitted: usize,
    pub orders_rejected: usize,
    /// Submissions whose outcome the broker never confirmed (timeouts and the like).
    pub orders_unconfirmed: usize,
}

pub struct ExecutionContext<'a> {
    pub broker: &'a dyn BrokerPort,
    pub store: &'a dyn TradeStorePort,
    pub book: &'a mut StrategyBook,
    pub guard: &'a mut OrderGuard,
    pub allocation: f64,
    pub fetch_timeout: Duration,
    pub tick: u64,
    /// Date the persisted strategy parameters are filed under.
    pub session_date: NaiveDate,
}

/// Bounds `fut` by `limit`; an elapsed deadline becomes [`TraderError::Timeout`].
pub async fn with_timeout<T, F>(
    symbol: &str,
    operation: &str,
    limit: Duration,
    fut: F,
) -> Result<T, TraderError>
where
    F: Future<Output = Result<T, TraderError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TraderError::Timeout {
            symbol: symbol.to_string(),
            operation: operation.to_string(),
            millis: limit.as_millis() as u64,
        }),
    }
}

pub async fn run_tick(ctx: ExecutionContext<'_>) -> TickReport {
    let ExecutionContext {
        broker,
        store,
        book,
        guard,
        allocation,
        fetch_timeout,
        tick,
        session_date,
    } = ctx;

    let mut report = TickReport {
        tick,
        ..TickReport::default()
    };

    for key in book.keys() {
        let outcome = evaluate_pair(
            &key,
            broker,
            store,
            session_date,
            book,
            guard,
            allocation,
            fetch_timeout,
            tick,
        )
        .await;

        let (signal, quantity) = match outcome {
            Ok(PairOutcome::NoSignal) => {
                report.evaluated += 1;
                continue;
            }
            Ok(PairOutcome::Guarded) => {
                report.evaluated += 1;
                report.signals += 1;
                report.guarded += 1;
                continue;
            }
            Ok(PairOutcome::Order { signal, quantity }) => {
                report.evaluated += 1;
                report.signals += 1;
                (signal, quantity)
            }
            Err(e) => {
                log::warn!("[{}] {} skipped this tick: {}", key.symbol, key.kind, e);
                report.skipped += 1;
                continue;
            }
        };

        let submitted = with_timeout(
            &key.symbol,
            "submit_order",
            fetch_timeout,
            broker.submit_order(&key.symbol, quantity, signal.action),
        )
        .await;

        match submitted {
            Ok(order_id) => {
                guard.record(&key.symbol, signal.action, tick);
                report.orders_submitted += 1;
                log::info!(
                    "[{}] {} {} {} @ {:.2} ({}) order {}",
                    key.symbol,
                    key.kind,
                    signal.action,
                    quantity,
                    signal.reference_price,
                    signal.reason,
                    order_id
                );
                let record = TradeRecord {
                    timestamp: Utc::now().naive_utc(),
                    symbol: key.symbol.clone(),
                    side: signal.action,
                    quantity,
                    price: signal.reference_price,
                    reason: signal.reason,
                    order_id,
                    strategy_name: key.kind.name().to_string(),
                };
                if let Err(e) = store.append_trade_record(&record) {
                    log::error!("[{}] failed to record trade {}: {}", key.symbol, record.order_id, e);
                }
            }
            Err(e @ TraderError::OrderRejected { .. }) => {
                report.orders_rejected += 1;
                log::warn!("[{}] {} order not placed: {}", key.symbol, key.kind, e);
            }
            Err(e) => {
                // The broker may still have accepted it; block the symbol until the
                // position confirms a fill or the guard expires.
                guard.record(&key.symbol, signal.action, tick);
                report.orders_unconfirmed += 1;
                log::error!(
                    "[{}] {} {} {} outcome unknown, holding further orders: {}",
                    key.symbol,
                    key.kind,
                    signal.action,
                    quantity,
                    e
                );
            }
        }
    }

    report
}

enum PairOutcome {
    NoSignal,
    Guarded,
    Order { signal: Signal, quantity: i64 },
}

async fn evaluate_pair(
    key: &StrategyKey,
    broker: &dyn BrokerPort,
    store: &dyn TradeStorePort,
    session_date: NaiveDate,
    book: &mut StrategyBook,
    guard: &mut OrderGuard,
    allocation: f64,
    fetch_timeout: Duration,
    tick: u64,
) -> Result<PairOutcome, TraderError> {
    let symbol = key.symbol.as_str();

    let price = with_timeout(
        symbol,
        "get_current_price",
        fetch_timeout,
        broker.get_current_price(symbol),
    )
    .await?;

    let position = with_timeout(
        symbol,
        "get_position",
        fetch_timeout,
        broker.get_position(symbol),
    )
    .await?
    .unwrap_or_else(|| PositionSnapshot::flat(symbol));

    let daily_closes = book.history(symbol).map(|h| h.closes());

    let Some(strategy) = book.get_mut(key) else {
        return Ok(PairOutcome::NoSignal);
    };

    if strategy.awaiting_open_price() {
        match with_timeout(
            symbol,
            "get_opening_price",
            fetch_timeout,
            broker.get_opening_price(symbol),
        )
        .await
        {
            Ok(Some(open)) => {
                strategy.update_target(open);
                if let (Some(target), Some(k)) = (strategy.target_price(), strategy.calibrated_k())
                {
                    let params = StrategyParams {
                        date: session_date,
                        symbol: symbol.to_string(),
                        k,
                        target_price: Some(target),
                    };
                    if let Err(e) = store.record_strategy_params(&params) {
                        log::warn!("[{}] failed to persist target {:.2}: {}", symbol, target, e);
                    }
                }
            }
            Ok(None) => log::debug!("[{}] opening price not yet published", symbol),
            Err(e) => log::warn!("[{}] opening price unavailable: {}", symbol, e),
        }
    }

    let mut inputs = SignalInputs::long(price, position.quantity, position.avg_entry_price);
    if let (Some(period), Some(mut closes)) = (strategy.rsi_period(), daily_closes) {
        // Today's price stands in for the unfinished session's close.
        closes.push(price);
        if let Ok(value) = rsi(&closes, period) {
            inputs = inputs.with_rsi(value);
        }
    }

    let Some(signal) = strategy.generate_signal(&inputs) else {
        return Ok(PairOutcome::NoSignal);
    };

    if guard.is_blocked(&position, tick) {
        log::debug!(
            "[{}] {} {} suppressed: earlier order still in flight",
            symbol,
            key.kind,
            signal.action
        );
        return Ok(PairOutcome::Guarded);
    }

    let quantity = match signal.action {
        Side::Buy => order_quantity(allocation, price),
        Side::Sell => position.quantity,
    };
    if quantity <= 0 {
        log::info!(
            "[{}] {} {} signal skipped: quantity {} (allocation {:.2}, price {:.2})",
            symbol,
            key.kind,
            signal.action,
            quantity,
            allocation,
            price
        );
        return Ok(PairOutcome::NoSignal);
    }

    Ok(PairOutcome::Order { signal, quantity })
}
