mod common;

use common::*;
use daytrader::agent::LifecycleController;
use daytrader::agent::controller::{LIQUIDATION_REASON, LIQUIDATION_STRATEGY};
use daytrader::domain::error::TraderError;
use daytrader::domain::lifecycle::DayPhase;
use daytrader::domain::signal::Side;
use daytrader::ports::store_port::TradeStorePort;
use std::sync::Arc;

fn controller(
    broker: &Arc<MockBroker>,
    store: &Arc<MemoryStore>,
    symbols: &[&str],
) -> LifecycleController {
    LifecycleController::new(broker.clone(), store.clone(), agent_config(symbols))
}

fn session_broker() -> MockBroker {
    MockBroker::new()
        .with_status(open_status(utc(2024, 3, 4, 15, 0)))
        .with_history(flat_series("NVDA", 100.0))
        .with_history(flat_series("AMD", 100.0))
}

#[tokio::test]
async fn full_day_visits_each_phase_and_flattens_positions() {
    // NVDA sits between its stop and its mean; AMD trades above every trigger.
    let broker = Arc::new(
        session_broker()
            .with_price("NVDA", 99.5)
            .with_price("AMD", 100.5)
            .with_position("NVDA", 10, 100.0),
    );
    let store = Arc::new(MemoryStore::new());
    let mut agent = controller(&broker, &store, &["NVDA", "AMD"]);
    let mut phases = vec![agent.phase()];

    let init = agent.initialize().await.unwrap();
    phases.push(agent.phase());
    assert_eq!(init.armed_symbols, vec!["NVDA", "AMD"]);
    assert!(init.unarmed_symbols.is_empty());
    assert_eq!(init.allocation, 1_000.0);

    agent.start_trading().unwrap();
    phases.push(agent.phase());
    let report = agent.run_tick().await;
    assert_eq!(report.tick, 1);
    assert_eq!(report.evaluated, 6);
    assert_eq!(report.orders_submitted, 0);

    let liquidation = agent.liquidate().await.unwrap();
    phases.push(agent.phase());
    agent.close().unwrap();
    phases.push(agent.phase());
    agent.rollover().unwrap();
    phases.push(agent.phase());

    assert_eq!(
        phases,
        vec![
            DayPhase::Idle,
            DayPhase::Armed,
            DayPhase::Trading,
            DayPhase::Liquidating,
            DayPhase::Closed,
            DayPhase::Idle,
        ]
    );

    // The controller's own journal sees the phase `initialize` passes through.
    assert_eq!(
        agent.day_phases(),
        &[
            DayPhase::Idle,
            DayPhase::Initializing,
            DayPhase::Armed,
            DayPhase::Trading,
            DayPhase::Liquidating,
            DayPhase::Closed,
            DayPhase::Idle,
        ]
    );
    for phase in [
        DayPhase::Initializing,
        DayPhase::Armed,
        DayPhase::Trading,
        DayPhase::Liquidating,
        DayPhase::Closed,
    ] {
        assert_eq!(agent.day_phases().iter().filter(|p| **p == phase).count(), 1);
    }

    assert_eq!(liquidation.orders_submitted, 1);
    assert_eq!(liquidation.failures, 0);
    assert_eq!(
        broker.orders(),
        vec![SubmittedOrder {
            symbol: "NVDA".into(),
            quantity: 10,
            side: Side::Sell
        }]
    );

    let trades = store.trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].reason, LIQUIDATION_REASON);
    assert_eq!(trades[0].strategy_name, LIQUIDATION_STRATEGY);
    assert_eq!(trades[0].price, 99.5);
}

#[tokio::test]
async fn initialize_calibrates_and_records_params() {
    let broker = Arc::new(session_broker());
    let store = Arc::new(MemoryStore::new());
    let mut agent = controller(&broker, &store, &["NVDA", "AMD"]);

    agent.initialize().await.unwrap();

    let params = store.params();
    assert_eq!(params.len(), 2);
    assert_eq!(params[0].symbol, "NVDA");
    assert_eq!(params[0].date, date(2024, 3, 4));
    // Flat bars never close above a breakout target, so the first k without any
    // breakout day wins.
    assert_eq!(params[0].k, 0.6);

    // Broker history is persisted for later fallback.
    assert_eq!(store.query_recent_history("AMD", 100).unwrap().len(), 30);
}

#[tokio::test]
async fn close_disarms_every_strategy() {
    let broker = Arc::new(session_broker().with_open("NVDA", 100.0).with_price("NVDA", 90.0));
    let store = Arc::new(MemoryStore::new());
    let mut agent = controller(&broker, &store, &["NVDA"]);

    agent.initialize().await.unwrap();
    agent.start_trading().unwrap();
    agent.run_tick().await;
    assert!(agent.book().iter().all(|s| s.is_ready()));

    agent.liquidate().await.unwrap();
    agent.close().unwrap();

    assert!(agent.book().iter().all(|s| !s.is_ready()));
    assert!(agent.book().history("NVDA").is_none());
}

#[tokio::test]
async fn out_of_order_triggers_are_rejected() {
    let broker = Arc::new(session_broker());
    let store = Arc::new(MemoryStore::new());
    let mut agent = controller(&broker, &store, &["NVDA"]);

    assert!(matches!(
        agent.start_trading(),
        Err(TraderError::InvalidTransition {
            from: DayPhase::Idle,
            to: DayPhase::Trading
        })
    ));
    assert!(agent.liquidate().await.is_err());
    assert!(agent.close().is_err());
    assert_eq!(agent.phase(), DayPhase::Idle);

    agent.initialize().await.unwrap();
    assert!(matches!(
        agent.initialize().await,
        Err(TraderError::InvalidTransition {
            from: DayPhase::Armed,
            to: DayPhase::Initializing
        })
    ));
    assert_eq!(agent.phase(), DayPhase::Armed);
}

#[tokio::test]
async fn tick_outside_trading_does_nothing() {
    let broker = Arc::new(session_broker().with_price("NVDA", 50.0));
    let store = Arc::new(MemoryStore::new());
    let mut agent = controller(&broker, &store, &["NVDA"]);

    agent.initialize().await.unwrap();
    let report = agent.run_tick().await;

    assert_eq!(report.evaluated, 0);
    assert_eq!(agent.ticks(), 0);
    assert!(broker.orders().is_empty());
}

#[tokio::test]
async fn history_falls_back_to_store_when_broker_fails() {
    let broker = Arc::new(session_broker());
    broker.fail_history("NVDA");
    let store = Arc::new(MemoryStore::new().with_bars(flat_series("NVDA", 100.0)));
    let mut agent = controller(&broker, &store, &["NVDA"]);

    let init = agent.initialize().await.unwrap();

    assert_eq!(init.armed_symbols, vec!["NVDA"]);
    assert_eq!(agent.book().history("NVDA").unwrap().len(), 30);
}

#[tokio::test]
async fn symbol_without_history_stays_unarmed() {
    let broker = Arc::new(session_broker());
    let store = Arc::new(MemoryStore::new());
    let mut agent = controller(&broker, &store, &["NVDA", "TSLA"]);

    let init = agent.initialize().await.unwrap();

    assert_eq!(init.armed_symbols, vec!["NVDA"]);
    assert_eq!(init.unarmed_symbols, vec!["TSLA"]);
    assert_eq!(agent.phase(), DayPhase::Armed);
    assert!(agent.book().for_symbol("TSLA").all(|s| !s.is_ready()));
}

#[tokio::test]
async fn allocation_splits_equity_across_symbols() {
    let broker = Arc::new(session_broker());
    let store = Arc::new(MemoryStore::new());
    let mut config = agent_config(&["NVDA", "AMD"]);
    config.allocation_per_symbol = None;
    config.allocation_factor = 0.9;
    let mut agent = LifecycleController::new(broker.clone(), store.clone(), config);

    let init = agent.initialize().await.unwrap();

    assert!((init.allocation - 45_000.0).abs() < 1e-9);
    assert_eq!(agent.allocation(), init.allocation);
}

#[tokio::test]
async fn liquidation_continues_past_a_failed_symbol() {
    let broker = Arc::new(
        session_broker()
            .with_history(flat_series("TSLA", 100.0))
            .with_price("AMD", 100.5)
            .with_price("TSLA", 100.5)
            .with_position("NVDA", 3, 100.0)
            .with_position("AMD", 5, 100.0)
            .with_position("TSLA", -4, 101.0),
    );
    broker.fail_positions("NVDA");
    let store = Arc::new(MemoryStore::new());
    let mut agent = controller(&broker, &store, &["NVDA", "AMD", "TSLA"]);

    agent.initialize().await.unwrap();
    agent.start_trading().unwrap();
    let report = agent.liquidate().await.unwrap();

    assert_eq!(report.orders_submitted, 2);
    assert_eq!(report.failures, 1);
    assert_eq!(agent.phase(), DayPhase::Liquidating);
    assert_eq!(broker.orders_for("AMD", Side::Sell)[0].quantity, 5);
    assert_eq!(broker.orders_for("TSLA", Side::Buy)[0].quantity, 4);
    assert!(broker.orders_for("NVDA", Side::Sell).is_empty());
}

#[tokio::test]
async fn liquidation_record_uses_entry_price_without_quote() {
    let broker = Arc::new(session_broker().with_position("NVDA", 2, 97.25));
    broker.fail_quotes("NVDA");
    let store = Arc::new(MemoryStore::new());
    let mut agent = controller(&broker, &store, &["NVDA"]);

    agent.initialize().await.unwrap();
    agent.start_trading().unwrap();
    agent.liquidate().await.unwrap();

    let trades = store.trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].price, 97.25);
    assert_eq!(trades[0].side, Side::Sell);
}

#[tokio::test]
async fn late_start_inside_session_begins_trading() {
    let broker = Arc::new(session_broker());
    let store = Arc::new(MemoryStore::new());
    let mut agent = controller(&broker, &store, &["NVDA"]);

    assert!(agent.recover_late_start().await.unwrap());
    assert_eq!(agent.phase(), DayPhase::Trading);

    // Already past Idle: nothing more to recover.
    assert!(!agent.recover_late_start().await.unwrap());
}

#[tokio::test]
async fn late_start_after_cutoff_waits_for_next_session() {
    let now = utc(2024, 3, 4, 15, 57);
    let mut status = open_status(now);
    status.next_close = utc(2024, 3, 4, 16, 0);
    let broker = Arc::new(session_broker().with_status(status));
    let store = Arc::new(MemoryStore::new());
    let mut agent = controller(&broker, &store, &["NVDA"]);

    assert!(!agent.recover_late_start().await.unwrap());
    assert_eq!(agent.phase(), DayPhase::Idle);
}

#[tokio::test]
async fn no_recovery_while_market_closed() {
    let broker =
        Arc::new(session_broker().with_status(closed_status(utc(2024, 3, 4, 8, 0))));
    let store = Arc::new(MemoryStore::new());
    let mut agent = controller(&broker, &store, &["NVDA"]);

    assert!(!agent.recover_late_start().await.unwrap());
    assert_eq!(agent.phase(), DayPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_liquidation_counts_as_failure() {
    let broker = Arc::new(
        session_broker()
            .with_price("NVDA", 99.5)
            .with_position("NVDA", 10, 100.0),
    );
    broker.slow_acks("NVDA");
    let store = Arc::new(MemoryStore::new());
    let mut agent = controller(&broker, &store, &["NVDA"]);

    agent.initialize().await.unwrap();
    agent.start_trading().unwrap();
    let report = agent.liquidate().await.unwrap();

    assert_eq!(report.orders_submitted, 0);
    assert_eq!(report.failures, 1);
    assert_eq!(broker.orders_for("NVDA", Side::Sell).len(), 1);
    assert!(store.trades().is_empty());
}

#[tokio::test]
async fn second_day_restarts_the_phase_journal() {
    let broker = Arc::new(session_broker());
    let store = Arc::new(MemoryStore::new());
    let mut agent = controller(&broker, &store, &["NVDA"]);

    for _ in 0..2 {
        agent.initialize().await.unwrap();
        agent.start_trading().unwrap();
        agent.liquidate().await.unwrap();
        agent.close().unwrap();
        agent.rollover().unwrap();
    }

    assert_eq!(agent.day_phases().len(), 7);
    assert_eq!(agent.day_phases()[1], DayPhase::Initializing);
}
