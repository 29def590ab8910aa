//! Integration tests for the live decision loop
//!
//! Failure paths run against a mocked gateway; the end-to-end flows run
//! against the paper gateway, stepping bars by hand.

mod common;

use binary_options_engine::{
    AccountBalance, Bar, CloseConfirmation, Direction, EngineError, ExitReason, GatewayEvent,
    MarketGateway, OrderConfirmation, PaperGateway, PriceQuote, TradingEngine,
};
use chrono::Duration as ChronoDuration;
use common::{
    minute_bars, small_window_config, time_at, MockGateway, CROSSOVER_CLOSES, ENTRY_INDEX,
};
use pretty_assertions::assert_eq;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

/// Bars the engine sees when the crossover bar is the latest one
fn crossover_window() -> Vec<Bar> {
    let bars = minute_bars(&CROSSOVER_CLOSES);
    bars[1..=ENTRY_INDEX].to_vec()
}

fn quote(symbol: &str, price: f64, is_trading: bool) -> PriceQuote {
    PriceQuote {
        symbol: symbol.to_string(),
        price,
        timestamp: time_at(ENTRY_INDEX),
        is_trading,
    }
}

/// Mock with a funded account, working subscriptions and a crossover window
fn funded_mock() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_venue_name().return_const("mock");
    gateway.expect_get_balance().returning(|| {
        Ok(AccountBalance {
            amount: dec!(10000),
            currency: "USD".to_string(),
        })
    });
    gateway.expect_subscribe_price().returning(|_, _| Ok(()));
    gateway
        .expect_get_candles()
        .returning(|_, _, _, _| Ok(crossover_window()));
    gateway
}

async fn started_engine<G: MarketGateway + 'static>(
    gateway: Arc<G>,
    symbols: &[&str],
) -> TradingEngine<G> {
    let mut engine = TradingEngine::new(small_window_config(symbols), gateway).unwrap();
    engine.initialize().await.unwrap();
    engine
}

async fn paper_engine() -> (Arc<PaperGateway>, TradingEngine<PaperGateway>) {
    let gateway = Arc::new(PaperGateway::new(dec!(10000)));
    gateway
        .load_bars("R_100", minute_bars(&CROSSOVER_CLOSES), ENTRY_INDEX + 1)
        .await;
    let engine = started_engine(gateway.clone(), &["R_100"]).await;
    (gateway, engine)
}

// ============================================================================
// Failure paths
// ============================================================================

#[test_log::test(tokio::test)]
async fn test_rejected_order_leaves_no_state() {
    let mut gateway = funded_mock();
    gateway
        .expect_get_price()
        .returning(|symbol| Ok(quote(symbol, 99.0, true)));
    gateway
        .expect_place_order()
        .times(1)
        .returning(|_| Err(EngineError::OrderRejected("stake below minimum".to_string())));
    gateway.expect_subscribe_contract().never();

    let mut engine = started_engine(Arc::new(gateway), &["R_100"]).await;
    let err = engine.run_iteration(time_at(ENTRY_INDEX)).await.unwrap_err();

    assert!(matches!(err, EngineError::OrderRejected(_)));
    assert!(engine.open_positions().is_empty());
    assert!(engine.trade_history().is_empty());
    assert_eq!(engine.risk_metrics(time_at(ENTRY_INDEX)).open_positions, 0);
}

#[test_log::test(tokio::test)]
async fn test_closed_market_skips_order() {
    let mut gateway = funded_mock();
    gateway
        .expect_get_price()
        .returning(|symbol| Ok(quote(symbol, 99.0, false)));
    gateway.expect_place_order().never();

    let mut engine = started_engine(Arc::new(gateway), &["R_100"]).await;
    let err = engine.run_iteration(time_at(ENTRY_INDEX)).await.unwrap_err();

    assert!(matches!(err, EngineError::MarketClosed(symbol) if symbol == "R_100"));
    assert!(engine.open_positions().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_gateway_failure_abandons_iteration() {
    let mut gateway = MockGateway::new();
    gateway.expect_venue_name().return_const("mock");
    gateway.expect_get_balance().returning(|| {
        Ok(AccountBalance {
            amount: dec!(10000),
            currency: "USD".to_string(),
        })
    });
    gateway.expect_subscribe_price().returning(|_, _| Ok(()));
    gateway
        .expect_get_candles()
        .times(1)
        .returning(|_, _, _, _| Err(EngineError::Gateway("connection reset".to_string())));

    let mut engine = started_engine(Arc::new(gateway), &["R_100", "R_50"]).await;
    let err = engine.run_iteration(time_at(ENTRY_INDEX)).await.unwrap_err();

    assert!(err.is_gateway());
}

#[test_log::test(tokio::test)]
async fn test_short_history_is_not_an_error() {
    let mut gateway = MockGateway::new();
    gateway.expect_venue_name().return_const("mock");
    gateway.expect_get_balance().returning(|| {
        Ok(AccountBalance {
            amount: dec!(10000),
            currency: "USD".to_string(),
        })
    });
    gateway.expect_subscribe_price().returning(|_, _| Ok(()));
    gateway
        .expect_get_candles()
        .returning(|_, _, _, _| Ok(minute_bars(&CROSSOVER_CLOSES[..3])));
    gateway.expect_place_order().never();

    let mut engine = started_engine(Arc::new(gateway), &["R_100"]).await;

    assert_eq!(engine.evaluate_symbol("R_100").await.unwrap(), None);
    engine.run_iteration(time_at(2)).await.unwrap();
    assert!(engine.open_positions().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_failed_close_keeps_position_open() {
    let mut gateway = funded_mock();
    gateway
        .expect_get_price()
        .returning(|symbol| Ok(quote(symbol, 99.0, true)));
    gateway.expect_place_order().times(1).returning(|request| {
        assert_eq!(request.direction, Direction::Call);
        Ok(OrderConfirmation {
            contract_id: "C1".to_string(),
            entry_price: 99.0,
        })
    });
    gateway.expect_subscribe_contract().returning(|_, _| Ok(()));

    let mut attempts = 0;
    gateway.expect_close_order().times(2).returning(move |_| {
        attempts += 1;
        if attempts == 1 {
            Err(EngineError::Timeout("close_order".to_string()))
        } else {
            Ok(CloseConfirmation {
                exit_price: 100.0,
                profit_loss: dec!(1.10),
            })
        }
    });

    let mut engine = started_engine(Arc::new(gateway), &["R_100"]).await;
    engine.run_iteration(time_at(ENTRY_INDEX)).await.unwrap();
    assert_eq!(engine.open_positions().len(), 1);
    assert!(engine.open_positions().contains_key("C1"));

    let err = engine
        .close_position("C1", time_at(ENTRY_INDEX + 1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Timeout(_)));
    assert_eq!(engine.open_positions().len(), 1);
    assert_eq!(engine.risk_metrics(time_at(ENTRY_INDEX + 1)).open_positions, 1);

    let record = engine
        .close_position("C1", time_at(ENTRY_INDEX + 1))
        .await
        .unwrap();
    assert_eq!(record.exit_reason, ExitReason::Manual);
    assert_eq!(record.profit_loss, dec!(1.10));
    assert!(engine.open_positions().is_empty());
    assert_eq!(engine.performance().metrics().total_trades, 1);
}

#[test_log::test(tokio::test)]
async fn test_contract_subscription_failure_keeps_position() {
    let mut gateway = funded_mock();
    gateway
        .expect_get_price()
        .returning(|symbol| Ok(quote(symbol, 99.0, true)));
    gateway.expect_place_order().returning(|_| {
        Ok(OrderConfirmation {
            contract_id: "C1".to_string(),
            entry_price: 99.0,
        })
    });
    gateway
        .expect_subscribe_contract()
        .returning(|_, _| Err(EngineError::Gateway("subscription refused".to_string())));

    let mut engine = started_engine(Arc::new(gateway), &["R_100"]).await;
    engine.run_iteration(time_at(ENTRY_INDEX)).await.unwrap();

    assert_eq!(engine.open_positions().len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_slipped_fill_moves_stop_and_target() {
    let mut gateway = funded_mock();
    gateway
        .expect_get_price()
        .returning(|symbol| Ok(quote(symbol, 100.0, true)));
    gateway.expect_place_order().times(1).returning(|_| {
        Ok(OrderConfirmation {
            contract_id: "C1".to_string(),
            entry_price: 101.0,
        })
    });
    gateway.expect_subscribe_contract().returning(|_, _| Ok(()));
    gateway.expect_close_order().never();

    let mut engine = started_engine(Arc::new(gateway), &["R_100"]).await;
    engine.run_iteration(time_at(ENTRY_INDEX)).await.unwrap();

    let position = engine.open_positions().get("C1").cloned().unwrap();
    let atr = 11.0 / 6.0;
    assert_eq!(position.entry_price, 101.0);
    assert!((position.stop_loss - (101.0 - atr)).abs() < 1e-9);
    assert!((position.take_profit - (101.0 + atr * 1.5)).abs() < 1e-9);
    assert_eq!(position.stake, dec!(109.09));

    // stake × stop distance stays within balance × risk_per_trade
    let distance = Decimal::from_f64(position.entry_price - position.stop_loss).unwrap();
    assert!(position.stake * distance <= dec!(10000) * dec!(0.02));
}

#[test_log::test(tokio::test)]
async fn test_unusable_fill_is_sold_back() {
    let mut gateway = funded_mock();
    gateway
        .expect_get_price()
        .returning(|symbol| Ok(quote(symbol, 99.0, true)));
    // Shifting a 1.0 fill puts the stop below zero
    gateway.expect_place_order().times(1).returning(|_| {
        Ok(OrderConfirmation {
            contract_id: "C1".to_string(),
            entry_price: 1.0,
        })
    });
    gateway.expect_subscribe_contract().never();
    gateway
        .expect_close_order()
        .times(1)
        .withf(|contract_id| contract_id == "C1")
        .returning(|_| {
            Ok(CloseConfirmation {
                exit_price: 1.0,
                profit_loss: dec!(-0.50),
            })
        });

    let mut engine = started_engine(Arc::new(gateway), &["R_100"]).await;
    engine.run_iteration(time_at(ENTRY_INDEX)).await.unwrap();

    assert!(engine.open_positions().is_empty());
    assert!(engine.trade_history().is_empty());
    assert_eq!(engine.risk_metrics(time_at(ENTRY_INDEX)).open_positions, 0);
}

#[test_log::test(tokio::test)]
async fn test_untrackable_contract_is_sold_back() {
    let mut gateway = funded_mock();
    gateway
        .expect_get_price()
        .returning(|symbol| Ok(quote(symbol, 100.0, true)));
    // The broker hands out the same contract id for both symbols
    gateway.expect_place_order().times(2).returning(|_| {
        Ok(OrderConfirmation {
            contract_id: "C1".to_string(),
            entry_price: 99.0,
        })
    });
    gateway
        .expect_subscribe_contract()
        .times(1)
        .returning(|_, _| Ok(()));
    gateway
        .expect_close_order()
        .times(1)
        .withf(|contract_id| contract_id == "C1")
        .returning(|_| {
            Ok(CloseConfirmation {
                exit_price: 99.0,
                profit_loss: Decimal::ZERO,
            })
        });

    let mut engine = started_engine(Arc::new(gateway), &["R_100", "R_50"]).await;
    engine.run_iteration(time_at(ENTRY_INDEX)).await.unwrap();

    assert_eq!(engine.open_positions().len(), 1);
    assert_eq!(engine.open_positions()["C1"].symbol, "R_100");
    assert_eq!(engine.risk_metrics(time_at(ENTRY_INDEX)).open_positions, 1);
}

#[test_log::test(tokio::test)]
async fn test_unchanged_candle_is_evaluated_once() {
    let mut gateway = funded_mock();
    gateway
        .expect_get_price()
        .returning(|symbol| Ok(quote(symbol, 100.0, true)));
    gateway.expect_place_order().times(1).returning(|_| {
        Ok(OrderConfirmation {
            contract_id: "C1".to_string(),
            entry_price: 99.0,
        })
    });
    gateway.expect_subscribe_contract().returning(|_, _| Ok(()));

    let mut engine = started_engine(Arc::new(gateway), &["R_100"]).await;
    let now = time_at(ENTRY_INDEX);
    engine.run_iteration(now).await.unwrap();
    // Polling runs faster than the candles close
    engine
        .run_iteration(now + ChronoDuration::seconds(30))
        .await
        .unwrap();

    assert_eq!(engine.open_positions().len(), 1);
    assert_eq!(engine.risk_metrics(now).open_positions, 1);
}

#[test_log::test(tokio::test)]
async fn test_gateway_failure_retries_same_candle() {
    let mut gateway = funded_mock();
    let mut calls = 0;
    gateway.expect_get_price().returning(move |symbol| {
        calls += 1;
        Ok(quote(symbol, 99.0, calls > 1))
    });
    gateway.expect_place_order().times(1).returning(|_| {
        Ok(OrderConfirmation {
            contract_id: "C1".to_string(),
            entry_price: 99.0,
        })
    });
    gateway.expect_subscribe_contract().returning(|_, _| Ok(()));

    let mut engine = started_engine(Arc::new(gateway), &["R_100"]).await;
    let now = time_at(ENTRY_INDEX);
    let err = engine.run_iteration(now).await.unwrap_err();
    assert!(matches!(err, EngineError::MarketClosed(_)));
    assert!(engine.open_positions().is_empty());

    engine
        .run_iteration(now + ChronoDuration::seconds(30))
        .await
        .unwrap();
    assert_eq!(engine.open_positions().len(), 1);
}

// ============================================================================
// Paper gateway flows
// ============================================================================

#[test_log::test(tokio::test)]
async fn test_push_update_closes_at_target() {
    let (gateway, mut engine) = paper_engine().await;

    engine.run_iteration(time_at(ENTRY_INDEX)).await.unwrap();
    let position = engine.open_positions().get("paper-000001").cloned().unwrap();
    assert_eq!(position.direction, Direction::Call);
    assert_eq!(position.entry_price, 99.0);
    assert_eq!(position.stake, dec!(109.09));
    assert_eq!(gateway.open_contracts().await, 1);

    // Next bar closes at 102, above the 101.75 target
    assert_eq!(gateway.advance().await, 1);
    let handled = engine.drain_events().await.unwrap();
    assert_eq!(handled, 2);

    assert!(engine.open_positions().is_empty());
    assert_eq!(gateway.open_contracts().await, 0);

    let history = engine.trade_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].exit_reason, ExitReason::TakeProfit);
    assert_eq!(history[0].exit_price, 102.0);
    assert!(history[0].profit_loss > Decimal::ZERO);

    let balance = gateway.get_balance().await.unwrap().amount;
    assert_eq!(balance, dec!(10000) + history[0].profit_loss);
    let metrics = engine.risk_metrics(time_at(ENTRY_INDEX + 1));
    assert_eq!(metrics.balance, balance);
    assert_eq!(metrics.open_positions, 0);
    assert_eq!(engine.performance().metrics().winning_trades, 1);
}

#[test_log::test(tokio::test)]
async fn test_racing_closes_record_once() {
    let (gateway, mut engine) = paper_engine().await;
    engine.run_iteration(time_at(ENTRY_INDEX)).await.unwrap();

    gateway.advance().await;
    // A duplicate push for the same contract arrives behind the real ones
    engine
        .event_sender()
        .send(GatewayEvent::Contract {
            contract_id: "paper-000001".to_string(),
            current_spot: 102.0,
            timestamp: time_at(ENTRY_INDEX + 1),
        })
        .await
        .unwrap();

    assert_eq!(engine.drain_events().await.unwrap(), 3);

    let err = engine
        .close_position("paper-000001", time_at(ENTRY_INDEX + 1))
        .await
        .unwrap_err();
    assert!(err.is_state_conflict());

    assert_eq!(engine.trade_history().len(), 1);
    assert_eq!(engine.performance().metrics().total_trades, 1);
    let metrics = engine.risk_metrics(time_at(ENTRY_INDEX + 1));
    assert_eq!(metrics.daily_trades, 1);
}

#[test_log::test(tokio::test)]
async fn test_polling_closes_at_stop() {
    let gateway = Arc::new(PaperGateway::new(dec!(10000)));
    // Crossover at 99, then a drop through the 97.17 stop
    let closes = [100.0, 99.0, 98.0, 97.0, 96.0, 97.0, 99.0, 96.0];
    gateway
        .load_bars("R_100", minute_bars(&closes), ENTRY_INDEX + 1)
        .await;
    let mut engine = started_engine(gateway.clone(), &["R_100"]).await;

    engine.run_iteration(time_at(ENTRY_INDEX)).await.unwrap();
    assert_eq!(engine.open_positions().len(), 1);

    // Step without draining so the poll sees the breach first
    gateway.advance().await;
    engine.run_iteration(time_at(ENTRY_INDEX + 1)).await.unwrap();

    let history = engine.trade_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].exit_reason, ExitReason::StopLoss);
    let loss = history[0].profit_loss;
    assert!(loss < Decimal::ZERO);

    // The same bar is a bearish crossover, opened before the poll ran
    let remaining: Vec<Direction> = engine
        .open_positions()
        .values()
        .map(|p| p.direction)
        .collect();
    assert_eq!(remaining, vec![Direction::Put]);

    // The queued pushes now find nothing to close
    engine.drain_events().await.unwrap();
    assert_eq!(engine.trade_history().len(), 1);

    let metrics = engine.risk_metrics(time_at(ENTRY_INDEX + 1));
    assert_eq!(metrics.daily_loss, -loss);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_shutdown() {
    let (_gateway, mut engine) = paper_engine().await;

    engine
        .run(tokio::time::sleep(Duration::from_millis(50)))
        .await
        .unwrap();

    assert_eq!(engine.open_positions().len(), 1);
    // The event queue is usable again after the loop returns
    assert_eq!(engine.drain_events().await.unwrap(), 0);
}
