//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use binary_options_engine::config::{AppConfig, SymbolConfig};
use binary_options_engine::{
    AccountBalance, Bar, CloseConfirmation, GatewayEvent, MarketGateway, OrderConfirmation,
    OrderRequest, PriceQuote,
};
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use mockall::mock;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

/// Closes that produce exactly one bullish crossover (at index 6) that hits
/// its target on the next bar
pub const CROSSOVER_CLOSES: [f64; 10] = [
    100.0, 99.0, 98.0, 97.0, 96.0, 97.0, 99.0, 102.0, 104.0, 103.0,
];

/// Index of the bar that triggers the crossover
pub const ENTRY_INDEX: usize = 6;

/// Tuesday 2024-01-02 10:00 UTC
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap()
}

pub fn time_at(index: usize) -> DateTime<Utc> {
    start_time() + Duration::minutes(index as i64)
}

/// One-minute bars with a fixed 1.0 high-low range around each close
pub fn minute_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::new(time_at(i), c, c + 0.5, c - 0.5, c))
        .collect()
}

/// Short windows so ten bars are enough to trade, with a permissive risk gate
pub fn small_window_config(symbols: &[&str]) -> AppConfig {
    let mut config = AppConfig::default();

    config.strategy.short_window = 2;
    config.strategy.medium_window = 4;
    config.strategy.long_window = 5;
    config.strategy.rsi_period = 3;
    config.strategy.atr_period = 3;
    config.strategy.volatility_window = 3;
    config.strategy.min_bars_buffer = 1;
    config.strategy.history_buffer = 1;
    config.strategy.enable_mean_reversion = false;
    config.strategy.momentum_threshold = 0.05;
    config.strategy.atr_multiplier = 1.0;
    config.strategy.risk_reward_ratio = 1.5;

    config.risk.min_volatility = 0.0;
    config.risk.max_volatility = 1.0;
    config.risk.risk_per_trade = dec!(0.02);
    config.risk.trading_start = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
    config.risk.trading_end = NaiveTime::from_hms_opt(23, 59, 59).unwrap();
    config.risk.trading_days = (1..=7).collect();

    config.backtest.initial_balance = dec!(10000);
    config.engine.request_timeout_seconds = 5;

    config.symbols = symbols
        .iter()
        .map(|s| {
            let mut symbol = SymbolConfig::new(*s);
            symbol.stake_amount = dec!(1);
            symbol
        })
        .collect();

    config
}

mock! {
    pub Gateway {}

    #[async_trait]
    impl MarketGateway for Gateway {
        async fn get_price(&self, symbol: &str) -> binary_options_engine::Result<PriceQuote>;
        async fn get_candles(
            &self,
            symbol: &str,
            count: usize,
            granularity_seconds: u32,
            end: Option<DateTime<Utc>>,
        ) -> binary_options_engine::Result<Vec<Bar>>;
        async fn subscribe_price(
            &self,
            symbol: &str,
            sender: mpsc::Sender<GatewayEvent>,
        ) -> binary_options_engine::Result<()>;
        async fn get_balance(&self) -> binary_options_engine::Result<AccountBalance>;
        async fn place_order(
            &self,
            request: &OrderRequest,
        ) -> binary_options_engine::Result<OrderConfirmation>;
        async fn close_order(
            &self,
            contract_id: &str,
        ) -> binary_options_engine::Result<CloseConfirmation>;
        async fn subscribe_contract(
            &self,
            contract_id: &str,
            sender: mpsc::Sender<GatewayEvent>,
        ) -> binary_options_engine::Result<()>;
        fn venue_name(&self) -> &'static str;
    }
}
