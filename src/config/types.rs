//! Configuration types

use chrono::{Datelike, NaiveTime, Timelike, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::common::errors::{EngineError, Result};
use crate::common::types::{ContractDuration, DurationUnit};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Indicator windows and trigger thresholds
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Account-level risk budget
    #[serde(default)]
    pub risk: RiskConfig,
    /// Traded instruments
    #[serde(default = "default_symbols")]
    pub symbols: Vec<SymbolConfig>,
    /// Live decision loop settings
    #[serde(default)]
    pub engine: EngineSettings,
    /// Replay settings
    #[serde(default)]
    pub backtest: BacktestSettings,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyConfig::default(),
            risk: RiskConfig::default(),
            symbols: default_symbols(),
            engine: EngineSettings::default(),
            backtest: BacktestSettings::default(),
            settings: AppSettings::default(),
        }
    }
}

impl AppConfig {
    /// Reject parameter combinations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()?;
        self.risk.validate()?;

        for symbol in &self.symbols {
            symbol.validate()?;
        }

        if self.engine.event_channel_size == 0 {
            return Err(invalid("event channel size must be positive"));
        }
        if self.backtest.initial_balance <= Decimal::ZERO {
            return Err(invalid("initial balance must be positive"));
        }
        if self.backtest.chunk_size == 0 {
            return Err(invalid("backtest chunk size must be positive"));
        }
        Ok(())
    }

    /// Symbols with `enabled = true`
    pub fn enabled_symbols(&self) -> Vec<&SymbolConfig> {
        self.symbols.iter().filter(|s| s.enabled).collect()
    }

    /// Per-symbol settings, if configured
    pub fn symbol(&self, symbol: &str) -> Option<&SymbolConfig> {
        self.symbols.iter().find(|s| s.symbol == symbol)
    }
}

fn invalid(message: impl Into<String>) -> EngineError {
    EngineError::Configuration(message.into())
}

/// Indicator and trigger parameters for the signal arbiter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub short_window: usize,
    pub medium_window: usize,
    pub long_window: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub atr_period: usize,
    /// Window for the rolling std-dev of returns
    pub volatility_window: usize,
    pub volatility_threshold: f64,
    pub risk_reward_ratio: f64,
    pub atr_multiplier: f64,
    /// Lookback for momentum and percentage change
    pub price_action_lookback: usize,
    pub momentum_threshold: f64,
    pub enable_mean_reversion: bool,
    /// Minimum relative distance from the medium EMA for mean reversion
    pub mean_reversion_distance: f64,
    /// Slack added to the opposite RSI extreme on crossovers
    pub rsi_tolerance: f64,
    /// Bars required beyond the longest window before a signal is trusted
    pub min_bars_buffer: usize,
    /// Extra bars fetched beyond the longest window
    pub history_buffer: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            short_window: 3,
            medium_window: 10,
            long_window: 30,
            rsi_period: 10,
            rsi_overbought: 75.0,
            rsi_oversold: 25.0,
            atr_period: 10,
            volatility_window: 20,
            volatility_threshold: 0.005,
            risk_reward_ratio: 1.5,
            atr_multiplier: 1.5,
            price_action_lookback: 3,
            momentum_threshold: 0.001,
            enable_mean_reversion: true,
            mean_reversion_distance: 0.001,
            rsi_tolerance: 5.0,
            min_bars_buffer: 10,
            history_buffer: 50,
        }
    }
}

impl StrategyConfig {
    /// Bars needed before the last indicator bar can be trusted
    pub fn min_bars(&self) -> usize {
        self.long_window.max(self.rsi_period) + self.min_bars_buffer
    }

    /// Bars fetched per evaluation
    pub fn history_len(&self) -> usize {
        self.long_window
            .max(self.rsi_period)
            .max(self.atr_period)
            .max(self.volatility_window)
            + self.history_buffer
    }

    fn validate(&self) -> Result<()> {
        let periods = [
            self.short_window,
            self.medium_window,
            self.long_window,
            self.rsi_period,
            self.atr_period,
            self.volatility_window,
            self.price_action_lookback,
        ];
        if periods.iter().any(|p| *p == 0) {
            return Err(invalid("indicator periods must be positive"));
        }
        if self.short_window >= self.medium_window {
            return Err(invalid("short window must be less than medium window"));
        }
        if self.medium_window >= self.long_window {
            return Err(invalid("medium window must be less than long window"));
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(invalid("RSI oversold level must be less than overbought"));
        }
        if self.volatility_threshold <= 0.0 {
            return Err(invalid("volatility threshold must be positive"));
        }
        if self.risk_reward_ratio <= 1.0 {
            return Err(invalid("risk-reward ratio must be greater than 1"));
        }
        if self.atr_multiplier <= 0.0 {
            return Err(invalid("ATR multiplier must be positive"));
        }
        Ok(())
    }
}

/// Account-level risk budget and trading window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Ceiling for total open risk as a fraction of balance
    pub max_risk: Decimal,
    pub max_daily_loss: Decimal,
    pub risk_per_trade: Decimal,
    pub max_open_trades: usize,
    pub min_volatility: f64,
    pub max_volatility: f64,
    pub trading_start: NaiveTime,
    pub trading_end: NaiveTime,
    /// ISO weekday numbers, Monday = 1
    pub trading_days: Vec<u32>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_risk: dec!(0.10),
            max_daily_loss: dec!(0.05),
            risk_per_trade: dec!(0.02),
            max_open_trades: 3,
            min_volatility: 0.003,
            max_volatility: 0.03,
            trading_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            trading_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
            trading_days: vec![1, 2, 3, 4, 5],
        }
    }
}

impl RiskConfig {
    /// Whether `weekday` is one of the configured trading days
    pub fn is_trading_day(&self, weekday: Weekday) -> bool {
        self.trading_days.contains(&weekday.number_from_monday())
    }

    /// Whether `time` is inside the inclusive trading window
    pub fn is_trading_time(&self, time: NaiveTime) -> bool {
        self.trading_start <= time && time <= self.trading_end
    }

    /// Combined day and time check for a timestamp
    pub fn is_trading_allowed<T: Datelike + Timelike>(&self, at: &T) -> bool {
        match NaiveTime::from_hms_opt(at.hour(), at.minute(), at.second()) {
            Some(time) => self.is_trading_day(at.weekday()) && self.is_trading_time(time),
            None => false,
        }
    }

    fn validate(&self) -> Result<()> {
        let unit = Decimal::ONE;
        for (name, value) in [
            ("max risk", self.max_risk),
            ("max daily loss", self.max_daily_loss),
            ("risk per trade", self.risk_per_trade),
        ] {
            if value <= Decimal::ZERO || value > unit {
                return Err(invalid(format!("invalid {} (must be between 0 and 1)", name)));
            }
        }
        if self.max_open_trades == 0 {
            return Err(invalid("maximum open trades must be positive"));
        }
        if self.min_volatility < 0.0 || self.min_volatility > self.max_volatility {
            return Err(invalid("volatility bounds must satisfy 0 <= min <= max"));
        }
        if self.trading_start > self.trading_end {
            return Err(invalid("trading start must not be after trading end"));
        }
        if self.trading_days.iter().any(|d| !(1..=7).contains(d)) {
            return Err(invalid("trading days must be ISO weekday numbers 1-7"));
        }
        Ok(())
    }
}

/// Symbol-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub symbol: String,
    /// Stake hint used for the projected-loss check
    #[serde(default = "default_stake_amount")]
    pub stake_amount: Decimal,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default = "default_duration_unit")]
    pub duration_unit: DurationUnit,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl SymbolConfig {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            stake_amount: default_stake_amount(),
            duration: default_duration(),
            duration_unit: default_duration_unit(),
            enabled: default_enabled(),
        }
    }

    /// Requested contract lifetime
    pub fn contract_duration(&self) -> ContractDuration {
        ContractDuration {
            value: self.duration,
            unit: self.duration_unit,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(invalid("symbol must not be empty"));
        }
        if self.stake_amount <= Decimal::ZERO {
            return Err(invalid(format!("invalid stake amount for {}", self.symbol)));
        }
        if self.duration == 0 {
            return Err(invalid(format!("invalid duration for {}", self.symbol)));
        }
        Ok(())
    }
}

fn default_symbols() -> Vec<SymbolConfig> {
    vec![SymbolConfig::new("R_100")]
}

fn default_stake_amount() -> Decimal {
    dec!(100)
}

fn default_duration() -> u32 {
    1
}

fn default_duration_unit() -> DurationUnit {
    DurationUnit::Minutes
}

fn default_enabled() -> bool {
    true
}

/// Live decision loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Delay between decision-loop iterations
    pub iteration_delay_seconds: u64,
    /// Per-call gateway timeout
    pub request_timeout_seconds: u64,
    pub event_channel_size: usize,
    pub candle_granularity_seconds: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            iteration_delay_seconds: 30,
            request_timeout_seconds: 30,
            event_channel_size: crate::common::channels::DEFAULT_CHANNEL_SIZE,
            candle_granularity_seconds: 60,
        }
    }
}

/// Replay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    pub initial_balance: Decimal,
    /// Candles per gateway request when fetching history
    pub chunk_size: usize,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_balance: dec!(10000),
            chunk_size: 5000,
        }
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
