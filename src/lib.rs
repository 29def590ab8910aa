//! Binary Options Engine Library
//!
//! Technical-indicator signal generation, risk gating and position lifecycle
//! for short-duration CALL/PUT contracts, with a deterministic backtester
//! that replays history through the same decision core.

pub mod backtest;
pub mod common;
pub mod config;
pub mod engine;
pub mod execution;
pub mod gateway;
pub mod indicators;
pub mod monitor;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use backtest::{BacktestEngine, BacktestReport};
pub use common::errors::{EngineError, RejectReason, Result};
pub use common::traits::MarketGateway;
pub use common::types::{
    AccountBalance, Bar, CloseConfirmation, ContractDuration, Direction, DurationUnit,
    GatewayEvent, OrderConfirmation, OrderRequest, PriceQuote,
};
pub use config::types::AppConfig;
pub use engine::TradingEngine;
pub use execution::{ExitReason, Position, PositionStatus, TradeRecord};
pub use gateway::PaperGateway;
pub use indicators::{IndicatorEngine, IndicatorSnapshot};
pub use monitor::{PerformanceMetrics, PerformanceTracker};
pub use risk::{RiskManager, RiskMetrics};

// Signal pipeline stages
pub use strategy::{
    BoxedStrategy, Decision, RawSignal, SignalArbiter, SignalEvaluator, SizedSignal, Strategy,
    Trigger, ValidatedSignal,
};
