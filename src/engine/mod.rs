//! Live trading engine
//!
//! Wires the decision core (indicators, strategy, risk) to the position
//! lifecycle over a [`MarketGateway`](crate::common::traits::MarketGateway).

mod live;

pub use live::TradingEngine;
