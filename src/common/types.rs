//! Unified types shared by the live engine, the gateway and the backtester

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Contract direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Profits when price rises
    Call,
    /// Profits when price falls
    Put,
}

impl Direction {
    /// +1.0 for CALL, -1.0 for PUT
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Call => 1.0,
            Direction::Put => -1.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Call => write!(f, "CALL"),
            Direction::Put => write!(f, "PUT"),
        }
    }
}

/// One OHLC sample for a fixed interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }
}

/// Latest spot quote for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    /// Whether the market currently accepts orders
    pub is_trading: bool,
}

/// Account balance as reported by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub amount: Decimal,
    pub currency: String,
}

/// Contract duration unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationUnit {
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
    #[serde(rename = "d")]
    Days,
}

impl std::fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DurationUnit::Minutes => write!(f, "m"),
            DurationUnit::Hours => write!(f, "h"),
            DurationUnit::Days => write!(f, "d"),
        }
    }
}

/// Contract lifetime requested from the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDuration {
    pub value: u32,
    pub unit: DurationUnit,
}

impl Default for ContractDuration {
    fn default() -> Self {
        Self {
            value: 1,
            unit: DurationUnit::Minutes,
        }
    }
}

/// Buy request sent to the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: Direction,
    pub stake: Decimal,
    pub duration: ContractDuration,
}

/// Confirmed buy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub contract_id: String,
    pub entry_price: f64,
}

/// Confirmed sell, with the broker's authoritative P/L
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseConfirmation {
    pub exit_price: f64,
    pub profit_loss: Decimal,
}

/// Push updates delivered by gateway subscriptions
///
/// Both price ticks and contract updates are funnelled into one queue so the
/// decision loop observes them in order with its own polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GatewayEvent {
    /// Spot update for a subscribed symbol
    Price(PriceQuote),
    /// Current spot for an open contract
    Contract {
        contract_id: String,
        current_spot: f64,
        timestamp: DateTime<Utc>,
    },
}

impl GatewayEvent {
    /// Timestamp carried by the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            GatewayEvent::Price(quote) => quote.timestamp,
            GatewayEvent::Contract { timestamp, .. } => *timestamp,
        }
    }
}
