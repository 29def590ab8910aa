//! Position and trade record types

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::types::Direction;
use crate::risk::Exposure;
use crate::strategy::{SizedSignal, Trigger};

/// Lifecycle state; `Closed` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Proposed,
    Open,
    Closed,
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Manual,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::TakeProfit => write!(f, "take_profit"),
            ExitReason::Manual => write!(f, "manual"),
        }
    }
}

/// A tracked trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub trade_id: String,
    /// Broker contract, set once the buy is confirmed
    pub contract_id: Option<String>,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub stake: Decimal,
    pub trigger: Trigger,
    pub status: PositionStatus,
    pub entry_time: DateTime<Utc>,
}

impl Position {
    /// New position in `Proposed` state from a sized signal
    pub fn proposed(trade_id: impl Into<String>, sized: &SizedSignal, at: DateTime<Utc>) -> Self {
        let signal = sized.signal();
        Self {
            trade_id: trade_id.into(),
            contract_id: None,
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            entry_price: signal.entry_price,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            stake: sized.stake(),
            trigger: signal.trigger,
            status: PositionStatus::Proposed,
            entry_time: at,
        }
    }

    /// Proposed → Open with the confirmed fill
    ///
    /// Stop and target move with the fill so the stop distance the stake was
    /// sized on is unchanged.
    pub fn confirm(mut self, contract_id: impl Into<String>, fill_price: f64) -> Self {
        let slippage = fill_price - self.entry_price;
        self.contract_id = Some(contract_id.into());
        self.entry_price = fill_price;
        self.stop_loss += slippage;
        self.take_profit += slippage;
        self.status = PositionStatus::Open;
        self
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn exposure(&self) -> Exposure {
        Exposure {
            symbol: self.symbol.clone(),
            direction: self.direction,
            entry_price: self.entry_price,
            stop_loss: self.stop_loss,
            stake: self.stake,
        }
    }

    /// Exit triggered by `price`, stop checked before target
    pub fn exit_reason_at(&self, price: f64) -> Option<ExitReason> {
        let (stop_hit, target_hit) = match self.direction {
            Direction::Call => (price <= self.stop_loss, price >= self.take_profit),
            Direction::Put => (price >= self.stop_loss, price <= self.take_profit),
        };
        if stop_hit {
            Some(ExitReason::StopLoss)
        } else if target_hit {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }

    /// Simulation P/L for closing at `exit_price`
    pub fn simulated_pnl(&self, exit_price: f64) -> Decimal {
        simulated_pnl(self.direction, self.entry_price, exit_price, self.stake)
    }

    /// Open → Closed, consuming the position
    pub fn into_record(
        mut self,
        exit_price: f64,
        profit_loss: Decimal,
        exit_reason: ExitReason,
        exit_time: DateTime<Utc>,
    ) -> TradeRecord {
        self.status = PositionStatus::Closed;
        TradeRecord {
            trade_id: self.trade_id,
            contract_id: self.contract_id,
            symbol: self.symbol,
            direction: self.direction,
            trigger: self.trigger,
            entry_price: self.entry_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            stake: self.stake,
            entry_time: self.entry_time,
            exit_price,
            exit_time,
            exit_reason,
            profit_loss,
        }
    }
}

/// (exit − entry) / entry × stake, sign-flipped for PUT
pub fn simulated_pnl(
    direction: Direction,
    entry_price: f64,
    exit_price: f64,
    stake: Decimal,
) -> Decimal {
    let (entry, exit) = match (Decimal::from_f64(entry_price), Decimal::from_f64(exit_price)) {
        (Some(entry), Some(exit)) if !entry.is_zero() => (entry, exit),
        _ => return Decimal::ZERO,
    };

    let pnl = (exit - entry) / entry * stake;
    match direction {
        Direction::Call => pnl,
        Direction::Put => -pnl,
    }
}

/// Immutable closed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: String,
    pub contract_id: Option<String>,
    pub symbol: String,
    pub direction: Direction,
    pub trigger: Trigger,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub stake: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_time: DateTime<Utc>,
    pub exit_reason: ExitReason,
    pub profit_loss: Decimal,
}

impl TradeRecord {
    pub fn is_win(&self) -> bool {
        self.profit_loss > Decimal::ZERO
    }
}
