//! Open positions and closed-trade history

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::info;

use crate::common::errors::{EngineError, Result};
use crate::execution::position::{ExitReason, Position, TradeRecord};

/// Open positions keyed by trade id, plus the append-only trade history
///
/// Removing a position is the single point where a close becomes
/// effective, so a second close on the same id always reports not found.
#[derive(Debug, Default)]
pub struct PositionBook {
    open: BTreeMap<String, Position>,
    history: Vec<TradeRecord>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an open position
    pub fn insert(&mut self, position: Position) -> Result<()> {
        if self.open.contains_key(&position.trade_id) {
            return Err(EngineError::DuplicatePosition(position.trade_id));
        }
        self.open.insert(position.trade_id.clone(), position);
        Ok(())
    }

    pub fn get(&self, trade_id: &str) -> Option<&Position> {
        self.open.get(trade_id)
    }

    pub fn open_positions(&self) -> &BTreeMap<String, Position> {
        &self.open
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn history(&self) -> &[TradeRecord] {
        &self.history
    }

    /// Remove a position for closing; fails if it is not open
    pub fn take(&mut self, trade_id: &str) -> Result<Position> {
        self.open
            .remove(trade_id)
            .ok_or_else(|| EngineError::PositionNotFound(trade_id.to_string()))
    }

    /// Put back a position whose close did not go through
    pub fn restore(&mut self, position: Position) {
        self.open.insert(position.trade_id.clone(), position);
    }

    /// Finalize a taken position and append it to history
    pub fn settle(
        &mut self,
        position: Position,
        exit_price: f64,
        profit_loss: Decimal,
        reason: ExitReason,
        at: DateTime<Utc>,
    ) -> TradeRecord {
        let record = position.into_record(exit_price, profit_loss, reason, at);
        info!(
            trade_id = %record.trade_id,
            symbol = %record.symbol,
            direction = %record.direction,
            exit_price,
            pnl = %record.profit_loss,
            %reason,
            "Position closed"
        );
        self.history.push(record.clone());
        record
    }

    /// Open positions on `symbol` whose stop or target `price` breaches
    pub fn breached_by_symbol(&self, symbol: &str, price: f64) -> Vec<(String, ExitReason)> {
        self.open
            .values()
            .filter(|p| p.symbol == symbol)
            .filter_map(|p| p.exit_reason_at(price).map(|r| (p.trade_id.clone(), r)))
            .collect()
    }

    /// Open position for `contract_id` if `spot` breaches it
    pub fn breached_by_contract(&self, contract_id: &str, spot: f64) -> Option<(String, ExitReason)> {
        self.open
            .values()
            .find(|p| p.contract_id.as_deref() == Some(contract_id))
            .and_then(|p| p.exit_reason_at(spot).map(|r| (p.trade_id.clone(), r)))
    }
}
