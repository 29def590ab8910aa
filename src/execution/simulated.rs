//! In-memory executor used by the backtester

use chrono::{DateTime, Utc};

use crate::common::errors::Result;
use crate::execution::book::PositionBook;
use crate::execution::position::{ExitReason, Position, TradeRecord};
use crate::strategy::SizedSignal;

/// Fills at the signal's entry price and settles with the simulation P/L
#[derive(Debug)]
pub struct SimulatedExecutor {
    book: PositionBook,
    id_prefix: String,
    next_id: u64,
}

impl SimulatedExecutor {
    pub fn new(id_prefix: impl Into<String>) -> Self {
        Self {
            book: PositionBook::new(),
            id_prefix: id_prefix.into(),
            next_id: 1,
        }
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    fn next_trade_id(&mut self) -> String {
        let id = format!("{}-{:06}", self.id_prefix, self.next_id);
        self.next_id += 1;
        id
    }

    /// Open a position for a sized signal
    pub fn execute(&mut self, sized: &SizedSignal, at: DateTime<Utc>) -> Result<Position> {
        let trade_id = self.next_trade_id();
        let position = Position::proposed(&trade_id, sized, at)
            .confirm(trade_id.clone(), sized.signal().entry_price);
        self.book.insert(position.clone())?;
        Ok(position)
    }

    /// Close at `exit_price`; fails with not found on a repeated close
    pub fn close(
        &mut self,
        trade_id: &str,
        exit_price: f64,
        reason: ExitReason,
        at: DateTime<Utc>,
    ) -> Result<TradeRecord> {
        let position = self.book.take(trade_id)?;
        let pnl = position.simulated_pnl(exit_price);
        Ok(self.book.settle(position, exit_price, pnl, reason, at))
    }

    /// Close every position on `symbol` whose stop or target `price` breaches
    pub fn close_breached(
        &mut self,
        symbol: &str,
        price: f64,
        at: DateTime<Utc>,
    ) -> Result<Vec<TradeRecord>> {
        self.book
            .breached_by_symbol(symbol, price)
            .into_iter()
            .map(|(trade_id, reason)| self.close(&trade_id, price, reason, at))
            .collect()
    }
}
