//! Live position lifecycle over a market gateway

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use crate::common::errors::{EngineError, Result};
use crate::common::traits::MarketGateway;
use crate::common::types::{GatewayEvent, OrderRequest};
use crate::execution::book::PositionBook;
use crate::execution::position::{ExitReason, Position, TradeRecord};
use crate::gateway::with_timeout;
use crate::risk::check_levels;
use crate::strategy::SizedSignal;

/// Opens, tracks and closes positions through the gateway
///
/// Trade ids are the broker contract ids.
pub struct PositionManager<G: MarketGateway> {
    gateway: Arc<G>,
    book: PositionBook,
    events: mpsc::Sender<GatewayEvent>,
    timeout: Duration,
}

impl<G: MarketGateway> PositionManager<G> {
    pub fn new(gateway: Arc<G>, events: mpsc::Sender<GatewayEvent>, timeout: Duration) -> Self {
        Self {
            gateway,
            book: PositionBook::new(),
            events,
            timeout,
        }
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    /// Proposed → Open
    ///
    /// Requires a trading quote and a confirmed buy. Any failure before the
    /// buy is confirmed drops the signal with no state change. A confirmed
    /// contract that cannot be tracked is sold back before the error returns.
    #[instrument(skip(self, sized), fields(symbol = %sized.signal().symbol))]
    pub async fn open(&mut self, sized: &SizedSignal, now: DateTime<Utc>) -> Result<Position> {
        let signal = sized.signal();

        let quote = with_timeout(self.timeout, "get_price", self.gateway.get_price(&signal.symbol))
            .await?;
        if !quote.is_trading {
            return Err(EngineError::MarketClosed(signal.symbol.clone()));
        }

        let request = OrderRequest {
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            stake: sized.stake(),
            duration: signal.duration,
        };
        let confirmation =
            with_timeout(self.timeout, "place_order", self.gateway.place_order(&request)).await?;

        let position = Position::proposed(&confirmation.contract_id, sized, now)
            .confirm(confirmation.contract_id.clone(), confirmation.entry_price);
        if confirmation.entry_price != signal.entry_price {
            info!(
                contract_id = %confirmation.contract_id,
                signal_price = signal.entry_price,
                filled = confirmation.entry_price,
                "Fill slipped, moving stop and target"
            );
        }

        if let Err(reason) = check_levels(
            position.direction,
            position.entry_price,
            position.stop_loss,
            position.take_profit,
        ) {
            warn!(contract_id = %confirmation.contract_id, %reason, "Unusable fill");
            self.unwind(&confirmation.contract_id).await;
            return Err(EngineError::Validation(reason));
        }
        if let Err(e) = self.book.insert(position.clone()) {
            warn!(contract_id = %confirmation.contract_id, error = %e, "Cannot track contract");
            self.unwind(&confirmation.contract_id).await;
            return Err(e);
        }

        info!(
            trade_id = %position.trade_id,
            direction = %position.direction,
            entry_price = position.entry_price,
            stake = %position.stake,
            "Position opened"
        );

        // The buy is final at this point; polling still covers the position.
        if let Err(e) = with_timeout(
            self.timeout,
            "subscribe_contract",
            self.gateway
                .subscribe_contract(&confirmation.contract_id, self.events.clone()),
        )
        .await
        {
            warn!(trade_id = %position.trade_id, error = %e, "Contract subscription failed");
        }

        Ok(position)
    }

    /// Sell back a confirmed contract that never entered the book
    async fn unwind(&self, contract_id: &str) {
        match with_timeout(self.timeout, "close_order", self.gateway.close_order(contract_id))
            .await
        {
            Ok(confirmation) => warn!(
                contract_id,
                exit_price = confirmation.exit_price,
                pnl = %confirmation.profit_loss,
                "Untracked contract sold back"
            ),
            Err(e) => error!(contract_id, error = %e, "Untracked contract left open at broker"),
        }
    }

    /// Open → Closed through the gateway
    ///
    /// The position is removed before the sell so a racing close sees it as
    /// not found; it is restored if the sell fails.
    #[instrument(skip(self))]
    pub async fn close(
        &mut self,
        trade_id: &str,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Result<TradeRecord> {
        let position = self.book.take(trade_id)?;
        let contract_id = position
            .contract_id
            .clone()
            .unwrap_or_else(|| position.trade_id.clone());

        match with_timeout(self.timeout, "close_order", self.gateway.close_order(&contract_id))
            .await
        {
            Ok(confirmation) => Ok(self.book.settle(
                position,
                confirmation.exit_price,
                confirmation.profit_loss,
                reason,
                now,
            )),
            Err(e) => {
                warn!(trade_id, error = %e, "Close failed, keeping position open");
                self.book.restore(position);
                Err(e)
            }
        }
    }

    /// Open positions on `symbol` breached by `price`
    pub fn breached_by_symbol(&self, symbol: &str, price: f64) -> Vec<(String, ExitReason)> {
        self.book.breached_by_symbol(symbol, price)
    }

    /// Open position for `contract_id` breached by `spot`
    pub fn breached_by_contract(&self, contract_id: &str, spot: f64) -> Option<(String, ExitReason)> {
        self.book.breached_by_contract(contract_id, spot)
    }
}
