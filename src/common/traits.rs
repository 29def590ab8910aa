//! Trait definitions for the market data & execution gateway

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::errors::Result;
use super::types::{
    AccountBalance, Bar, CloseConfirmation, GatewayEvent, OrderConfirmation, OrderRequest,
    PriceQuote,
};

/// Market data & execution venue consumed by the live engine and the backtester
///
/// Session, authentication and wire-level subscription handling live behind
/// this trait. Push updates are delivered into the provided channel instead of
/// through callbacks, so the decision loop can consume them in order.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    /// Latest quote for a symbol
    async fn get_price(&self, symbol: &str) -> Result<PriceQuote>;

    /// Historical candles ending at `end` (or now), oldest first
    ///
    /// # Arguments
    /// * `symbol` - Instrument symbol
    /// * `count` - Number of candles requested
    /// * `granularity_seconds` - Candle interval
    /// * `end` - Last candle time, `None` for latest
    async fn get_candles(
        &self,
        symbol: &str,
        count: usize,
        granularity_seconds: u32,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>>;

    /// Stream spot updates for a symbol; idempotent if already subscribed
    async fn subscribe_price(&self, symbol: &str, sender: mpsc::Sender<GatewayEvent>)
        -> Result<()>;

    /// Current account balance
    async fn get_balance(&self) -> Result<AccountBalance>;

    /// Buy a contract; fails with the broker message on rejection
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderConfirmation>;

    /// Sell an open contract
    async fn close_order(&self, contract_id: &str) -> Result<CloseConfirmation>;

    /// Stream current spot for an open contract
    async fn subscribe_contract(
        &self,
        contract_id: &str,
        sender: mpsc::Sender<GatewayEvent>,
    ) -> Result<()>;

    /// Name used in logs
    fn venue_name(&self) -> &'static str;
}
