//! In-memory paper gateway
//!
//! Replays preloaded bars as a live feed. Each [`PaperGateway::advance`]
//! moves every symbol one bar forward and pushes price and contract updates
//! to subscribers. Orders fill at the current close and settle with the
//! simulation P/L formula.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, instrument};

use crate::common::errors::{EngineError, Result};
use crate::common::traits::MarketGateway;
use crate::common::types::{
    AccountBalance, Bar, CloseConfirmation, Direction, GatewayEvent, OrderConfirmation,
    OrderRequest, PriceQuote,
};
use crate::execution::simulated_pnl;

#[derive(Debug, Clone)]
struct PaperContract {
    symbol: String,
    direction: Direction,
    entry_price: f64,
    stake: Decimal,
}

#[derive(Debug, Default)]
struct PaperState {
    bars: HashMap<String, Vec<Bar>>,
    /// Index of the current bar per symbol
    cursor: HashMap<String, usize>,
    halted: HashSet<String>,
    balance: Decimal,
    contracts: HashMap<String, PaperContract>,
    next_contract: u64,
    price_subscribers: HashMap<String, mpsc::Sender<GatewayEvent>>,
    contract_subscribers: HashMap<String, mpsc::Sender<GatewayEvent>>,
}

impl PaperState {
    fn current_bar(&self, symbol: &str) -> Result<&Bar> {
        let bars = self
            .bars
            .get(symbol)
            .ok_or_else(|| EngineError::Gateway(format!("unknown symbol: {}", symbol)))?;
        let index = self.cursor.get(symbol).copied().unwrap_or(0);
        bars.get(index)
            .ok_or_else(|| EngineError::Gateway(format!("no data for {}", symbol)))
    }
}

/// Market gateway backed by in-memory bars
#[derive(Debug, Clone)]
pub struct PaperGateway {
    state: Arc<RwLock<PaperState>>,
    currency: String,
}

impl PaperGateway {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            state: Arc::new(RwLock::new(PaperState {
                balance: initial_balance,
                next_contract: 1,
                ..PaperState::default()
            })),
            currency: "USD".to_string(),
        }
    }

    /// Load bars for a symbol, positioned at the first `warmup` bars
    ///
    /// The first `warmup` bars are treated as already elapsed history.
    pub async fn load_bars(&self, symbol: &str, mut bars: Vec<Bar>, warmup: usize) {
        bars.sort_by_key(|b| b.timestamp);
        let cursor = warmup.clamp(1, bars.len().max(1)) - 1;
        let mut state = self.state.write().await;
        info!("Loaded {} bars for {}", bars.len(), symbol);
        state.bars.insert(symbol.to_string(), bars);
        state.cursor.insert(symbol.to_string(), cursor);
    }

    /// Mark a symbol as closed or open for trading
    pub async fn set_trading(&self, symbol: &str, trading: bool) {
        let mut state = self.state.write().await;
        if trading {
            state.halted.remove(symbol);
        } else {
            state.halted.insert(symbol.to_string());
        }
    }

    /// Step every symbol one bar forward and push updates
    ///
    /// Returns the number of symbols that advanced; zero once every feed is
    /// exhausted.
    pub async fn advance(&self) -> usize {
        let mut deliveries = Vec::new();
        let advanced = {
            let mut state = self.state.write().await;
            let mut advanced = Vec::new();

            let symbols: Vec<String> = state.bars.keys().cloned().collect();
            for symbol in symbols {
                let len = state.bars.get(&symbol).map(Vec::len).unwrap_or(0);
                let cursor = state.cursor.entry(symbol.clone()).or_insert(0);
                if *cursor + 1 < len {
                    *cursor += 1;
                    advanced.push(symbol);
                }
            }

            for symbol in &advanced {
                let bar = match state.current_bar(symbol) {
                    Ok(bar) => *bar,
                    Err(_) => continue,
                };
                if let Some(sender) = state.price_subscribers.get(symbol) {
                    deliveries.push((
                        sender.clone(),
                        GatewayEvent::Price(PriceQuote {
                            symbol: symbol.clone(),
                            price: bar.close,
                            timestamp: bar.timestamp,
                            is_trading: !state.halted.contains(symbol),
                        }),
                    ));
                }
                for (contract_id, contract) in &state.contracts {
                    if &contract.symbol != symbol {
                        continue;
                    }
                    if let Some(sender) = state.contract_subscribers.get(contract_id) {
                        deliveries.push((
                            sender.clone(),
                            GatewayEvent::Contract {
                                contract_id: contract_id.clone(),
                                current_spot: bar.close,
                                timestamp: bar.timestamp,
                            },
                        ));
                    }
                }
            }
            advanced.len()
        };

        for (sender, event) in deliveries {
            if sender.send(event).await.is_err() {
                debug!("Subscriber dropped, skipping update");
            }
        }
        advanced
    }

    /// Timestamp of the current bar for a symbol
    pub async fn current_time(&self, symbol: &str) -> Result<DateTime<Utc>> {
        let state = self.state.read().await;
        Ok(state.current_bar(symbol)?.timestamp)
    }

    pub async fn open_contracts(&self) -> usize {
        self.state.read().await.contracts.len()
    }
}

#[async_trait]
impl MarketGateway for PaperGateway {
    async fn get_price(&self, symbol: &str) -> Result<PriceQuote> {
        let state = self.state.read().await;
        let bar = state.current_bar(symbol)?;
        Ok(PriceQuote {
            symbol: symbol.to_string(),
            price: bar.close,
            timestamp: bar.timestamp,
            is_trading: !state.halted.contains(symbol),
        })
    }

    /// Bars up to the current cursor; granularity is whatever was loaded
    async fn get_candles(
        &self,
        symbol: &str,
        count: usize,
        _granularity_seconds: u32,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>> {
        let state = self.state.read().await;
        let bars = state
            .bars
            .get(symbol)
            .ok_or_else(|| EngineError::Gateway(format!("unknown symbol: {}", symbol)))?;
        let cursor = state.cursor.get(symbol).copied().unwrap_or(0);

        let elapsed = &bars[..(cursor + 1).min(bars.len())];
        let eligible: Vec<Bar> = elapsed
            .iter()
            .filter(|b| end.map_or(true, |end| b.timestamp <= end))
            .copied()
            .collect();
        let start = eligible.len().saturating_sub(count);
        Ok(eligible[start..].to_vec())
    }

    #[instrument(skip(self, sender))]
    async fn subscribe_price(
        &self,
        symbol: &str,
        sender: mpsc::Sender<GatewayEvent>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.bars.contains_key(symbol) {
            return Err(EngineError::Gateway(format!("unknown symbol: {}", symbol)));
        }
        if state.price_subscribers.contains_key(symbol) {
            debug!("Already subscribed to {}", symbol);
            return Ok(());
        }
        state.price_subscribers.insert(symbol.to_string(), sender);
        info!("Subscribed to price updates for {}", symbol);
        Ok(())
    }

    async fn get_balance(&self) -> Result<AccountBalance> {
        let state = self.state.read().await;
        Ok(AccountBalance {
            amount: state.balance,
            currency: self.currency.clone(),
        })
    }

    #[instrument(skip(self))]
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderConfirmation> {
        let mut state = self.state.write().await;
        if state.halted.contains(&request.symbol) {
            return Err(EngineError::MarketClosed(request.symbol.clone()));
        }
        if request.stake <= Decimal::ZERO {
            return Err(EngineError::OrderRejected("stake must be positive".to_string()));
        }
        if request.stake > state.balance {
            return Err(EngineError::OrderRejected(format!(
                "insufficient balance: stake {} exceeds {}",
                request.stake, state.balance
            )));
        }

        let entry_price = state.current_bar(&request.symbol)?.close;
        let contract_id = format!("paper-{:06}", state.next_contract);
        state.next_contract += 1;
        state.contracts.insert(
            contract_id.clone(),
            PaperContract {
                symbol: request.symbol.clone(),
                direction: request.direction,
                entry_price,
                stake: request.stake,
            },
        );

        info!("Bought {} {} at {}", contract_id, request.direction, entry_price);
        Ok(OrderConfirmation {
            contract_id,
            entry_price,
        })
    }

    #[instrument(skip(self))]
    async fn close_order(&self, contract_id: &str) -> Result<CloseConfirmation> {
        let mut state = self.state.write().await;
        let contract = state
            .contracts
            .get(contract_id)
            .cloned()
            .ok_or_else(|| EngineError::Gateway(format!("unknown contract: {}", contract_id)))?;

        let exit_price = state.current_bar(&contract.symbol)?.close;
        let profit_loss =
            simulated_pnl(contract.direction, contract.entry_price, exit_price, contract.stake);

        state.contracts.remove(contract_id);
        state.contract_subscribers.remove(contract_id);
        state.balance += profit_loss;

        info!("Sold {} at {} for {}", contract_id, exit_price, profit_loss);
        Ok(CloseConfirmation {
            exit_price,
            profit_loss,
        })
    }

    async fn subscribe_contract(
        &self,
        contract_id: &str,
        sender: mpsc::Sender<GatewayEvent>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.contracts.contains_key(contract_id) {
            return Err(EngineError::Gateway(format!("unknown contract: {}", contract_id)));
        }
        state
            .contract_subscribers
            .insert(contract_id.to_string(), sender);
        Ok(())
    }

    fn venue_name(&self) -> &'static str {
        "paper"
    }
}
