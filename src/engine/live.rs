//! Live decision loop

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::common::channels::create_event_channel_with_size;
use crate::common::errors::{EngineError, Result};
use crate::common::traits::MarketGateway;
use crate::common::types::{Bar, GatewayEvent};
use crate::config::{AppConfig, SymbolConfig};
use crate::execution::{ExitReason, Position, PositionManager, TradeRecord};
use crate::gateway::with_timeout;
use crate::monitor::PerformanceTracker;
use crate::risk::{RiskManager, RiskMetrics};
use crate::strategy::{RawSignal, SignalEvaluator};

/// Single-owner engine over a market gateway
///
/// Risk state, open positions and performance are only touched from
/// `&mut self`. Gateway push updates go through one bounded queue that the
/// run loop drains between polling iterations, so a push-driven close and a
/// poll-driven close for the same trade never interleave.
pub struct TradingEngine<G: MarketGateway> {
    config: AppConfig,
    gateway: Arc<G>,
    evaluator: SignalEvaluator,
    risk: RiskManager,
    positions: PositionManager<G>,
    performance: PerformanceTracker,
    /// Latest candle each symbol was evaluated on
    last_evaluated_bar: HashMap<String, DateTime<Utc>>,
    events_tx: mpsc::Sender<GatewayEvent>,
    events_rx: Option<mpsc::Receiver<GatewayEvent>>,
    timeout: Duration,
}

impl<G: MarketGateway + 'static> TradingEngine<G> {
    /// Build an engine; fails with `Configuration` on invalid parameters
    pub fn new(config: AppConfig, gateway: Arc<G>) -> Result<Self> {
        config.validate()?;

        let (events_tx, events_rx) =
            create_event_channel_with_size(config.engine.event_channel_size);
        let timeout = Duration::from_secs(config.engine.request_timeout_seconds);

        Ok(Self {
            evaluator: SignalEvaluator::new(config.strategy.clone()),
            risk: RiskManager::new(config.risk.clone(), Decimal::ZERO),
            positions: PositionManager::new(gateway.clone(), events_tx.clone(), timeout),
            performance: PerformanceTracker::new(),
            last_evaluated_bar: HashMap::new(),
            events_tx,
            events_rx: Some(events_rx),
            timeout,
            gateway,
            config,
        })
    }

    /// Fetch the balance and subscribe to every enabled symbol
    #[instrument(skip(self))]
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing engine on {}", self.gateway.venue_name());
        self.refresh_balance().await?;

        let symbols: Vec<String> = self
            .config
            .enabled_symbols()
            .iter()
            .map(|s| s.symbol.clone())
            .collect();
        for symbol in &symbols {
            with_timeout(
                self.timeout,
                "subscribe_price",
                self.gateway.subscribe_price(symbol, self.events_tx.clone()),
            )
            .await?;
        }
        info!("Subscribed to {} symbols", symbols.len());
        Ok(())
    }

    async fn refresh_balance(&mut self) -> Result<Decimal> {
        let balance = with_timeout(self.timeout, "get_balance", self.gateway.get_balance()).await?;
        self.risk.set_balance(balance.amount);
        debug!(balance = %balance.amount, currency = %balance.currency, "Balance updated");
        Ok(balance.amount)
    }

    fn symbol_config(&self, symbol: &str) -> SymbolConfig {
        self.config
            .symbol(symbol)
            .cloned()
            .unwrap_or_else(|| SymbolConfig::new(symbol))
    }

    async fn fetch_candles(&self, symbol: &str) -> Result<Vec<Bar>> {
        with_timeout(
            self.timeout,
            "get_candles",
            self.gateway.get_candles(
                symbol,
                self.evaluator.history_len(),
                self.config.engine.candle_granularity_seconds,
                None,
            ),
        )
        .await
    }

    fn evaluate_bars(&self, symbol: &str, bars: &[Bar]) -> Result<Option<RawSignal>> {
        let duration = self.symbol_config(symbol).contract_duration();
        match self.evaluator.evaluate(symbol, bars, duration) {
            Ok(signal) => Ok(signal),
            Err(EngineError::DataUnavailable { have, need, .. }) => {
                debug!(have, need, "Not enough history, skipping");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Signal for the latest candles of `symbol`, if any trigger fires
    ///
    /// Short history is not an error here: it yields `None`.
    #[instrument(skip(self))]
    pub async fn evaluate_symbol(&mut self, symbol: &str) -> Result<Option<RawSignal>> {
        let bars = self.fetch_candles(symbol).await?;
        self.evaluate_bars(symbol, &bars)
    }

    /// Evaluate, gate, size and open for one symbol
    ///
    /// Each candle is evaluated once; passes that see no new candle do nothing.
    /// A gateway failure while opening leaves the candle eligible for the
    /// next pass.
    async fn trade_symbol(
        &mut self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Position>> {
        let bars = self.fetch_candles(symbol).await?;
        let Some(latest) = bars.iter().map(|b| b.timestamp).max() else {
            return Ok(None);
        };
        if self.last_evaluated_bar.get(symbol) == Some(&latest) {
            debug!(symbol, %latest, "No new candle");
            return Ok(None);
        }
        self.last_evaluated_bar.insert(symbol.to_string(), latest);

        let signal = match self.evaluate_bars(symbol, &bars)? {
            Some(signal) => signal,
            None => return Ok(None),
        };
        info!(
            symbol,
            direction = %signal.direction,
            trigger = %signal.trigger,
            entry_price = signal.entry_price,
            "Signal generated"
        );

        let stake_hint = self.symbol_config(symbol).stake_amount;
        let validated = match self.risk.validate_signal(signal, stake_hint, now) {
            Ok(validated) => validated,
            Err(EngineError::Validation(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let sized = self.risk.calculate_position_size(validated);
        if sized.stake() <= Decimal::ZERO {
            warn!(symbol, "Computed stake is zero, skipping");
            return Ok(None);
        }

        let position = match self.positions.open(&sized, now).await {
            Ok(position) => position,
            Err(e) => {
                if e.is_gateway() {
                    self.last_evaluated_bar.remove(symbol);
                }
                return Err(e);
            }
        };
        self.risk.add_position(&position.trade_id, position.exposure())?;
        Ok(Some(position))
    }

    /// One polling pass: every enabled symbol, then every open position
    ///
    /// A gateway failure abandons the rest of the pass.
    pub async fn run_iteration(&mut self, now: DateTime<Utc>) -> Result<()> {
        let symbols: Vec<String> = self
            .config
            .enabled_symbols()
            .iter()
            .map(|s| s.symbol.clone())
            .collect();

        for symbol in &symbols {
            match self.trade_symbol(symbol, now).await {
                Ok(_) => {}
                Err(e) if e.is_gateway() => return Err(e),
                Err(e) => warn!(symbol = %symbol, error = %e, "Symbol skipped"),
            }
        }

        self.check_open_positions(now).await
    }

    /// Poll quotes for open positions and close breached ones
    async fn check_open_positions(&mut self, now: DateTime<Utc>) -> Result<()> {
        let mut symbols: Vec<String> = self
            .positions
            .book()
            .open_positions()
            .values()
            .map(|p| p.symbol.clone())
            .collect();
        symbols.sort();
        symbols.dedup();

        for symbol in symbols {
            let quote =
                with_timeout(self.timeout, "get_price", self.gateway.get_price(&symbol)).await?;
            for (trade_id, reason) in self.positions.breached_by_symbol(&symbol, quote.price) {
                self.close_and_record(&trade_id, reason, now).await?;
            }
        }
        Ok(())
    }

    /// Apply one push update
    pub async fn handle_event(&mut self, event: GatewayEvent) -> Result<()> {
        let now = event.timestamp();
        let breached = match &event {
            GatewayEvent::Price(quote) => {
                self.positions.breached_by_symbol(&quote.symbol, quote.price)
            }
            GatewayEvent::Contract {
                contract_id,
                current_spot,
                ..
            } => self
                .positions
                .breached_by_contract(contract_id, *current_spot)
                .into_iter()
                .collect(),
        };

        for (trade_id, reason) in breached {
            match self.close_and_record(&trade_id, reason, now).await {
                Ok(_) => {}
                Err(e) if e.is_state_conflict() => {
                    debug!(trade_id = %trade_id, "Already closed");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Process every queued push update without waiting
    pub async fn drain_events(&mut self) -> Result<usize> {
        let mut events = self.take_receiver()?;
        let mut handled = 0;
        let mut outcome = Ok(());
        while let Ok(event) = events.try_recv() {
            handled += 1;
            if let Err(e) = self.handle_event(event).await {
                outcome = Err(e);
                break;
            }
        }
        self.events_rx = Some(events);
        outcome.map(|_| handled)
    }

    fn take_receiver(&mut self) -> Result<mpsc::Receiver<GatewayEvent>> {
        self.events_rx
            .take()
            .ok_or_else(|| EngineError::ChannelSend("event receiver already in use".to_string()))
    }

    /// Close an open position on request
    pub async fn close_position(
        &mut self,
        trade_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TradeRecord> {
        self.close_and_record(trade_id, ExitReason::Manual, now).await
    }

    /// Close through the gateway, then reconcile risk and performance
    async fn close_and_record(
        &mut self,
        trade_id: &str,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Result<TradeRecord> {
        let record = self.positions.close(trade_id, reason, now).await?;

        if let Err(e) = self.risk.record_trade_result(trade_id, record.profit_loss, now) {
            error!(trade_id, error = %e, "Risk state out of sync with position book");
        }
        if let Err(e) = self.refresh_balance().await {
            warn!(error = %e, "Balance refresh failed, applying P/L locally");
            self.risk.apply_pnl(record.profit_loss);
        }

        self.performance.record_trade(record.clone());
        Ok(record)
    }

    /// Run until `shutdown` resolves
    ///
    /// Polls every `iteration_delay_seconds` and handles push updates in
    /// between. Failed iterations are logged and retried on the next tick.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut events = self.take_receiver()?;
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.config.engine.iteration_delay_seconds));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("Engine started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_iteration(Utc::now()).await {
                        warn!(error = %e, "Iteration abandoned");
                    }
                }
                Some(event) = events.recv() => {
                    if let Err(e) = self.handle_event(event).await {
                        warn!(error = %e, "Event handling failed");
                    }
                }
            }
        }

        self.events_rx = Some(events);
        self.performance.log_summary();
        Ok(())
    }

    /// Sender feeding the engine's event queue
    pub fn event_sender(&self) -> mpsc::Sender<GatewayEvent> {
        self.events_tx.clone()
    }

    pub fn open_positions(&self) -> &BTreeMap<String, Position> {
        self.positions.book().open_positions()
    }

    pub fn trade_history(&self) -> &[TradeRecord] {
        self.positions.book().history()
    }

    pub fn risk_metrics(&mut self, now: DateTime<Utc>) -> RiskMetrics {
        self.risk.risk_metrics(now)
    }

    pub fn performance(&self) -> &PerformanceTracker {
        &self.performance
    }
}
