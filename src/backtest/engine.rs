//! Deterministic historical replay

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument, warn};

use crate::common::errors::{EngineError, Result};
use crate::common::traits::MarketGateway;
use crate::common::types::Bar;
use crate::config::{AppConfig, SymbolConfig};
use crate::execution::{SimulatedExecutor, TradeRecord};
use crate::monitor::{PerformanceMetrics, PerformanceTracker};
use crate::risk::{RiskManager, RiskMetrics};
use crate::strategy::SignalEvaluator;

/// Result of a replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub metrics: PerformanceMetrics,
    pub risk_metrics: RiskMetrics,
    /// Closed trades in close order
    pub trades: Vec<TradeRecord>,
    /// Positions still open when the data ran out
    pub open_at_end: usize,
}

/// Replays historical bars through the live decision core
///
/// Decisions are timestamped with bar times only, and every run starts from
/// fresh risk and position state, so identical inputs give identical trades.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: AppConfig,
}

impl BacktestEngine {
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn symbol_config(&self, symbol: &str) -> SymbolConfig {
        self.config
            .symbol(symbol)
            .cloned()
            .unwrap_or_else(|| SymbolConfig::new(symbol))
    }

    /// Fetch candles between `start` and `end` and replay them
    #[instrument(skip(self, gateway))]
    pub async fn run<G: MarketGateway>(
        &self,
        gateway: &G,
        symbols: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BacktestReport> {
        let mut data = BTreeMap::new();
        for symbol in symbols {
            let bars = self.fetch_history(gateway, symbol, start, end).await?;
            if bars.is_empty() {
                warn!("No historical data for {}", symbol);
                continue;
            }
            info!("Fetched {} bars for {}", bars.len(), symbol);
            data.insert(symbol.clone(), bars);
        }
        self.run_on_bars(data)
    }

    /// Page backwards from `end` in `chunk_size` requests until `start`
    async fn fetch_history<G: MarketGateway>(
        &self,
        gateway: &G,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>> {
        let chunk_size = self.config.backtest.chunk_size;
        let granularity = self.config.engine.candle_granularity_seconds;

        let mut collected: Vec<Bar> = Vec::new();
        let mut cursor = end;
        loop {
            let chunk = gateway
                .get_candles(symbol, chunk_size, granularity, Some(cursor))
                .await?;
            let earliest = match chunk.iter().map(|b| b.timestamp).min() {
                Some(ts) => ts,
                None => break,
            };
            // Pages must move strictly backwards
            if earliest > cursor {
                warn!(symbol, %earliest, %cursor, "Gateway ignored the end bound, stopping");
                break;
            }
            let exhausted = chunk.len() < chunk_size;
            debug!(symbol, count = chunk.len(), %earliest, "Fetched chunk");
            collected.extend(chunk);

            if exhausted || earliest <= start {
                break;
            }
            cursor = earliest - Duration::seconds(1);
        }

        collected.retain(|b| b.timestamp >= start && b.timestamp <= end);
        Ok(normalize(collected))
    }

    /// Replay caller-supplied bars
    ///
    /// Fails with `NoHistoricalData` when every series is empty.
    pub fn run_on_bars(&self, data: BTreeMap<String, Vec<Bar>>) -> Result<BacktestReport> {
        let data: BTreeMap<String, Vec<Bar>> = data
            .into_iter()
            .map(|(symbol, bars)| (symbol, normalize(bars)))
            .filter(|(_, bars)| !bars.is_empty())
            .collect();
        if data.is_empty() {
            return Err(EngineError::NoHistoricalData);
        }

        let evaluator = SignalEvaluator::new(self.config.strategy.clone());
        let history_len = evaluator.history_len();
        let mut risk =
            RiskManager::new(self.config.risk.clone(), self.config.backtest.initial_balance);
        let mut executor = SimulatedExecutor::new("bt");
        let mut tracker = PerformanceTracker::new();

        let timeline: BTreeSet<DateTime<Utc>> = data
            .values()
            .flat_map(|bars| bars.iter().map(|b| b.timestamp))
            .collect();
        let mut cursors: BTreeMap<&str, usize> = BTreeMap::new();
        let mut prices: BTreeMap<&str, f64> = BTreeMap::new();

        info!(
            symbols = data.len(),
            timestamps = timeline.len(),
            "Starting backtest"
        );

        for &ts in &timeline {
            let mut updated = Vec::new();
            for (symbol, bars) in &data {
                let next = cursors.get(symbol.as_str()).map_or(0, |i| i + 1);
                if bars.get(next).map(|b| b.timestamp) == Some(ts) {
                    cursors.insert(symbol.as_str(), next);
                    prices.insert(symbol.as_str(), bars[next].close);
                    updated.push((symbol.as_str(), next));
                }
            }

            for (symbol, index) in updated {
                let bars = &data[symbol];
                let window = &bars[(index + 1).saturating_sub(history_len)..=index];
                let symbol_config = self.symbol_config(symbol);

                let signal =
                    match evaluator.evaluate(symbol, window, symbol_config.contract_duration()) {
                        Ok(Some(signal)) => signal,
                        Ok(None) | Err(EngineError::DataUnavailable { .. }) => continue,
                        Err(e) => return Err(e),
                    };

                let validated =
                    match risk.validate_signal(signal, symbol_config.stake_amount, ts) {
                        Ok(validated) => validated,
                        Err(EngineError::Validation(_)) => continue,
                        Err(e) => return Err(e),
                    };
                let sized = risk.calculate_position_size(validated);
                if sized.stake() <= Decimal::ZERO {
                    continue;
                }

                let position = executor.execute(&sized, ts)?;
                risk.add_position(&position.trade_id, position.exposure())?;
                debug!(
                    trade_id = %position.trade_id,
                    symbol,
                    direction = %position.direction,
                    entry_price = position.entry_price,
                    "Opened simulated position"
                );
            }

            for (&symbol, &price) in &prices {
                for record in executor.close_breached(symbol, price, ts)? {
                    risk.record_trade_result(&record.trade_id, record.profit_loss, ts)?;
                    risk.apply_pnl(record.profit_loss);
                    tracker.record_trade(record);
                }
            }
        }

        let last = timeline
            .iter()
            .next_back()
            .copied()
            .ok_or(EngineError::NoHistoricalData)?;
        let report = BacktestReport {
            metrics: tracker.metrics(),
            risk_metrics: risk.risk_metrics(last),
            trades: tracker.trades().to_vec(),
            open_at_end: executor.book().open_count(),
        };

        tracker.log_summary();
        info!(
            trades = report.trades.len(),
            open_at_end = report.open_at_end,
            balance = %report.risk_metrics.balance,
            "Backtest complete"
        );
        Ok(report)
    }
}

/// Sort by time and keep the first bar per timestamp
fn normalize(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    bars
}
