//! Indicator computation plus strategy evaluation over a bar window
//!
//! Shared by the live engine and the backtester so both run one decision core.

use tracing::debug;

use crate::common::errors::Result;
use crate::common::types::{Bar, ContractDuration};
use crate::config::StrategyConfig;
use crate::indicators::IndicatorEngine;
use crate::strategy::arbiter::SignalArbiter;
use crate::strategy::traits::BoxedStrategy;
use crate::strategy::types::RawSignal;

pub struct SignalEvaluator {
    indicators: IndicatorEngine,
    strategy: BoxedStrategy,
}

impl SignalEvaluator {
    /// Evaluator backed by the default [`SignalArbiter`]
    pub fn new(config: StrategyConfig) -> Self {
        let strategy = Box::new(SignalArbiter::new(config.clone()));
        Self::with_strategy(config, strategy)
    }

    pub fn with_strategy(config: StrategyConfig, strategy: BoxedStrategy) -> Self {
        Self {
            indicators: IndicatorEngine::new(config),
            strategy,
        }
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Bars per evaluation window
    pub fn history_len(&self) -> usize {
        self.indicators.history_len()
    }

    /// Signal for the last bar of `bars`, if any trigger fires
    ///
    /// Returns `DataUnavailable` when the window is too short.
    pub fn evaluate(
        &self,
        symbol: &str,
        bars: &[Bar],
        duration: ContractDuration,
    ) -> Result<Option<RawSignal>> {
        let (previous, current) = self.indicators.latest_pair(symbol, bars)?;
        let signal = self
            .strategy
            .evaluate(symbol, &previous, &current)
            .into_signal()
            .map(|signal| signal.with_duration(duration));

        if signal.is_none() {
            debug!(symbol, rsi = current.rsi, "No trigger");
        }
        Ok(signal)
    }
}

impl std::fmt::Debug for SignalEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalEvaluator")
            .field("indicators", &self.indicators)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}
