//! Indicator Engine
//!
//! Computes moving averages, RSI, ATR, volatility, momentum and mean-distance
//! over an ordered bar window. Short windows produce NaN-bearing rows; use
//! [`IndicatorEngine::latest_pair`] to get the last two rows only once the
//! window is long enough to trust them.

pub mod series;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::errors::{EngineError, Result};
use crate::common::types::Bar;
use crate::config::StrategyConfig;

/// Indicator values for one bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub sma_short: f64,
    pub sma_medium: f64,
    pub sma_long: f64,
    pub ema_short: f64,
    pub ema_medium: f64,
    pub ema_long: f64,
    pub rsi: f64,
    pub atr: f64,
    /// Rolling std-dev of simple returns
    pub volatility: f64,
    /// Close difference over the lookback
    pub momentum: f64,
    /// Percentage change over the lookback
    pub pct_change: f64,
    /// (close - ema_medium) / ema_medium
    pub mean_distance: f64,
}

impl IndicatorSnapshot {
    /// Whether every value the arbiter reads is finite
    pub fn is_complete(&self) -> bool {
        [
            self.close,
            self.ema_short,
            self.ema_medium,
            self.rsi,
            self.atr,
            self.volatility,
            self.momentum,
            self.pct_change,
            self.mean_distance,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Computes indicator rows from bar windows
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: StrategyConfig,
}

impl IndicatorEngine {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    /// Bars required before the last row is trusted
    pub fn min_bars(&self) -> usize {
        self.config.min_bars()
    }

    /// Bars to fetch or replay per evaluation
    pub fn history_len(&self) -> usize {
        self.config.history_len()
    }

    /// One row per bar, NaN where a window is not yet full
    pub fn compute(&self, bars: &[Bar]) -> Vec<IndicatorSnapshot> {
        let cfg = &self.config;
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();

        let sma_short = series::sma(&closes, cfg.short_window);
        let sma_medium = series::sma(&closes, cfg.medium_window);
        let sma_long = series::sma(&closes, cfg.long_window);
        let ema_short = series::ema(&closes, cfg.short_window);
        let ema_medium = series::ema(&closes, cfg.medium_window);
        let ema_long = series::ema(&closes, cfg.long_window);
        let rsi = series::rsi(&closes, cfg.rsi_period);
        let atr = series::atr(&highs, &lows, &closes, cfg.atr_period);
        let returns = series::pct_change(&closes, 1);
        let volatility = series::rolling_std(&returns, cfg.volatility_window);
        let momentum = series::diff(&closes, cfg.price_action_lookback);
        let pct_change = series::pct_change(&closes, cfg.price_action_lookback);

        bars.iter()
            .enumerate()
            .map(|(i, bar)| IndicatorSnapshot {
                timestamp: bar.timestamp,
                close: bar.close,
                sma_short: sma_short[i],
                sma_medium: sma_medium[i],
                sma_long: sma_long[i],
                ema_short: ema_short[i],
                ema_medium: ema_medium[i],
                ema_long: ema_long[i],
                rsi: rsi[i],
                atr: atr[i],
                volatility: volatility[i],
                momentum: momentum[i],
                pct_change: pct_change[i],
                mean_distance: (bar.close - ema_medium[i]) / ema_medium[i],
            })
            .collect()
    }

    /// Previous and current rows for the last bar of `bars`
    ///
    /// Fails with `DataUnavailable` when fewer than `min_bars` bars are given.
    pub fn latest_pair(
        &self,
        symbol: &str,
        bars: &[Bar],
    ) -> Result<(IndicatorSnapshot, IndicatorSnapshot)> {
        let need = self.min_bars().max(2);
        if bars.len() < need {
            return Err(EngineError::DataUnavailable {
                symbol: symbol.to_string(),
                have: bars.len(),
                need,
            });
        }

        let rows = self.compute(bars);
        match rows.as_slice() {
            [.., previous, current] => Ok((*previous, *current)),
            _ => Err(EngineError::DataUnavailable {
                symbol: symbol.to_string(),
                have: rows.len(),
                need,
            }),
        }
    }
}
