//! Signal arbiter over crossover, mean-reversion and momentum triggers

use tracing::debug;

use crate::common::types::{ContractDuration, Direction};
use crate::config::StrategyConfig;
use crate::indicators::IndicatorSnapshot;
use crate::strategy::traits::Strategy;
use crate::strategy::types::{Decision, RawSignal, Trigger};

/// Mid-range RSI bands for the non-crossover triggers
const BULL_MEAN_REVERSION_RSI: (f64, f64) = (25.0, 60.0);
const BULL_MOMENTUM_RSI: (f64, f64) = (35.0, 75.0);
const BEAR_MEAN_REVERSION_RSI: (f64, f64) = (40.0, 75.0);
const BEAR_MOMENTUM_RSI: (f64, f64) = (25.0, 65.0);

/// Fraction of the momentum threshold a percentage change must exceed
const MOMENTUM_FRACTION: f64 = 0.8;
/// Fraction of the volatility threshold required by momentum triggers
const VOLATILITY_FRACTION: f64 = 0.3;

fn within(value: f64, (low, high): (f64, f64)) -> bool {
    value > low && value < high
}

/// Parameter-driven arbiter
///
/// Bullish triggers are checked first (crossover, then mean reversion, then
/// momentum). Bearish triggers are only checked if none of them fire.
#[derive(Debug, Clone)]
pub struct SignalArbiter {
    config: StrategyConfig,
}

impl SignalArbiter {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    fn bullish_trigger(
        &self,
        previous: &IndicatorSnapshot,
        current: &IndicatorSnapshot,
    ) -> Option<Trigger> {
        let cfg = &self.config;

        let crossover = previous.ema_short <= previous.ema_medium
            && current.ema_short > current.ema_medium
            && current.rsi < cfg.rsi_overbought + cfg.rsi_tolerance;
        if crossover {
            return Some(Trigger::Crossover);
        }

        let mean_reversion = cfg.enable_mean_reversion
            && current.mean_distance < -cfg.mean_reversion_distance
            && current.momentum > 0.0
            && within(current.rsi, BULL_MEAN_REVERSION_RSI);
        if mean_reversion {
            return Some(Trigger::MeanReversion);
        }

        let momentum = current.pct_change > cfg.momentum_threshold * MOMENTUM_FRACTION
            && within(current.rsi, BULL_MOMENTUM_RSI)
            && current.volatility > cfg.volatility_threshold * VOLATILITY_FRACTION;
        momentum.then_some(Trigger::Momentum)
    }

    fn bearish_trigger(
        &self,
        previous: &IndicatorSnapshot,
        current: &IndicatorSnapshot,
    ) -> Option<Trigger> {
        let cfg = &self.config;

        let crossover = previous.ema_short >= previous.ema_medium
            && current.ema_short < current.ema_medium
            && current.rsi > cfg.rsi_oversold - cfg.rsi_tolerance;
        if crossover {
            return Some(Trigger::Crossover);
        }

        let mean_reversion = cfg.enable_mean_reversion
            && current.mean_distance > cfg.mean_reversion_distance
            && current.momentum < 0.0
            && within(current.rsi, BEAR_MEAN_REVERSION_RSI);
        if mean_reversion {
            return Some(Trigger::MeanReversion);
        }

        let momentum = current.pct_change < -cfg.momentum_threshold * MOMENTUM_FRACTION
            && within(current.rsi, BEAR_MOMENTUM_RSI)
            && current.volatility > cfg.volatility_threshold * VOLATILITY_FRACTION;
        momentum.then_some(Trigger::Momentum)
    }

    /// Stop and target for an entry, from ATR
    pub fn exit_levels(&self, direction: Direction, entry: f64, atr: f64) -> (f64, f64) {
        let risk = atr * self.config.atr_multiplier;
        let reward = risk * self.config.risk_reward_ratio;
        let sign = direction.sign();
        (entry - sign * risk, entry + sign * reward)
    }
}

impl Strategy for SignalArbiter {
    fn name(&self) -> &str {
        "signal_arbiter"
    }

    fn evaluate(
        &self,
        symbol: &str,
        previous: &IndicatorSnapshot,
        current: &IndicatorSnapshot,
    ) -> Decision {
        if !current.is_complete()
            || !previous.ema_short.is_finite()
            || !previous.ema_medium.is_finite()
        {
            return Decision::NoGo;
        }

        let (direction, trigger) = match self.bullish_trigger(previous, current) {
            Some(trigger) => (Direction::Call, trigger),
            None => match self.bearish_trigger(previous, current) {
                Some(trigger) => (Direction::Put, trigger),
                None => return Decision::NoGo,
            },
        };

        let entry_price = current.close;
        let (stop_loss, take_profit) = self.exit_levels(direction, entry_price, current.atr);

        debug!(
            symbol,
            %direction,
            %trigger,
            entry_price,
            stop_loss,
            take_profit,
            rsi = current.rsi,
            "Trigger fired"
        );

        Decision::Go(RawSignal {
            symbol: symbol.to_string(),
            direction,
            entry_price,
            stop_loss,
            take_profit,
            trigger,
            timestamp: current.timestamp,
            duration: ContractDuration::default(),
            indicators: *current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn snapshot(ema_short: f64, ema_medium: f64, rsi: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
            close: 100.0,
            sma_short: 100.0,
            sma_medium: 100.0,
            sma_long: 100.0,
            ema_short,
            ema_medium,
            ema_long: 100.0,
            rsi,
            atr: 2.0,
            volatility: 0.0,
            momentum: 0.0,
            pct_change: 0.0,
            mean_distance: 0.0,
        }
    }

    fn arbiter(enable_mean_reversion: bool) -> SignalArbiter {
        SignalArbiter::new(StrategyConfig {
            enable_mean_reversion,
            atr_multiplier: 1.5,
            risk_reward_ratio: 2.0,
            ..StrategyConfig::default()
        })
    }

    #[test]
    fn test_clean_crossover_emits_call() {
        let previous = snapshot(99.0, 100.0, 50.0);
        let current = snapshot(101.0, 100.0, 50.0);

        let signal = arbiter(false)
            .evaluate("R_100", &previous, &current)
            .into_signal()
            .unwrap();

        assert_eq!(signal.direction, Direction::Call);
        assert_eq!(signal.trigger, Trigger::Crossover);
        assert_eq!(signal.stop_loss, 100.0 - 2.0 * 1.5);
        assert_eq!(signal.take_profit, 100.0 + 2.0 * 1.5 * 2.0);
    }

    #[test]
    fn test_crossover_rejected_when_rsi_extreme() {
        let previous = snapshot(99.0, 100.0, 50.0);
        let current = snapshot(101.0, 100.0, 81.0);
        assert!(!arbiter(false).evaluate("R_100", &previous, &current).is_go());
    }

    #[test]
    fn test_bearish_crossover_emits_put() {
        let previous = snapshot(101.0, 100.0, 50.0);
        let current = snapshot(99.0, 100.0, 50.0);

        let signal = arbiter(false)
            .evaluate("R_100", &previous, &current)
            .into_signal()
            .unwrap();

        assert_eq!(signal.direction, Direction::Put);
        assert_eq!(signal.stop_loss, 103.0);
        assert_eq!(signal.take_profit, 94.0);
    }

    #[test]
    fn test_bullish_takes_precedence() {
        // crossover up while the bearish mean-reversion conditions also hold
        let previous = snapshot(99.0, 100.0, 50.0);
        let mut current = snapshot(101.0, 100.0, 50.0);
        current.mean_distance = 0.01;
        current.momentum = -1.0;

        let signal = arbiter(true)
            .evaluate("R_100", &previous, &current)
            .into_signal()
            .unwrap();
        assert_eq!(signal.direction, Direction::Call);
    }

    /// Mean-reversion and momentum conditions both hold in `direction`
    fn with_secondary_triggers(
        mut row: IndicatorSnapshot,
        direction: Direction,
    ) -> IndicatorSnapshot {
        let sign = direction.sign();
        row.mean_distance = -0.01 * sign;
        row.momentum = 0.5 * sign;
        row.pct_change = 0.01 * sign;
        row.volatility = 0.01;
        row
    }

    fn trigger_for(
        previous: &IndicatorSnapshot,
        current: &IndicatorSnapshot,
    ) -> (Direction, Trigger) {
        let signal = arbiter(true)
            .evaluate("R_100", previous, current)
            .into_signal()
            .unwrap();
        (signal.direction, signal.trigger)
    }

    #[test]
    fn test_bullish_trigger_order() {
        let previous = snapshot(99.0, 100.0, 50.0);
        let crossing = with_secondary_triggers(snapshot(101.0, 100.0, 50.0), Direction::Call);
        assert_eq!(trigger_for(&previous, &crossing), (Direction::Call, Trigger::Crossover));

        let flat = snapshot(100.0, 100.0, 50.0);
        let no_cross = with_secondary_triggers(snapshot(100.0, 100.0, 50.0), Direction::Call);
        assert_eq!(trigger_for(&flat, &no_cross), (Direction::Call, Trigger::MeanReversion));

        let mut momentum_only = no_cross;
        momentum_only.mean_distance = 0.0;
        assert_eq!(trigger_for(&flat, &momentum_only), (Direction::Call, Trigger::Momentum));
    }

    #[test]
    fn test_bearish_trigger_order() {
        let previous = snapshot(101.0, 100.0, 50.0);
        let crossing = with_secondary_triggers(snapshot(99.0, 100.0, 50.0), Direction::Put);
        assert_eq!(trigger_for(&previous, &crossing), (Direction::Put, Trigger::Crossover));

        let flat = snapshot(100.0, 100.0, 50.0);
        let no_cross = with_secondary_triggers(snapshot(100.0, 100.0, 50.0), Direction::Put);
        assert_eq!(trigger_for(&flat, &no_cross), (Direction::Put, Trigger::MeanReversion));

        let mut momentum_only = no_cross;
        momentum_only.mean_distance = 0.0;
        assert_eq!(trigger_for(&flat, &momentum_only), (Direction::Put, Trigger::Momentum));
    }

    #[test]
    fn test_mean_reversion_toggle() {
        let previous = snapshot(100.0, 100.0, 50.0);
        let mut current = snapshot(100.0, 100.0, 50.0);
        current.mean_distance = -0.01;
        current.momentum = 0.5;

        assert!(!arbiter(false).evaluate("R_100", &previous, &current).is_go());

        let signal = arbiter(true)
            .evaluate("R_100", &previous, &current)
            .into_signal()
            .unwrap();
        assert_eq!(signal.trigger, Trigger::MeanReversion);
        assert_eq!(signal.direction, Direction::Call);
    }

    #[test]
    fn test_momentum_requires_volatility() {
        let previous = snapshot(100.0, 100.0, 50.0);
        let mut current = snapshot(100.0, 100.0, 50.0);
        current.pct_change = -0.01;

        assert!(!arbiter(false).evaluate("R_100", &previous, &current).is_go());

        current.volatility = 0.01;
        let signal = arbiter(false)
            .evaluate("R_100", &previous, &current)
            .into_signal()
            .unwrap();
        assert_eq!(signal.trigger, Trigger::Momentum);
        assert_eq!(signal.direction, Direction::Put);
    }

    #[test]
    fn test_incomplete_row_is_no_go() {
        let previous = snapshot(99.0, 100.0, 50.0);
        let current = snapshot(101.0, 100.0, f64::NAN);
        assert!(!arbiter(false).evaluate("R_100", &previous, &current).is_go());
    }
}
