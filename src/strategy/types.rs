use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::types::{ContractDuration, Direction};
use crate::indicators::IndicatorSnapshot;

/// Trigger condition that produced a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    /// Short EMA crossed the medium EMA
    Crossover,
    /// Close displaced from the medium EMA and turning back
    MeanReversion,
    /// Recent percentage change beyond the momentum threshold
    Momentum,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Crossover => write!(f, "MA Crossover"),
            Trigger::MeanReversion => write!(f, "Mean Reversion"),
            Trigger::Momentum => write!(f, "Momentum"),
        }
    }
}

/// Directional signal emitted by a strategy, not yet risk-checked
///
/// Stop and target are always set together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSignal {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub trigger: Trigger,
    /// Timestamp of the bar that fired the trigger
    pub timestamp: DateTime<Utc>,
    pub duration: ContractDuration,
    /// Indicator row the decision was made on
    pub indicators: IndicatorSnapshot,
}

impl RawSignal {
    pub fn volatility(&self) -> f64 {
        self.indicators.volatility
    }

    pub fn atr(&self) -> f64 {
        self.indicators.atr
    }

    /// |entry - stop|
    pub fn stop_distance(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs()
    }

    pub fn with_duration(mut self, duration: ContractDuration) -> Self {
        self.duration = duration;
        self
    }
}

/// Signal that passed the risk gate
///
/// Only the risk manager constructs these.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSignal {
    signal: RawSignal,
}

impl ValidatedSignal {
    pub(crate) fn new(signal: RawSignal) -> Self {
        Self { signal }
    }

    pub fn signal(&self) -> &RawSignal {
        &self.signal
    }

    pub fn into_inner(self) -> RawSignal {
        self.signal
    }
}

/// Validated signal with a stake attached
#[derive(Debug, Clone, PartialEq)]
pub struct SizedSignal {
    signal: RawSignal,
    stake: Decimal,
    base_stake: Decimal,
}

impl SizedSignal {
    pub(crate) fn new(validated: ValidatedSignal, stake: Decimal, base_stake: Decimal) -> Self {
        Self {
            signal: validated.into_inner(),
            stake,
            base_stake,
        }
    }

    pub fn signal(&self) -> &RawSignal {
        &self.signal
    }

    /// Volatility-adjusted stake
    pub fn stake(&self) -> Decimal {
        self.stake
    }

    /// Stake before volatility scaling
    pub fn base_stake(&self) -> Decimal {
        self.base_stake
    }
}

/// Strategy decision output
#[derive(Debug, Clone)]
pub enum Decision {
    /// No action should be taken
    NoGo,
    /// Trade the signal
    Go(RawSignal),
}

impl Decision {
    /// Returns true if this is a Go decision
    pub fn is_go(&self) -> bool {
        matches!(self, Self::Go(_))
    }

    pub fn into_signal(self) -> Option<RawSignal> {
        match self {
            Self::Go(signal) => Some(signal),
            Self::NoGo => None,
        }
    }
}
