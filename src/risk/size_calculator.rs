use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Decimal places kept on computed stakes
const STAKE_DECIMALS: u32 = 2;

/// Volatility regime relative to the configured bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityTier {
    /// Below `min_volatility`
    Low,
    Normal,
    /// Above `max_volatility`
    High,
}

impl VolatilityTier {
    /// Stake multiplier; never above 1
    pub fn multiplier(&self) -> Decimal {
        match self {
            VolatilityTier::Low => dec!(0.5),
            VolatilityTier::Normal => Decimal::ONE,
            VolatilityTier::High => dec!(0.25),
        }
    }
}

/// Stake computed for one signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputedSize {
    /// balance × risk_per_trade ÷ |entry − stop|
    pub base: Decimal,
    pub tier: VolatilityTier,
    /// Base scaled by the tier multiplier
    pub stake: Decimal,
}

impl ComputedSize {
    fn zero(tier: VolatilityTier) -> Self {
        Self {
            base: Decimal::ZERO,
            tier,
            stake: Decimal::ZERO,
        }
    }
}

/// SizeCalculator trait
///
/// Converts a risk budget into a stake for a stop distance.
///
/// # Responsibilities
///
/// - Keep the loss at the stop within balance × risk_per_trade
/// - Scale down (never up) in abnormal volatility
pub trait SizeCalculator: Send + Sync {
    /// Volatility tier used for scaling
    fn tier(&self, volatility: f64) -> VolatilityTier;

    /// Stake for a signal with the given stop distance and volatility
    fn size(&self, balance: Decimal, stop_distance: f64, volatility: f64) -> ComputedSize;

    /// Sizer name for logging
    fn name(&self) -> &str;
}

/// Fixed-fraction sizer with volatility tiers
///
/// # Formula
/// ```text
/// base  = balance * risk_per_trade / |entry - stop|
/// stake = base * 0.5   if volatility < min_volatility
///         base * 0.25  if volatility > max_volatility
///         base         otherwise
/// ```
///
/// Stakes are truncated to cents, so rounding never pushes them over base.
#[derive(Debug, Clone)]
pub struct VolatilityTierSizer {
    risk_per_trade: Decimal,
    min_volatility: f64,
    max_volatility: f64,
}

impl VolatilityTierSizer {
    pub fn new(risk_per_trade: Decimal, min_volatility: f64, max_volatility: f64) -> Self {
        Self {
            risk_per_trade,
            min_volatility,
            max_volatility,
        }
    }
}

impl SizeCalculator for VolatilityTierSizer {
    fn tier(&self, volatility: f64) -> VolatilityTier {
        if volatility < self.min_volatility {
            VolatilityTier::Low
        } else if volatility > self.max_volatility {
            VolatilityTier::High
        } else {
            VolatilityTier::Normal
        }
    }

    fn size(&self, balance: Decimal, stop_distance: f64, volatility: f64) -> ComputedSize {
        let tier = self.tier(volatility);

        let distance = match Decimal::from_f64(stop_distance) {
            Some(d) if d > Decimal::ZERO => d,
            _ => return ComputedSize::zero(tier),
        };
        if balance <= Decimal::ZERO {
            return ComputedSize::zero(tier);
        }

        let base = balance * self.risk_per_trade / distance;
        let stake = (base * tier.multiplier())
            .round_dp_with_strategy(STAKE_DECIMALS, RoundingStrategy::ToZero);

        ComputedSize { base, tier, stake }
    }

    fn name(&self) -> &str {
        "volatility_tier"
    }
}

/// Boxed size calculator for dynamic dispatch
pub type BoxedSizeCalculator = Box<dyn SizeCalculator>;
