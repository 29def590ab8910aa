//! Risk management
//!
//! [`RiskManager`] owns the account state (balance, daily loss, open
//! exposure) and is the only place signals become [`ValidatedSignal`]s and
//! [`SizedSignal`]s.
//!
//! [`ValidatedSignal`]: crate::strategy::ValidatedSignal
//! [`SizedSignal`]: crate::strategy::SizedSignal

mod manager;
mod size_calculator;

pub(crate) use manager::check_levels;
pub use manager::{DailyStats, Exposure, RiskManager, RiskMetrics, RiskState};
pub use size_calculator::{
    BoxedSizeCalculator, ComputedSize, SizeCalculator, VolatilityTier, VolatilityTierSizer,
};
