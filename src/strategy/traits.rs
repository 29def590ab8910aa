use crate::indicators::IndicatorSnapshot;
use crate::strategy::types::Decision;

/// Core strategy trait
///
/// Strategies read the previous and current indicator rows and emit at most
/// one Go decision per cycle.
///
/// # Implementation Notes
///
/// - `evaluate` must be pure: no I/O, no clock reads
/// - The same inputs must always produce the same decision, since live and
///   replay runs share it
/// - Sizing and risk checks happen afterwards in the risk manager
pub trait Strategy: Send + Sync {
    /// Unique identifier for this strategy
    fn name(&self) -> &str;

    /// Called once per symbol per cycle
    ///
    /// # Arguments
    /// * `symbol` - Instrument being evaluated
    /// * `previous` - Indicator row for the bar before `current`
    /// * `current` - Indicator row for the latest bar
    ///
    /// # Returns
    /// * `Decision::NoGo` - No action
    /// * `Decision::Go(signal)` - Candidate trade for the risk gate
    fn evaluate(
        &self,
        symbol: &str,
        previous: &IndicatorSnapshot,
        current: &IndicatorSnapshot,
    ) -> Decision;
}

/// Boxed strategy for dynamic dispatch
pub type BoxedStrategy = Box<dyn Strategy>;
