//! Historical replay through the same evaluator, risk manager and
//! position rules used live, with a simulated executor in place of the
//! gateway order path.

mod engine;

pub use engine::{BacktestEngine, BacktestReport};
