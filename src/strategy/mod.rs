//! Strategy module for trade decision making
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PER CYCLE (sync, pure)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Bar window                                                 │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  IndicatorEngine → (previous, current) rows                 │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  Strategy.evaluate() → NoGo / Go(RawSignal)                 │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    RISK GATE                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RawSignal → ValidatedSignal → SizedSignal                  │
//! │  (only the risk manager can build the later stages)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`Strategy`]: Trait for implementing trading strategies
//! - [`SignalArbiter`]: Crossover / mean-reversion / momentum arbiter
//! - [`SignalEvaluator`]: Indicator engine plus a boxed strategy
//! - [`Decision`]: Go/NoGo enum returned by strategies

mod arbiter;
mod evaluator;
mod traits;
mod types;

pub use arbiter::SignalArbiter;
pub use evaluator::SignalEvaluator;
pub use traits::{BoxedStrategy, Strategy};
pub use types::{Decision, RawSignal, SizedSignal, Trigger, ValidatedSignal};
