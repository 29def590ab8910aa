//! Position lifecycle
//!
//! Proposed → Open → Closed. [`PositionManager`] drives it through a live
//! gateway; [`SimulatedExecutor`] is the in-memory substitute used for
//! replays. Both close through [`PositionBook`], which makes a repeated
//! close on the same trade id fail with `PositionNotFound`.

mod book;
mod manager;
mod position;
mod simulated;

pub use book::PositionBook;
pub use manager::PositionManager;
pub use position::{simulated_pnl, ExitReason, Position, PositionStatus, TradeRecord};
pub use simulated::SimulatedExecutor;
