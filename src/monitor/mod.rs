//! Performance monitoring

mod performance;

pub use performance::{PerformanceMetrics, PerformanceTracker, SymbolStats};
