//! Error types for the engine

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using our EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Why the risk gate refused a signal
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Account balance is zero or negative
    InsufficientBalance,
    /// Daily loss accumulator reached balance × max_daily_loss
    DailyLossLimit { daily_loss: Decimal, limit: Decimal },
    /// Open positions already at the configured maximum
    MaxOpenPositions { open: usize, max: usize },
    /// Timestamp falls outside the trading window or on a non-trading day
    OutsideTradingHours,
    /// A required numeric field is missing, non-finite or inconsistent
    InvalidField(&'static str),
    /// Volatility outside [min_volatility, max_volatility]
    VolatilityOutOfRange { volatility: f64, min: f64, max: f64 },
    /// Projected loss exceeds balance × risk_per_trade
    RiskTooHigh { projected: Decimal, allowed: Decimal },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::InsufficientBalance => write!(f, "insufficient account balance"),
            RejectReason::DailyLossLimit { daily_loss, limit } => {
                write!(f, "daily loss limit reached ({} >= {})", daily_loss, limit)
            }
            RejectReason::MaxOpenPositions { open, max } => {
                write!(f, "maximum open positions reached ({}/{})", open, max)
            }
            RejectReason::OutsideTradingHours => write!(f, "outside allowed trading hours"),
            RejectReason::InvalidField(field) => write!(f, "invalid or missing field: {}", field),
            RejectReason::VolatilityOutOfRange { volatility, min, max } => write!(
                f,
                "volatility {:.6} outside allowed range [{}, {}]",
                volatility, min, max
            ),
            RejectReason::RiskTooHigh { projected, allowed } => {
                write!(f, "risk too high: {} > {}", projected, allowed)
            }
        }
    }
}

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Not enough price history to compute indicators
    #[error("Insufficient data for {symbol}: have {have} bars, need {need}")]
    DataUnavailable {
        symbol: String,
        have: usize,
        need: usize,
    },

    /// No historical data for any requested symbol
    #[error("No historical data available")]
    NoHistoricalData,

    /// Signal dropped by validation or the risk gate
    #[error("Signal rejected: {0}")]
    Validation(RejectReason),

    /// Network, session or protocol failure at the gateway
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Broker refused the order
    #[error("Order rejected by broker: {0}")]
    OrderRejected(String),

    /// Market is not trading for the symbol
    #[error("Market closed: {0}")]
    MarketClosed(String),

    /// Gateway call exceeded the configured timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Close or lookup on a trade id that is not open
    #[error("Position not found: {0}")]
    PositionNotFound(String),

    /// Trade id already tracked as open
    #[error("Duplicate position: {0}")]
    DuplicatePosition(String),

    /// Invalid risk or strategy parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Channel send errors
    #[error("Channel send error: {0}")]
    ChannelSend(String),
}

impl EngineError {
    /// Errors originating at the gateway boundary
    pub fn is_gateway(&self) -> bool {
        matches!(
            self,
            EngineError::Gateway(_)
                | EngineError::OrderRejected(_)
                | EngineError::MarketClosed(_)
                | EngineError::Timeout(_)
        )
    }

    /// Double close, unknown trade id or duplicate open
    pub fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            EngineError::PositionNotFound(_) | EngineError::DuplicatePosition(_)
        )
    }
}

impl From<RejectReason> for EngineError {
    fn from(reason: RejectReason) -> Self {
        EngineError::Validation(reason)
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for EngineError {
    fn from(err: tokio::sync::mpsc::error::SendError<T>) -> Self {
        EngineError::ChannelSend(err.to_string())
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Configuration(err.to_string())
    }
}
