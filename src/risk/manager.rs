//! Risk manager: trading gate, signal validation and stake sizing

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::common::errors::{EngineError, RejectReason, Result};
use crate::common::types::Direction;
use crate::config::RiskConfig;
use crate::risk::size_calculator::{BoxedSizeCalculator, SizeCalculator, VolatilityTierSizer};
use crate::strategy::{RawSignal, SizedSignal, ValidatedSignal};

/// Capital at risk for one open position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub stake: Decimal,
}

impl Exposure {
    /// |entry − stop| × stake
    pub fn risk_amount(&self) -> Decimal {
        let distance = (self.entry_price - self.stop_loss).abs();
        Decimal::from_f64(distance).unwrap_or_default() * self.stake
    }
}

/// Per-day counters, reset lazily on date rollover
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    /// Date the counters belong to; unset until first access
    pub date: Option<NaiveDate>,
    /// Sum of |P/L| over losing trades; never decreases within a day
    pub daily_loss: Decimal,
    pub daily_trades: u32,
}

/// Mutable account state owned by the risk manager
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskState {
    pub balance: Decimal,
    pub daily: DailyStats,
    pub open_positions: HashMap<String, Exposure>,
}

/// Snapshot reported to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub balance: Decimal,
    pub daily_loss: Decimal,
    pub daily_trades: u32,
    pub open_positions: usize,
    /// Σ |entry − stop| × stake
    pub open_risk: Decimal,
    /// open_risk ÷ balance
    pub open_risk_pct: Decimal,
    /// max_risk × balance − open_risk
    pub available_risk: Decimal,
}

/// Stateful risk gate and sizing authority
///
/// Owned by a single decision loop; every mutating method takes `&mut self`
/// and an explicit `now` so replays never read the wall clock.
pub struct RiskManager {
    config: RiskConfig,
    sizer: BoxedSizeCalculator,
    state: RiskState,
}

impl RiskManager {
    pub fn new(config: RiskConfig, initial_balance: Decimal) -> Self {
        let sizer = Box::new(VolatilityTierSizer::new(
            config.risk_per_trade,
            config.min_volatility,
            config.max_volatility,
        ));
        Self::with_sizer(config, initial_balance, sizer)
    }

    pub fn with_sizer(
        config: RiskConfig,
        initial_balance: Decimal,
        sizer: BoxedSizeCalculator,
    ) -> Self {
        Self {
            config,
            sizer,
            state: RiskState {
                balance: initial_balance,
                ..RiskState::default()
            },
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn balance(&self) -> Decimal {
        self.state.balance
    }

    /// Replace the balance with a gateway-reported amount
    pub fn set_balance(&mut self, balance: Decimal) {
        self.state.balance = balance;
    }

    /// Apply a realized P/L to the local balance
    pub fn apply_pnl(&mut self, pnl: Decimal) {
        self.state.balance += pnl;
    }

    pub fn open_position_count(&self) -> usize {
        self.state.open_positions.len()
    }

    /// Reset the daily counters once per calendar-day rollover
    fn roll_day(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        match self.state.daily.date {
            None => self.state.daily.date = Some(today),
            Some(date) if today > date => {
                info!(
                    %date,
                    daily_loss = %self.state.daily.daily_loss,
                    daily_trades = self.state.daily.daily_trades,
                    "Resetting daily risk stats"
                );
                self.state.daily = DailyStats {
                    date: Some(today),
                    ..DailyStats::default()
                };
            }
            Some(_) => {}
        }
    }

    fn check_can_trade(&mut self, now: DateTime<Utc>) -> std::result::Result<(), RejectReason> {
        self.roll_day(now);

        if self.state.balance <= Decimal::ZERO {
            return Err(RejectReason::InsufficientBalance);
        }

        let limit = self.state.balance * self.config.max_daily_loss;
        if self.state.daily.daily_loss >= limit {
            return Err(RejectReason::DailyLossLimit {
                daily_loss: self.state.daily.daily_loss,
                limit,
            });
        }

        let open = self.state.open_positions.len();
        if open >= self.config.max_open_trades {
            return Err(RejectReason::MaxOpenPositions {
                open,
                max: self.config.max_open_trades,
            });
        }
        Ok(())
    }

    /// Whether any new position may be opened at `now`
    pub fn can_trade(&mut self, now: DateTime<Utc>) -> bool {
        match self.check_can_trade(now) {
            Ok(()) => true,
            Err(reason) => {
                warn!(%reason, "Trading not allowed");
                false
            }
        }
    }

    /// Run the risk gate on a raw signal
    ///
    /// `stake_hint` is the symbol's configured stake, used for the
    /// projected-loss check.
    pub fn validate_signal(
        &mut self,
        signal: RawSignal,
        stake_hint: Decimal,
        now: DateTime<Utc>,
    ) -> Result<ValidatedSignal> {
        match self.check_signal(&signal, stake_hint, now) {
            Ok(()) => Ok(ValidatedSignal::new(signal)),
            Err(reason) => {
                warn!(symbol = %signal.symbol, direction = %signal.direction, %reason, "Signal rejected");
                Err(EngineError::Validation(reason))
            }
        }
    }

    fn check_signal(
        &mut self,
        signal: &RawSignal,
        stake_hint: Decimal,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), RejectReason> {
        self.check_can_trade(now)?;

        if !self.config.is_trading_allowed(&now) {
            return Err(RejectReason::OutsideTradingHours);
        }

        check_levels(
            signal.direction,
            signal.entry_price,
            signal.stop_loss,
            signal.take_profit,
        )?;

        let volatility = signal.volatility();
        if !volatility.is_finite() {
            return Err(RejectReason::InvalidField("volatility"));
        }
        if volatility < self.config.min_volatility || volatility > self.config.max_volatility {
            return Err(RejectReason::VolatilityOutOfRange {
                volatility,
                min: self.config.min_volatility,
                max: self.config.max_volatility,
            });
        }

        let distance = Decimal::from_f64(signal.stop_distance())
            .ok_or(RejectReason::InvalidField("stop_loss"))?;
        let adjusted_stake = stake_hint * self.sizer.tier(volatility).multiplier();
        let projected = distance * adjusted_stake;
        let allowed = self.state.balance * self.config.risk_per_trade;
        if projected > allowed {
            return Err(RejectReason::RiskTooHigh { projected, allowed });
        }
        Ok(())
    }

    /// Stake for a validated signal
    pub fn calculate_position_size(&self, validated: ValidatedSignal) -> SizedSignal {
        let signal = validated.signal();
        let size = self
            .sizer
            .size(self.state.balance, signal.stop_distance(), signal.volatility());

        info!(
            symbol = %signal.symbol,
            sizer = self.sizer.name(),
            base = %size.base,
            stake = %size.stake,
            tier = ?size.tier,
            "Position sized"
        );
        SizedSignal::new(validated, size.stake, size.base)
    }

    /// Track a newly opened position
    pub fn add_position(&mut self, trade_id: &str, exposure: Exposure) -> Result<()> {
        if self.state.open_positions.contains_key(trade_id) {
            return Err(EngineError::DuplicatePosition(trade_id.to_string()));
        }
        self.state.open_positions.insert(trade_id.to_string(), exposure);
        Ok(())
    }

    /// Book a confirmed close
    ///
    /// Losses accumulate into the daily loss; the balance is adjusted
    /// separately via [`set_balance`](Self::set_balance) or
    /// [`apply_pnl`](Self::apply_pnl).
    pub fn record_trade_result(
        &mut self,
        trade_id: &str,
        pnl: Decimal,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.roll_day(now);

        if self.state.open_positions.remove(trade_id).is_none() {
            return Err(EngineError::PositionNotFound(trade_id.to_string()));
        }

        if pnl < Decimal::ZERO {
            self.state.daily.daily_loss += pnl.abs();
        }
        self.state.daily.daily_trades += 1;
        Ok(())
    }

    pub fn risk_metrics(&mut self, now: DateTime<Utc>) -> RiskMetrics {
        self.roll_day(now);

        let balance = self.state.balance;
        let open_risk: Decimal = self
            .state
            .open_positions
            .values()
            .map(Exposure::risk_amount)
            .sum();
        let open_risk_pct = if balance > Decimal::ZERO {
            open_risk / balance
        } else {
            Decimal::ZERO
        };

        RiskMetrics {
            balance,
            daily_loss: self.state.daily.daily_loss,
            daily_trades: self.state.daily.daily_trades,
            open_positions: self.state.open_positions.len(),
            open_risk,
            open_risk_pct,
            available_risk: self.config.max_risk * balance - open_risk,
        }
    }
}

impl std::fmt::Debug for RiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskManager")
            .field("config", &self.config)
            .field("sizer", &self.sizer.name())
            .field("state", &self.state)
            .finish()
    }
}

/// Prices must be finite, positive and on the correct side of entry
pub(crate) fn check_levels(
    direction: Direction,
    entry_price: f64,
    stop_loss: f64,
    take_profit: f64,
) -> std::result::Result<(), RejectReason> {
    for (name, value) in [
        ("entry_price", entry_price),
        ("stop_loss", stop_loss),
        ("take_profit", take_profit),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(RejectReason::InvalidField(name));
        }
    }

    let ordered = match direction {
        Direction::Call => stop_loss < entry_price && entry_price < take_profit,
        Direction::Put => take_profit < entry_price && entry_price < stop_loss,
    };
    if !ordered {
        return Err(RejectReason::InvalidField("stop_loss"));
    }
    Ok(())
}
