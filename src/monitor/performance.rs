//! Closed-trade statistics

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::execution::TradeRecord;

/// Totals for one symbol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolStats {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub total_profit: Decimal,
    pub total_loss: Decimal,
}

impl SymbolStats {
    pub fn net_pnl(&self) -> Decimal {
        self.total_profit - self.total_loss
    }
}

/// Summary over every recorded trade
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Winning trades ÷ total trades
    pub win_rate: Decimal,
    /// Sum of winning P/L
    pub total_profit: Decimal,
    /// Sum of |losing P/L|
    pub total_loss: Decimal,
    pub net_pnl: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    /// avg_win ÷ avg_loss, 0 without losses
    pub risk_reward: Decimal,
    /// total_profit ÷ total_loss, 0 without losses
    pub profit_factor: Decimal,
    /// Largest peak-to-trough fall of cumulative P/L
    pub max_drawdown: Decimal,
    pub by_symbol: BTreeMap<String, SymbolStats>,
}

fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Aggregates closed trades; shared by live and replay runs
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    trades: Vec<TradeRecord>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_trade(&mut self, trade: TradeRecord) {
        self.trades.push(trade);
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        let mut metrics = PerformanceMetrics {
            total_trades: self.trades.len(),
            ..PerformanceMetrics::default()
        };

        let mut cumulative = Decimal::ZERO;
        let mut peak = Decimal::ZERO;

        for trade in &self.trades {
            let pnl = trade.profit_loss;
            let stats = metrics.by_symbol.entry(trade.symbol.clone()).or_default();
            stats.total_trades += 1;

            if pnl > Decimal::ZERO {
                metrics.winning_trades += 1;
                metrics.total_profit += pnl;
                stats.winning_trades += 1;
                stats.total_profit += pnl;
            } else if pnl < Decimal::ZERO {
                metrics.losing_trades += 1;
                metrics.total_loss += pnl.abs();
                stats.losing_trades += 1;
                stats.total_loss += pnl.abs();
            }

            cumulative += pnl;
            peak = peak.max(cumulative);
            metrics.max_drawdown = metrics.max_drawdown.max(peak - cumulative);
        }

        metrics.net_pnl = metrics.total_profit - metrics.total_loss;
        metrics.win_rate = ratio(
            Decimal::from(metrics.winning_trades),
            Decimal::from(metrics.total_trades),
        );
        metrics.avg_win = ratio(metrics.total_profit, Decimal::from(metrics.winning_trades));
        metrics.avg_loss = ratio(metrics.total_loss, Decimal::from(metrics.losing_trades));
        metrics.risk_reward = ratio(metrics.avg_win, metrics.avg_loss);
        metrics.profit_factor = ratio(metrics.total_profit, metrics.total_loss);
        metrics
    }

    /// Log a one-line summary
    pub fn log_summary(&self) {
        let m = self.metrics();
        info!(
            trades = m.total_trades,
            win_rate = %m.win_rate.round_dp(4),
            net_pnl = %m.net_pnl,
            max_drawdown = %m.max_drawdown,
            "Performance summary"
        );
    }
}
