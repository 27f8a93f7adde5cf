//! Performance summary over a finished simulation run.

use chrono::NaiveDate;

use super::ledger::Ledger;
use super::position::PositionState;

/// Still-open position marked to the final trading day's close.
#[derive(Debug, Clone)]
pub struct OpenPositionMark {
    pub ticker: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub quantity: i64,
    pub last_close: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_pct: f64,
    pub state: PositionState,
    pub overnight_charges: f64,
    pub days_held: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSummary {
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_pnl: f64,
    pub total_pnl_pct: f64,
    pub closed_trades: usize,
    pub open_trades: usize,
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub loss_rate: f64,
    pub avg_win: f64,
    pub max_win: f64,
    pub avg_loss: f64,
    pub max_loss: f64,
    pub avg_holding_days: f64,
    pub total_transaction_charges: f64,
    pub total_overnight_charges: f64,
}

impl SimulationSummary {
    pub fn compute(ledger: &Ledger, marks: &[OpenPositionMark]) -> Self {
        let realized_pnl = ledger.realized_pnl();
        let unrealized_pnl: f64 = marks.iter().map(|m| m.unrealized_pnl).sum();
        let total_pnl = realized_pnl + unrealized_pnl;
        let total_pnl_pct = if ledger.initial_capital > 0.0 {
            total_pnl / ledger.initial_capital * 100.0
        } else {
            0.0
        };

        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut max_win = 0.0_f64;
        let mut max_loss = 0.0_f64;
        let mut total_holding_days = 0i64;

        for trade in &ledger.closed_trades {
            if trade.pnl > 0.0 {
                wins += 1;
                total_wins += trade.pnl;
                if trade.pnl > max_win {
                    max_win = trade.pnl;
                }
            } else if trade.pnl < 0.0 {
                losses += 1;
                total_losses += trade.pnl.abs();
                if trade.pnl.abs() > max_loss {
                    max_loss = trade.pnl.abs();
                }
            }
            total_holding_days += trade.holding_days;
        }

        let closed = ledger.closed_trades.len();
        let win_rate = if closed > 0 {
            wins as f64 / closed as f64
        } else {
            0.0
        };
        let loss_rate = if closed > 0 {
            losses as f64 / closed as f64
        } else {
            0.0
        };
        let avg_win = if wins > 0 { total_wins / wins as f64 } else { 0.0 };
        let avg_loss = if losses > 0 {
            total_losses / losses as f64
        } else {
            0.0
        };
        let avg_holding_days = if closed > 0 {
            total_holding_days as f64 / closed as f64
        } else {
            0.0
        };

        SimulationSummary {
            realized_pnl,
            unrealized_pnl,
            total_pnl,
            total_pnl_pct,
            closed_trades: closed,
            open_trades: marks.len(),
            total_trades: closed + marks.len(),
            wins,
            losses,
            win_rate,
            loss_rate,
            avg_win,
            max_win,
            avg_loss,
            max_loss,
            avg_holding_days,
            total_transaction_charges: ledger.total_transaction_charges,
            total_overnight_charges: ledger.total_overnight_charges,
        }
    }
}
