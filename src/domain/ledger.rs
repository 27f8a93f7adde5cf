//! Simulation ledger: cash, invested capital, open positions and closed
//! trades for one run.

use std::collections::HashMap;

use super::position::{ClosedTrade, OpenPosition};

#[derive(Debug, Clone)]
pub struct Ledger {
    pub cash: f64,
    /// Sum of live position values at entry cost.
    pub invested: f64,
    pub initial_capital: f64,
    pub open_positions: HashMap<String, OpenPosition>,
    pub closed_trades: Vec<ClosedTrade>,
    pub total_transaction_charges: f64,
    pub total_overnight_charges: f64,
    /// Realized price P&L before any charge deductions; the conservation
    /// check is stated against this figure.
    pub gross_realized_pnl: f64,
}

impl Ledger {
    pub fn new(initial_capital: f64) -> Self {
        Ledger {
            cash: initial_capital,
            invested: 0.0,
            initial_capital,
            open_positions: HashMap::new(),
            closed_trades: Vec::new(),
            total_transaction_charges: 0.0,
            total_overnight_charges: 0.0,
            gross_realized_pnl: 0.0,
        }
    }

    pub fn has_position(&self, ticker: &str) -> bool {
        self.open_positions.contains_key(ticker)
    }

    pub fn position(&self, ticker: &str) -> Option<&OpenPosition> {
        self.open_positions.get(ticker)
    }

    pub fn position_count(&self) -> usize {
        self.open_positions.len()
    }

    /// Debit cash and credit invested for a new position; charges go to the
    /// transaction-charge total.
    pub fn admit(&mut self, position: OpenPosition, entry_charges: f64) {
        self.cash -= position.current_value + entry_charges;
        self.invested += position.current_value;
        self.total_transaction_charges += entry_charges;
        self.open_positions
            .insert(position.ticker.clone(), position);
    }

    /// Settle a (full or tranche) exit: proceeds land in cash net of exit
    /// charges, the exiting share of entry value leaves invested, and the
    /// gross price P&L is accumulated for the conservation check.
    pub fn settle_exit(&mut self, proceeds: f64, exit_charges: f64, value_released: f64, gross_pnl: f64) {
        self.cash += proceeds - exit_charges;
        self.invested -= value_released;
        self.total_transaction_charges += exit_charges;
        self.gross_realized_pnl += gross_pnl;
    }

    /// Debit an overnight carrying charge for one position.
    pub fn accrue_overnight(&mut self, charge: f64) {
        self.cash -= charge;
        self.total_overnight_charges += charge;
    }

    pub fn remove_position(&mut self, ticker: &str) -> Option<OpenPosition> {
        self.open_positions.remove(ticker)
    }

    pub fn record_trade(&mut self, trade: ClosedTrade) {
        self.closed_trades.push(trade);
    }

    /// Sum of net closed-trade P&L.
    pub fn realized_pnl(&self) -> f64 {
        self.closed_trades.iter().map(|t| t.pnl).sum()
    }

    /// Capital-conservation residual; must stay within floating tolerance of
    /// zero at every day boundary:
    /// cash + invested + charges − initial − gross realized P&L.
    pub fn conservation_residual(&self) -> f64 {
        self.cash + self.invested + self.total_transaction_charges + self.total_overnight_charges
            - self.initial_capital
            - self.gross_realized_pnl
    }
}
