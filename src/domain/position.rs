//! Position lifecycle records: open positions, tranche bookkeeping and
//! closed trades.

use chrono::NaiveDate;
use std::fmt;

use super::td::TrancheExitReason;

/// Tranche split of the original quantity for the scale-out strategy.
pub const TRANCHE1_FRACTION: f64 = 0.30;
pub const TRANCHE2_FRACTION: f64 = 0.45;

/// Lifecycle state of an open position under the tranche engine. Positions
/// managed by the single-shot exit rules stay `Full` until they go `Flat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Full,
    DeRisked,
    Runner,
    Flat,
}

impl PositionState {
    /// Ledger code, 1..=4.
    pub fn code(&self) -> u8 {
        match self {
            PositionState::Full => 1,
            PositionState::DeRisked => 2,
            PositionState::Runner => 3,
            PositionState::Flat => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrancheLabel {
    Tranche1,
    Tranche2,
    Tranche3,
}

impl fmt::Display for TrancheLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            TrancheLabel::Tranche1 => "TRANCHE_1",
            TrancheLabel::Tranche2 => "TRANCHE_2",
            TrancheLabel::Tranche3 => "TRANCHE_3",
        };
        write!(f, "{}", tag)
    }
}

/// Why a trade (or tranche) left the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    KcLowerBreach,
    Fixed2PctSl,
    KcMiddleBreach,
    Ema50DeltaCvdNegative,
    Tranche1(TrancheExitReason),
    Tranche2(TrancheExitReason),
    Tranche3(TrancheExitReason),
    /// Mark-to-market of a still-open position at the end of a run.
    EndOfSimulation,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::KcLowerBreach => write!(f, "KC_LOWER_BREACH"),
            ExitReason::Fixed2PctSl => write!(f, "FIXED_2PCT_SL"),
            ExitReason::KcMiddleBreach => write!(f, "KC_MIDDLE_BREACH"),
            ExitReason::Ema50DeltaCvdNegative => write!(f, "EMA50_DELTA_CVD_NEGATIVE"),
            ExitReason::Tranche1(r) => write!(f, "TRANCHE1_{}", r),
            ExitReason::Tranche2(r) => write!(f, "TRANCHE2_{}", r),
            ExitReason::Tranche3(r) => write!(f, "TRANCHE3_{}", r),
            ExitReason::EndOfSimulation => write!(f, "END_OF_SIMULATION"),
        }
    }
}

/// Entry-time channel levels carried onto every closed trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeltnerLevels {
    pub lower: f64,
    pub middle: f64,
    pub upper: f64,
}

/// Record of one realized tranche exit on a still-open position.
#[derive(Debug, Clone)]
pub struct TrancheExit {
    pub date: NaiveDate,
    pub price: f64,
    pub quantity: i64,
    pub pnl: f64,
    pub reason: TrancheExitReason,
}

/// Mutable ledger entry for one ticker while held.
#[derive(Debug, Clone)]
pub struct OpenPosition {
    pub ticker: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    /// Remaining quantity.
    pub quantity: i64,
    /// Remaining value at entry cost (entry_price × quantity).
    pub current_value: f64,
    pub original_quantity: i64,
    pub original_value: f64,
    pub state: PositionState,
    pub tranche1: Option<TrancheExit>,
    pub tranche2: Option<TrancheExit>,
    pub stop_loss: f64,
    pub tdst_support: f64,
    pub setup_lowest_low: f64,
    pub tdst_violated: bool,
    /// Accumulated overnight carrying charges not yet allocated to an exit.
    pub overnight_charges: f64,
    pub entry_kc: KeltnerLevels,
}

impl OpenPosition {
    pub fn new(
        ticker: String,
        entry_date: NaiveDate,
        entry_price: f64,
        quantity: i64,
        stop_loss: f64,
        entry_kc: KeltnerLevels,
    ) -> Self {
        let value = quantity as f64 * entry_price;
        OpenPosition {
            ticker,
            entry_date,
            entry_price,
            quantity,
            current_value: value,
            original_quantity: quantity,
            original_value: value,
            state: PositionState::Full,
            tranche1: None,
            tranche2: None,
            stop_loss,
            tdst_support: 0.0,
            setup_lowest_low: 0.0,
            tdst_violated: false,
            overnight_charges: 0.0,
            entry_kc,
        }
    }

    /// 30% of the original quantity, floored to whole shares.
    pub fn tranche1_quantity(&self) -> i64 {
        (self.original_quantity as f64 * TRANCHE1_FRACTION).floor() as i64
    }

    /// 45% of the original quantity, floored to whole shares.
    pub fn tranche2_quantity(&self) -> i64 {
        (self.original_quantity as f64 * TRANCHE2_FRACTION).floor() as i64
    }

    pub fn is_flat(&self) -> bool {
        self.state == PositionState::Flat
    }

    pub fn days_held(&self, date: NaiveDate) -> i64 {
        (date - self.entry_date).num_days()
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.entry_price) - self.overnight_charges
    }
}

/// Immutable record of one realized exit.
#[derive(Debug, Clone)]
pub struct ClosedTrade {
    pub ticker: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub quantity: i64,
    /// Net of exit-leg transaction charges and allocated overnight charges.
    pub pnl: f64,
    pub pnl_pct: f64,
    pub reason: ExitReason,
    pub holding_days: i64,
    pub entry_kc: KeltnerLevels,
    pub tranche: Option<TrancheLabel>,
}
