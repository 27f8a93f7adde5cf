//! TD-sequential state types shared between the simulator and the
//! TD-indicator engine.
//!
//! The engine itself lives behind [`crate::ports::td_port::TdEngine`]; the
//! domain only depends on these projected rows. A bar still inside the
//! engine's warmup carries no state (`TdBar::state == None`) — missing
//! fields are never zero-defaulted.

use chrono::NaiveDate;
use std::fmt;

/// Minimum history before any TD row is projected.
pub const TD_MIN_BARS: usize = 20;

/// One projected TD-sequential row.
#[derive(Debug, Clone)]
pub struct TdBar {
    pub date: NaiveDate,
    pub state: Option<TdState>,
}

/// TD-sequential state for one ticker/date.
#[derive(Debug, Clone, PartialEq)]
pub struct TdState {
    pub ma1: f64,
    pub ma1_active: bool,
    pub ma2: f64,
    pub ma2_active: bool,

    /// Sell-setup counter, 1..=9; 0 when no setup is running.
    pub setup_count: u8,
    pub setup_complete: bool,
    pub setup_nine_close: f64,
    pub setup_true_range: f64,
    pub setup_lowest_low: f64,
    pub bars_since_setup: u32,
    pub highest_close_since_setup: f64,

    pub tdst_support: f64,
    pub tdst_support_active: bool,
    pub tdst_support_breached: bool,
    pub tdst_resistance: f64,
    pub tdst_resistance_active: bool,
    pub tdst_resistance_breached: bool,

    /// Countdown counter, 1..=13; 0 before the qualifying setup completes.
    pub countdown_count: u8,
    pub countdown_complete: bool,
}

impl TdState {
    /// Entry gate: both trend moving averages active.
    pub fn entry_valid(&self) -> bool {
        self.ma1_active && self.ma2_active
    }
}

/// Why a tranche exit rule fired. Tagged variants so downstream logic never
/// parses reason strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrancheExitReason {
    SetupNineReversal,
    CountdownExhaustion,
    TdstSupportBreach,
    MomentumStall,
    TrailingGiveback,
    TimeStop,
}

impl TrancheExitReason {
    pub fn is_tdst_breach(&self) -> bool {
        matches!(self, TrancheExitReason::TdstSupportBreach)
    }
}

impl fmt::Display for TrancheExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            TrancheExitReason::SetupNineReversal => "SETUP_NINE_REVERSAL",
            TrancheExitReason::CountdownExhaustion => "COUNTDOWN_EXHAUSTION",
            TrancheExitReason::TdstSupportBreach => "TDST_SUPPORT_BREACH",
            TrancheExitReason::MomentumStall => "MOMENTUM_STALL",
            TrancheExitReason::TrailingGiveback => "TRAILING_GIVEBACK",
            TrancheExitReason::TimeStop => "TIME_STOP",
        };
        write!(f, "{}", tag)
    }
}
