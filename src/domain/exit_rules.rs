//! Exit-rule evaluators.
//!
//! One rule is active for a whole simulation run, selected by [`ExitType`].
//! Evaluators mutate the ledger and the ticker's open position in place and
//! return `true` when the position went flat (the caller drops it from the
//! open set at the end of the exit phase).

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use super::indicator::{CvdSnapshot, KeltnerSnapshot};
use super::ledger::Ledger;
use super::position::{
    ClosedTrade, ExitReason, OpenPosition, PositionState, TRANCHE1_FRACTION, TrancheExit,
    TrancheLabel,
};
use super::td::TdState;
use crate::ports::td_port::TdEngine;

/// Fixed stop under the channel-midline rule: 98% of entry.
pub const FIXED_SL_FRACTION: f64 = 0.98;

/// Strategy variant for a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitType {
    KcLower,
    KcMiddle,
    DeltaCvd,
    TdStrategy,
}

impl fmt::Display for ExitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitType::KcLower => "kc_lower",
            ExitType::KcMiddle => "kc_middle",
            ExitType::DeltaCvd => "delta_cvd",
            ExitType::TdStrategy => "td_strategy",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ExitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kc_lower" => Ok(ExitType::KcLower),
            "kc_middle" => Ok(ExitType::KcMiddle),
            "delta_cvd" => Ok(ExitType::DeltaCvd),
            "td_strategy" => Ok(ExitType::TdStrategy),
            other => Err(format!(
                "unknown exit type '{}' (expected kc_lower, kc_middle, delta_cvd or td_strategy)",
                other
            )),
        }
    }
}

/// Settle one exit (full or tranche) against the ledger and record the
/// closed trade. Returns the trade's net P&L. `quantity` must be positive.
fn realize_exit(
    ledger: &mut Ledger,
    position: &OpenPosition,
    fill: f64,
    quantity: i64,
    overnight_alloc: f64,
    reason: ExitReason,
    tranche: Option<TrancheLabel>,
    date: NaiveDate,
    charges_per_leg_pct: f64,
) -> f64 {
    let qty = quantity as f64;
    let proceeds = fill * qty;
    let exit_charges = charges_per_leg_pct / 100.0 * proceeds;
    let gross = (fill - position.entry_price) * qty;
    let pnl = gross - exit_charges - overnight_alloc;
    let cost_basis = position.entry_price * qty;

    ledger.settle_exit(proceeds, exit_charges, cost_basis, gross);
    ledger.record_trade(ClosedTrade {
        ticker: position.ticker.clone(),
        entry_date: position.entry_date,
        entry_price: position.entry_price,
        exit_date: date,
        exit_price: fill,
        quantity,
        pnl,
        pnl_pct: pnl / cost_basis * 100.0,
        reason,
        holding_days: position.days_held(date),
        entry_kc: position.entry_kc,
        tranche,
    });

    pnl
}

/// Fixed-channel stop: trigger when the day's low reaches the entry-time
/// `kc_lower` (held as the position's stop), fill at the day's recomputed
/// `kc_lower`.
pub fn apply_kc_lower_exit(
    ledger: &mut Ledger,
    ticker: &str,
    kc: &KeltnerSnapshot,
    date: NaiveDate,
    charges_per_leg_pct: f64,
) -> bool {
    let Some(mut position) = ledger.remove_position(ticker) else {
        return false;
    };

    if position.stop_loss <= 0.0 || kc.low > position.stop_loss {
        ledger.open_positions.insert(ticker.to_string(), position);
        return false;
    }

    let overnight = position.overnight_charges;
    position.overnight_charges = 0.0;
    realize_exit(
        ledger,
        &position,
        kc.kc_lower,
        position.quantity,
        overnight,
        ExitReason::KcLowerBreach,
        None,
        date,
        charges_per_leg_pct,
    );
    true
}

/// Channel-midline rule with a fixed 2% stop checked first (the tighter
/// stop wins when both trigger on the same day).
pub fn apply_kc_middle_exit(
    ledger: &mut Ledger,
    ticker: &str,
    kc: &KeltnerSnapshot,
    date: NaiveDate,
    charges_per_leg_pct: f64,
) -> bool {
    let Some(mut position) = ledger.remove_position(ticker) else {
        return false;
    };

    let fixed_stop = FIXED_SL_FRACTION * position.entry_price;
    let (fill, reason) = if kc.low <= fixed_stop {
        (fixed_stop, ExitReason::Fixed2PctSl)
    } else if kc.low <= kc.kc_middle {
        (kc.kc_middle, ExitReason::KcMiddleBreach)
    } else {
        ledger.open_positions.insert(ticker.to_string(), position);
        return false;
    };

    let overnight = position.overnight_charges;
    position.overnight_charges = 0.0;
    realize_exit(
        ledger,
        &position,
        fill,
        position.quantity,
        overnight,
        reason,
        None,
        date,
        charges_per_leg_pct,
    );
    true
}

/// Volume-delta rule: full exit at the day's close when the 50-period EMA of
/// delta-CVD is negative.
pub fn apply_delta_cvd_exit(
    ledger: &mut Ledger,
    ticker: &str,
    cvd: &CvdSnapshot,
    close: f64,
    date: NaiveDate,
    charges_per_leg_pct: f64,
) -> bool {
    if !cvd.exit_signal() {
        return false;
    }
    let Some(mut position) = ledger.remove_position(ticker) else {
        return false;
    };

    let overnight = position.overnight_charges;
    position.overnight_charges = 0.0;
    realize_exit(
        ledger,
        &position,
        close,
        position.quantity,
        overnight,
        ExitReason::Ema50DeltaCvdNegative,
        None,
        date,
        charges_per_leg_pct,
    );
    true
}

/// Three-tranche scale-out. At most one tranche transition per position per
/// day; tranches fire in strict 1 → 2 → 3 order driven by the position
/// state. Returns `true` once tranche 3 leaves the position flat.
pub fn apply_td_tranche_exit(
    ledger: &mut Ledger,
    ticker: &str,
    td: &TdState,
    close: f64,
    date: NaiveDate,
    charges_per_leg_pct: f64,
    engine: &dyn TdEngine,
) -> bool {
    let Some(mut position) = ledger.remove_position(ticker) else {
        return false;
    };

    match position.state {
        PositionState::Full => {
            if let Some(reason) = engine.check_tranche1_exit(close, td) {
                exit_tranche1(ledger, &mut position, reason, close, date, charges_per_leg_pct);
            }
        }
        PositionState::DeRisked => {
            // Prefer the level captured at entry; fall back to today's state
            // when the position never saw one.
            let setup_lowest_low = if position.setup_lowest_low > 0.0 {
                position.setup_lowest_low
            } else {
                td.setup_lowest_low
            };
            if let Some(reason) = engine.check_tranche2_exit(close, td, setup_lowest_low) {
                exit_tranche2(ledger, &mut position, reason, close, date, charges_per_leg_pct);
            }
        }
        PositionState::Runner => {
            if position.quantity == 0 {
                position.state = PositionState::Flat;
            } else if let Some(reason) = engine.check_tranche3_exit(
                close,
                td,
                position.entry_price,
                position.days_held(date),
            ) {
                exit_tranche3(ledger, &mut position, reason, close, date, charges_per_leg_pct);
            }
        }
        PositionState::Flat => {}
    }

    let flat = position.is_flat();
    if !flat {
        ledger.open_positions.insert(ticker.to_string(), position);
    }
    flat
}

fn exit_tranche1(
    ledger: &mut Ledger,
    position: &mut OpenPosition,
    reason: super::td::TrancheExitReason,
    close: f64,
    date: NaiveDate,
    charges_per_leg_pct: f64,
) {
    let quantity = position.tranche1_quantity();
    if quantity == 0 {
        // Zero-share tranche is a no-op exit: state advances, nothing realizes.
        position.state = PositionState::DeRisked;
        return;
    }

    let alloc = TRANCHE1_FRACTION * position.overnight_charges;
    position.overnight_charges -= alloc;

    let pnl = realize_exit(
        ledger,
        position,
        close,
        quantity,
        alloc,
        ExitReason::Tranche1(reason),
        Some(TrancheLabel::Tranche1),
        date,
        charges_per_leg_pct,
    );

    position.tranche1 = Some(TrancheExit {
        date,
        price: close,
        quantity,
        pnl,
        reason,
    });
    position.quantity -= quantity;
    position.current_value = position.entry_price * position.quantity as f64;
    position.state = PositionState::DeRisked;
}

fn exit_tranche2(
    ledger: &mut Ledger,
    position: &mut OpenPosition,
    reason: super::td::TrancheExitReason,
    close: f64,
    date: NaiveDate,
    charges_per_leg_pct: f64,
) {
    let quantity = position.tranche2_quantity();
    if quantity == 0 {
        position.state = PositionState::Runner;
        return;
    }

    let alloc = position.overnight_charges * quantity as f64 / position.quantity as f64;
    position.overnight_charges -= alloc;

    let pnl = realize_exit(
        ledger,
        position,
        close,
        quantity,
        alloc,
        ExitReason::Tranche2(reason),
        Some(TrancheLabel::Tranche2),
        date,
        charges_per_leg_pct,
    );

    if reason.is_tdst_breach() {
        position.tdst_violated = true;
    }
    position.tranche2 = Some(TrancheExit {
        date,
        price: close,
        quantity,
        pnl,
        reason,
    });
    position.quantity -= quantity;
    position.current_value = position.entry_price * position.quantity as f64;
    position.state = PositionState::Runner;
}

fn exit_tranche3(
    ledger: &mut Ledger,
    position: &mut OpenPosition,
    reason: super::td::TrancheExitReason,
    close: f64,
    date: NaiveDate,
    charges_per_leg_pct: f64,
) {
    let quantity = position.quantity;
    let alloc = position.overnight_charges;
    position.overnight_charges = 0.0;

    realize_exit(
        ledger,
        position,
        close,
        quantity,
        alloc,
        ExitReason::Tranche3(reason),
        Some(TrancheLabel::Tranche3),
        date,
        charges_per_leg_pct,
    );

    position.quantity = 0;
    position.current_value = 0.0;
    position.state = PositionState::Flat;
}
