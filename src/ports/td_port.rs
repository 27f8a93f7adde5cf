//! TD-sequential indicator engine port.

use crate::domain::ohlcv::OhlcvBar;
use crate::domain::td::{TdBar, TdState, TrancheExitReason};

/// TD-sequential engine plus the three tranche exit rules. `calculate_all`
/// returns one row per input bar, in input order; rows inside the engine's
/// warmup carry `state == None`.
pub trait TdEngine {
    fn calculate_all(&self, bars: &[OhlcvBar]) -> Vec<TdBar>;

    /// Tranche 1 (de-risk 30%): evaluated while the position is still full.
    fn check_tranche1_exit(&self, close: f64, td: &TdState) -> Option<TrancheExitReason>;

    /// Tranche 2 (scale out 45%): evaluated after tranche 1 has exited.
    /// `setup_lowest_low` is the level the caller resolved from the position
    /// or from today's state.
    fn check_tranche2_exit(
        &self,
        close: f64,
        td: &TdState,
        setup_lowest_low: f64,
    ) -> Option<TrancheExitReason>;

    /// Tranche 3 (runner): evaluated after tranche 2 has exited.
    fn check_tranche3_exit(
        &self,
        close: f64,
        td: &TdState,
        entry_price: f64,
        days_held: i64,
    ) -> Option<TrancheExitReason>;
}
