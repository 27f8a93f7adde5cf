//! Reference TD-sequential engine.
//!
//! Tracks the bullish (sell-side) setup count 1..=9, the TDST levels from
//! completed setups, a 13-step countdown, and a two-EMA trend filter. Rows
//! inside the slow EMA's warmup carry no state.

use crate::domain::indicator::ema_series;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::td::{TdBar, TdState, TrancheExitReason};
use crate::ports::td_port::TdEngine;

pub const TD_MA_FAST: usize = 8;
pub const TD_MA_SLOW: usize = 20;

const SETUP_LENGTH: u8 = 9;
const COUNTDOWN_LENGTH: u8 = 13;
/// Tranche-2 momentum stall: close gives back 3% from the post-setup high.
const MOMENTUM_STALL_FRACTION: f64 = 0.97;
/// Tranche-3 time stop for the runner.
const RUNNER_TIME_STOP_DAYS: i64 = 60;

pub struct TdSequentialAdapter;

impl TdSequentialAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TdSequentialAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TdEngine for TdSequentialAdapter {
    fn calculate_all(&self, bars: &[OhlcvBar]) -> Vec<TdBar> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let ma1 = ema_series(&closes, TD_MA_FAST);
        let ma2 = ema_series(&closes, TD_MA_SLOW);

        let mut out = Vec::with_capacity(bars.len());

        let mut sell_count: u8 = 0;
        let mut buy_count: u8 = 0;
        let mut has_setup = false;
        let mut nine_close = 0.0;
        let mut setup_range = 0.0;
        let mut setup_low = 0.0;
        let mut bars_since: u32 = 0;
        let mut highest_since = 0.0;
        let mut support = 0.0;
        let mut support_active = false;
        let mut support_breached = false;
        let mut resistance = 0.0;
        let mut resistance_active = false;
        let mut resistance_breached = false;
        let mut countdown: u8 = 0;
        let mut countdown_done = false;

        for (i, bar) in bars.iter().enumerate() {
            if i >= 4 {
                if bar.close > bars[i - 4].close {
                    sell_count += 1;
                } else {
                    sell_count = 0;
                }
                if bar.close < bars[i - 4].close {
                    buy_count += 1;
                } else {
                    buy_count = 0;
                }
            }

            let mut completed_now = false;
            if sell_count == SETUP_LENGTH {
                let window = &bars[i + 1 - SETUP_LENGTH as usize..=i];
                setup_low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
                let setup_high = window
                    .iter()
                    .map(|b| b.high)
                    .fold(f64::NEG_INFINITY, f64::max);
                nine_close = bar.close;
                setup_range = setup_high - setup_low;
                has_setup = true;
                completed_now = true;
                bars_since = 0;
                highest_since = bar.close;
                support = setup_low;
                support_active = true;
                support_breached = false;
                countdown = 0;
                countdown_done = false;
                sell_count = 0;
            }

            if buy_count == SETUP_LENGTH {
                let window = &bars[i + 1 - SETUP_LENGTH as usize..=i];
                resistance = window
                    .iter()
                    .map(|b| b.high)
                    .fold(f64::NEG_INFINITY, f64::max);
                resistance_active = true;
                resistance_breached = false;
                buy_count = 0;
            }

            if has_setup && !completed_now {
                bars_since += 1;
                if bar.close > highest_since {
                    highest_since = bar.close;
                }
                if !countdown_done && i >= 2 && bar.close >= bars[i - 2].high {
                    countdown += 1;
                    if countdown >= COUNTDOWN_LENGTH {
                        countdown_done = true;
                    }
                }
            }

            if support_active && bar.close < support {
                support_breached = true;
            }
            if resistance_active && bar.close > resistance {
                resistance_breached = true;
            }

            let state = match (ma1[i], ma2[i]) {
                (Some(m1), Some(m2)) => Some(TdState {
                    ma1: m1,
                    ma1_active: bar.close > m1,
                    ma2: m2,
                    ma2_active: bar.close > m2,
                    setup_count: if completed_now { SETUP_LENGTH } else { sell_count },
                    setup_complete: has_setup,
                    setup_nine_close: nine_close,
                    setup_true_range: setup_range,
                    setup_lowest_low: setup_low,
                    bars_since_setup: bars_since,
                    highest_close_since_setup: highest_since,
                    tdst_support: support,
                    tdst_support_active: support_active,
                    tdst_support_breached: support_breached,
                    tdst_resistance: resistance,
                    tdst_resistance_active: resistance_active,
                    tdst_resistance_breached: resistance_breached,
                    countdown_count: countdown,
                    countdown_complete: countdown_done,
                }),
                _ => None,
            };
            out.push(TdBar {
                date: bar.date,
                state,
            });
        }

        out
    }

    fn check_tranche1_exit(&self, close: f64, td: &TdState) -> Option<TrancheExitReason> {
        if td.countdown_complete {
            return Some(TrancheExitReason::CountdownExhaustion);
        }
        if td.setup_complete && td.bars_since_setup > 0 && close < td.setup_nine_close {
            return Some(TrancheExitReason::SetupNineReversal);
        }
        None
    }

    fn check_tranche2_exit(
        &self,
        close: f64,
        td: &TdState,
        setup_lowest_low: f64,
    ) -> Option<TrancheExitReason> {
        if setup_lowest_low > 0.0 && close < setup_lowest_low {
            return Some(TrancheExitReason::TdstSupportBreach);
        }
        if td.tdst_support_active && td.tdst_support_breached {
            return Some(TrancheExitReason::TdstSupportBreach);
        }
        if td.setup_complete
            && td.highest_close_since_setup > 0.0
            && close < MOMENTUM_STALL_FRACTION * td.highest_close_since_setup
        {
            return Some(TrancheExitReason::MomentumStall);
        }
        None
    }

    fn check_tranche3_exit(
        &self,
        close: f64,
        td: &TdState,
        entry_price: f64,
        days_held: i64,
    ) -> Option<TrancheExitReason> {
        if td.tdst_support_active && td.tdst_support_breached {
            return Some(TrancheExitReason::TdstSupportBreach);
        }
        if close < entry_price {
            return Some(TrancheExitReason::TrailingGiveback);
        }
        if days_held >= RUNNER_TIME_STOP_DAYS {
            return Some(TrancheExitReason::TimeStop);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bars(closes: &[f64]) -> Vec<OhlcvBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                ticker: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                open: close,
                high: close + 5.0,
                low: close - 5.0,
                close,
                volume: 1000,
            })
            .collect()
    }

    fn ascending(count: usize) -> Vec<f64> {
        (0..count).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn warmup_rows_have_no_state() {
        let engine = TdSequentialAdapter::new();
        let rows = engine.calculate_all(&make_bars(&ascending(30)));

        assert_eq!(rows.len(), 30);
        for row in rows.iter().take(TD_MA_SLOW - 1) {
            assert!(row.state.is_none());
        }
        assert!(rows[TD_MA_SLOW - 1].state.is_some());
    }

    #[test]
    fn ascending_closes_complete_sell_setups() {
        // close[i] > close[i-4] from bar 4 on: the count reaches 9 at bar
        // 12, restarts, and completes again at bar 21.
        let engine = TdSequentialAdapter::new();
        let bars = make_bars(&ascending(30));
        let rows = engine.calculate_all(&bars);

        let state = rows[29].state.as_ref().unwrap();
        assert!(state.setup_complete);
        // most recent completion at bar 21: window bars 13..=21
        assert!((state.setup_nine_close - 121.0).abs() < f64::EPSILON);
        assert!((state.setup_lowest_low - (113.0 - 5.0)).abs() < f64::EPSILON);
        assert!((state.tdst_support - state.setup_lowest_low).abs() < f64::EPSILON);
        assert!(state.tdst_support_active);
        assert!(!state.tdst_support_breached);
        assert_eq!(state.bars_since_setup, 8);
        assert!((state.highest_close_since_setup - 129.0).abs() < f64::EPSILON);
        assert!(state.entry_valid());
    }

    #[test]
    fn slow_rise_never_ticks_countdown() {
        // +1 per bar: close[i] never reaches high[i-2] = close[i-2] + 5.
        let engine = TdSequentialAdapter::new();
        let rows = engine.calculate_all(&make_bars(&ascending(30)));

        let state = rows[29].state.as_ref().unwrap();
        assert_eq!(state.countdown_count, 0);
        assert!(!state.countdown_complete);
    }

    #[test]
    fn countdown_ticks_while_setup_count_is_broken() {
        // Ascending run completes a setup at bar 12. From bar 13 a zig-zag
        // alternates a declining high leg with a rising low leg: the low
        // legs clear the two-bars-ago high (countdown tick) while the high
        // legs fall against four bars ago, so no new setup recycles the
        // countdown. 13 low legs complete the countdown at bar 38.
        let mut closes = ascending(13);
        for k in 0..26 {
            if k % 2 == 0 {
                closes.push(200.0 - k as f64);
            } else {
                closes.push(100.0 + 2.0 * k as f64);
            }
        }
        let bars: Vec<OhlcvBar> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                ticker: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000,
            })
            .collect();

        let engine = TdSequentialAdapter::new();
        let rows = engine.calculate_all(&bars);

        let before = rows[37].state.as_ref().unwrap();
        assert_eq!(before.countdown_count, 12);
        assert!(!before.countdown_complete);
        let after = rows[38].state.as_ref().unwrap();
        assert!(after.countdown_complete);
    }

    #[test]
    fn descending_closes_build_resistance() {
        let closes: Vec<f64> = (0..30).map(|i| 200.0 - i as f64).collect();
        let engine = TdSequentialAdapter::new();
        let rows = engine.calculate_all(&make_bars(&closes));

        let state = rows[29].state.as_ref().unwrap();
        assert!(state.tdst_resistance_active);
        // the count recycles: the latest buy setup completed at bar 21 over
        // window bars 13..=21, whose highest high is close[13] + 5
        assert!((state.tdst_resistance - (187.0 + 5.0)).abs() < f64::EPSILON);
        assert!(!state.tdst_resistance_breached);
        assert!(!state.entry_valid());
    }

    #[test]
    fn support_breach_is_detected() {
        let mut closes = ascending(25);
        // crash well below the completed setup's lowest low
        closes.extend_from_slice(&[60.0, 58.0, 55.0]);
        let engine = TdSequentialAdapter::new();
        let rows = engine.calculate_all(&make_bars(&closes));

        let state = rows[27].state.as_ref().unwrap();
        assert!(state.tdst_support_active);
        assert!(state.tdst_support_breached);
    }

    #[test]
    fn resistance_breach_after_recovery() {
        let mut closes: Vec<f64> = (0..22).map(|i| 200.0 - i as f64).collect();
        // rally back through the resistance level (201.0)
        closes.extend_from_slice(&[250.0, 255.0]);
        let engine = TdSequentialAdapter::new();
        let rows = engine.calculate_all(&make_bars(&closes));

        let state = rows[23].state.as_ref().unwrap();
        assert!(state.tdst_resistance_active);
        assert!(state.tdst_resistance_breached);
    }

    #[test]
    fn tranche1_fires_on_countdown_exhaustion() {
        let engine = TdSequentialAdapter::new();
        let mut td = neutral();
        td.countdown_complete = true;

        assert_eq!(
            engine.check_tranche1_exit(100.0, &td),
            Some(TrancheExitReason::CountdownExhaustion)
        );
    }

    #[test]
    fn tranche1_fires_on_close_under_nine_close() {
        let engine = TdSequentialAdapter::new();
        let mut td = neutral();
        td.setup_complete = true;
        td.setup_nine_close = 110.0;
        td.bars_since_setup = 3;

        assert_eq!(
            engine.check_tranche1_exit(108.0, &td),
            Some(TrancheExitReason::SetupNineReversal)
        );
        assert_eq!(engine.check_tranche1_exit(112.0, &td), None);
    }

    #[test]
    fn tranche2_prefers_passed_lowest_low() {
        let engine = TdSequentialAdapter::new();
        let td = neutral();

        assert_eq!(
            engine.check_tranche2_exit(95.0, &td, 96.0),
            Some(TrancheExitReason::TdstSupportBreach)
        );
        assert_eq!(engine.check_tranche2_exit(97.0, &td, 96.0), None);
    }

    #[test]
    fn tranche2_momentum_stall() {
        let engine = TdSequentialAdapter::new();
        let mut td = neutral();
        td.setup_complete = true;
        td.highest_close_since_setup = 120.0;

        // 3% under the 120 post-setup high
        assert_eq!(
            engine.check_tranche2_exit(116.0, &td, 0.0),
            Some(TrancheExitReason::MomentumStall)
        );
        assert_eq!(engine.check_tranche2_exit(117.0, &td, 0.0), None);
    }

    #[test]
    fn tranche3_rules_in_order() {
        let engine = TdSequentialAdapter::new();
        let mut td = neutral();

        assert_eq!(
            engine.check_tranche3_exit(99.0, &td, 100.0, 5),
            Some(TrancheExitReason::TrailingGiveback)
        );
        assert_eq!(
            engine.check_tranche3_exit(105.0, &td, 100.0, RUNNER_TIME_STOP_DAYS),
            Some(TrancheExitReason::TimeStop)
        );
        assert_eq!(engine.check_tranche3_exit(105.0, &td, 100.0, 5), None);

        td.tdst_support_active = true;
        td.tdst_support_breached = true;
        assert_eq!(
            engine.check_tranche3_exit(105.0, &td, 100.0, 5),
            Some(TrancheExitReason::TdstSupportBreach)
        );
    }

    fn neutral() -> TdState {
        TdState {
            ma1: 100.0,
            ma1_active: true,
            ma2: 98.0,
            ma2_active: true,
            setup_count: 0,
            setup_complete: false,
            setup_nine_close: 0.0,
            setup_true_range: 0.0,
            setup_lowest_low: 0.0,
            bars_since_setup: 0,
            highest_close_since_setup: 0.0,
            tdst_support: 0.0,
            tdst_support_active: false,
            tdst_support_breached: false,
            tdst_resistance: 0.0,
            tdst_resistance_active: false,
            tdst_resistance_breached: false,
            countdown_count: 0,
            countdown_complete: false,
        }
    }
}
