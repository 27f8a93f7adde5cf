//! Keltner Channel calculator.
//!
//! Middle band = 20-period EMA of close, bands = middle ± 2×ATR(10) where
//! ATR is a 10-period simple mean of true range.

use chrono::NaiveDate;

use super::{KeltnerSnapshot, ema_series, rolling_mean};
use crate::domain::ohlcv::OhlcvBar;

pub const KC_EMA_PERIOD: usize = 20;
pub const KC_ATR_PERIOD: usize = 10;
pub const KC_ATR_MULT: f64 = 2.0;
pub const KC_MIN_BARS: usize = 25;

/// Compute the Keltner Channel row for `target`. The history must end at or
/// before the target date; returns `None` when the date is absent or the
/// history is too short to have every band valid at that row.
pub fn keltner_snapshot(bars: &[OhlcvBar], target: NaiveDate) -> Option<KeltnerSnapshot> {
    if bars.len() < KC_MIN_BARS {
        return None;
    }

    let idx = bars.iter().position(|b| b.date == target)?;
    if idx + 1 < KC_EMA_PERIOD {
        return None;
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let middles = ema_series(&closes, KC_EMA_PERIOD);

    let true_ranges: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect();
    let atrs = rolling_mean(&true_ranges, KC_ATR_PERIOD);

    let kc_middle = middles[idx]?;
    let atr = atrs[idx]?;

    Some(KeltnerSnapshot {
        date: target,
        close: bars[idx].close,
        low: bars[idx].low,
        high: bars[idx].high,
        kc_lower: kc_middle - KC_ATR_MULT * atr,
        kc_middle,
        kc_upper: kc_middle + KC_ATR_MULT * atr,
    })
}
