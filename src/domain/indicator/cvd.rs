//! Cumulative Volume Delta calculator.
//!
//! Per-bar delta is signed volume; `cvd` is its running sum, `delta_cvd` the
//! day-over-day change of `cvd`, and the exit signal fires when the
//! 50-period EMA of `delta_cvd` turns negative.

use chrono::NaiveDate;

use super::{CvdSnapshot, ema_series};
use crate::domain::ohlcv::OhlcvBar;

pub const CVD_EMA_PERIOD: usize = 50;
pub const CVD_MIN_BARS: usize = 50;

/// Compute the CVD row for `target`, or `None` when the date is absent or
/// the EMA has not warmed up at that row.
pub fn cvd_snapshot(bars: &[OhlcvBar], target: NaiveDate) -> Option<CvdSnapshot> {
    if bars.len() < CVD_MIN_BARS {
        return None;
    }

    let idx = bars.iter().position(|b| b.date == target)?;

    let deltas: Vec<f64> = bars.iter().map(|b| b.volume_delta() as f64).collect();

    let mut cvd = Vec::with_capacity(deltas.len());
    let mut running = 0.0;
    for &d in &deltas {
        running += d;
        cvd.push(running);
    }

    // The day-over-day change of a running sum is the day's delta itself;
    // kept as a named series for clarity.
    let delta_cvd: Vec<f64> = (0..cvd.len())
        .map(|i| if i == 0 { cvd[0] } else { cvd[i] - cvd[i - 1] })
        .collect();

    let ema = ema_series(&delta_cvd, CVD_EMA_PERIOD);
    let ema50_delta_cvd = ema[idx]?;

    Some(CvdSnapshot {
        date: target,
        delta: deltas[idx],
        cvd: cvd[idx],
        delta_cvd: delta_cvd[idx],
        ema50_delta_cvd,
    })
}
