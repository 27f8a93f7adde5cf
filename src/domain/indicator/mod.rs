//! Indicator snapshot types and shared calculation helpers.
//!
//! Snapshots are explicit structs with required fields. A calculator that
//! cannot produce every field for the target date returns `None`
//! ("insufficient data") instead of defaulting values to zero.

pub mod keltner;
pub mod cvd;

use chrono::NaiveDate;

/// Keltner Channel row for one ticker/date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeltnerSnapshot {
    pub date: NaiveDate,
    pub close: f64,
    pub low: f64,
    pub high: f64,
    pub kc_lower: f64,
    pub kc_middle: f64,
    pub kc_upper: f64,
}

/// Cumulative volume delta row for one ticker/date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CvdSnapshot {
    pub date: NaiveDate,
    pub delta: f64,
    pub cvd: f64,
    pub delta_cvd: f64,
    pub ema50_delta_cvd: f64,
}

impl CvdSnapshot {
    pub fn exit_signal(&self) -> bool {
        self.ema50_delta_cvd < 0.0
    }

    pub fn entry_signal(&self) -> bool {
        self.ema50_delta_cvd > 0.0
    }
}

/// EMA over a value series: k = 2/(n+1), seeded with the first n-bar SMA.
/// The first (n-1) slots are `None` (warmup).
pub fn ema_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &v) in values.iter().enumerate() {
        if i < period - 1 {
            sum += v;
            out.push(None);
        } else if i == period - 1 {
            sum += v;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            ema = v * k + ema * (1.0 - k);
            out.push(Some(ema));
        }
    }

    out
}

/// Rolling simple mean over the trailing `period` values. Warmup slots are
/// `None`.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    let mut window_sum = 0.0;

    for i in 0..values.len() {
        window_sum += values[i];
        if i >= period {
            window_sum -= values[i - period];
        }
        if i >= period - 1 {
            out.push(Some(window_sum / period as f64));
        } else {
            out.push(None);
        }
    }

    out
}
