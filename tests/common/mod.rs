#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap};

use alertsim::domain::alert::{Alert, dedup_by_day};
use alertsim::domain::error::AlertsimError;
pub use alertsim::domain::ohlcv::OhlcvBar;
use alertsim::domain::td::{TdBar, TdState, TrancheExitReason};
use alertsim::ports::data_port::DataPort;
use alertsim::ports::td_port::TdEngine;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(ticker: &str, day: NaiveDate, close: f64) -> OhlcvBar {
    OhlcvBar {
        ticker: ticker.to_string(),
        date: day,
        open: close,
        high: close + 5.0,
        low: close - 5.0,
        close,
        volume: 1000,
    }
}

/// Daily bars (calendar days) ending at `end`, all at the same close with a
/// ±`half_range` high/low band.
pub fn flat_bars(
    ticker: &str,
    end: NaiveDate,
    count: usize,
    close: f64,
    half_range: f64,
) -> Vec<OhlcvBar> {
    (0..count)
        .map(|i| {
            let day = end - Duration::days((count - 1 - i) as i64);
            OhlcvBar {
                ticker: ticker.to_string(),
                date: day,
                open: close,
                high: close + half_range,
                low: close - half_range,
                close,
                volume: 1000,
            }
        })
        .collect()
}

/// Daily up-bars (open below close) ending at `end`; keeps the volume delta
/// positive every day.
pub fn up_bars(ticker: &str, end: NaiveDate, count: usize, close: f64) -> Vec<OhlcvBar> {
    (0..count)
        .map(|i| {
            let day = end - Duration::days((count - 1 - i) as i64);
            OhlcvBar {
                ticker: ticker.to_string(),
                date: day,
                open: close - 1.0,
                high: close + 1.0,
                low: close - 2.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

pub fn make_alert(ticker: &str, day: NaiveDate, price: f64) -> Alert {
    Alert {
        ticker: ticker.to_string(),
        alert_time: day.and_hms_opt(10, 0, 0).unwrap(),
        entry_price: price,
        score: 7.0,
        momentum: 1.0,
    }
}

pub fn alerts_from(list: Vec<Alert>) -> BTreeMap<NaiveDate, Vec<Alert>> {
    dedup_by_day(list)
}

/// Data port backed by an in-memory bar table. Returns every bar it holds
/// for a ticker regardless of the requested window — the simulator's own
/// date slicing is what keeps look-ahead out.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, AlertsimError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(AlertsimError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(ticker).cloned().unwrap_or_default())
    }
}

/// TD engine scripted through per-(ticker, date) states. Tranche rules key
/// off marker fields in the scripted state:
/// countdown_complete → tranche 1, tdst_support_breached → tranche 2,
/// countdown_count == 13 → tranche 3.
pub struct MockTdEngine {
    pub states: HashMap<(String, NaiveDate), TdState>,
    pub default_state: TdState,
}

impl MockTdEngine {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            default_state: entry_state(),
        }
    }

    pub fn with_default(mut self, state: TdState) -> Self {
        self.default_state = state;
        self
    }

    pub fn with_state(mut self, ticker: &str, day: NaiveDate, state: TdState) -> Self {
        self.states.insert((ticker.to_string(), day), state);
        self
    }
}

impl TdEngine for MockTdEngine {
    fn calculate_all(&self, bars: &[OhlcvBar]) -> Vec<TdBar> {
        bars.iter()
            .map(|bar| {
                let state = self
                    .states
                    .get(&(bar.ticker.clone(), bar.date))
                    .cloned()
                    .unwrap_or_else(|| self.default_state.clone());
                TdBar {
                    date: bar.date,
                    state: Some(state),
                }
            })
            .collect()
    }

    fn check_tranche1_exit(&self, _close: f64, td: &TdState) -> Option<TrancheExitReason> {
        if td.countdown_complete {
            Some(TrancheExitReason::CountdownExhaustion)
        } else {
            None
        }
    }

    fn check_tranche2_exit(
        &self,
        _close: f64,
        td: &TdState,
        _setup_lowest_low: f64,
    ) -> Option<TrancheExitReason> {
        if td.tdst_support_breached {
            Some(TrancheExitReason::TdstSupportBreach)
        } else {
            None
        }
    }

    fn check_tranche3_exit(
        &self,
        _close: f64,
        td: &TdState,
        _entry_price: f64,
        _days_held: i64,
    ) -> Option<TrancheExitReason> {
        if td.countdown_count == 13 {
            Some(TrancheExitReason::TimeStop)
        } else {
            None
        }
    }
}

/// Valid-entry TD state with no tranche markers set.
pub fn entry_state() -> TdState {
    TdState {
        ma1: 100.0,
        ma1_active: true,
        ma2: 98.0,
        ma2_active: true,
        setup_count: 3,
        setup_complete: false,
        setup_nine_close: 0.0,
        setup_true_range: 0.0,
        setup_lowest_low: 92.0,
        bars_since_setup: 0,
        highest_close_since_setup: 0.0,
        tdst_support: 95.0,
        tdst_support_active: true,
        tdst_support_breached: false,
        tdst_resistance: 0.0,
        tdst_resistance_active: false,
        tdst_resistance_breached: true,
        countdown_count: 0,
        countdown_complete: false,
    }
}

pub fn blocked_entry_state() -> TdState {
    TdState {
        ma1_active: false,
        ma2_active: false,
        tdst_resistance_breached: false,
        ..entry_state()
    }
}

pub fn tranche1_trigger_state() -> TdState {
    TdState {
        countdown_complete: true,
        ..entry_state()
    }
}

pub fn tranche2_trigger_state() -> TdState {
    TdState {
        tdst_support_breached: true,
        ..entry_state()
    }
}

pub fn tranche3_trigger_state() -> TdState {
    TdState {
        countdown_count: 13,
        ..entry_state()
    }
}
