//! Daily simulation loop.
//!
//! Single-threaded, strictly sequential: one exit phase, one entry phase and
//! one carry phase per weekday. All historical lookups go through an
//! explicit per-run [`IndicatorCache`]; there is no process-wide state.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::{BTreeMap, HashMap};

use super::alert::Alert;
use super::error::AlertsimError;
use super::exit_rules::{
    ExitType, apply_delta_cvd_exit, apply_kc_lower_exit, apply_kc_middle_exit,
    apply_td_tranche_exit,
};
use super::indicator::cvd::cvd_snapshot;
use super::indicator::keltner::keltner_snapshot;
use super::indicator::{CvdSnapshot, KeltnerSnapshot};
use super::ledger::Ledger;
use super::ohlcv::OhlcvBar;
use super::position::{KeltnerLevels, OpenPosition};
use super::summary::{OpenPositionMark, SimulationSummary};
use super::td::{TD_MIN_BARS, TdState};
use crate::ports::data_port::DataPort;
use crate::ports::td_port::TdEngine;

/// Stop distance for the volume-delta strategy: 5% below entry.
pub const DELTA_CVD_STOP_FRACTION: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub exit_type: ExitType,
    pub initial_capital: f64,
    pub position_size_pct: f64,
    pub margin_pct: f64,
    pub charges_per_leg_pct: f64,
    pub overnight_charge_pct: f64,
    /// History fetched before the earliest alert so indicators are warm on
    /// day one.
    pub warmup_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceKey {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Price and snapshot caches owned by the caller. Back-to-back runs (one per
/// exit type) pass the same cache so overlapping windows are fetched once;
/// each run still owns its own ledger.
#[derive(Debug, Default)]
pub struct IndicatorCache {
    price: HashMap<PriceKey, Vec<OhlcvBar>>,
    keltner: HashMap<(String, NaiveDate), Option<KeltnerSnapshot>>,
    cvd: HashMap<(String, NaiveDate), Option<CvdSnapshot>>,
    td: HashMap<(String, NaiveDate), Option<TdState>>,
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
pub struct SimulationResult {
    pub exit_type: ExitType,
    pub ledger: Ledger,
    pub open_marks: Vec<OpenPositionMark>,
    pub summary: SimulationSummary,
}

pub struct Simulator<'a> {
    data: &'a dyn DataPort,
    td_engine: &'a dyn TdEngine,
    config: SimulationConfig,
    cache: &'a mut IndicatorCache,
}

impl<'a> Simulator<'a> {
    pub fn new(
        data: &'a dyn DataPort,
        td_engine: &'a dyn TdEngine,
        config: SimulationConfig,
        cache: &'a mut IndicatorCache,
    ) -> Self {
        Simulator {
            data,
            td_engine,
            config,
            cache,
        }
    }

    /// Run the simulation from the earliest alert date through `as_of`
    /// (inclusive), weekdays only.
    pub fn run(
        &mut self,
        alerts: &BTreeMap<NaiveDate, Vec<Alert>>,
        as_of: NaiveDate,
    ) -> Result<SimulationResult, AlertsimError> {
        let mut ledger = Ledger::new(self.config.initial_capital);

        let Some(&first_day) = alerts.keys().next() else {
            let summary = SimulationSummary::compute(&ledger, &[]);
            return Ok(SimulationResult {
                exit_type: self.config.exit_type,
                ledger,
                open_marks: Vec::new(),
                summary,
            });
        };

        let window_start = first_day - Duration::days(self.config.warmup_days);
        let mut day = first_day;
        while day <= as_of {
            if is_weekday(day) {
                self.exit_phase(&mut ledger, day, window_start, as_of)?;
                self.entry_phase(&mut ledger, alerts.get(&day), day, window_start, as_of)?;
                self.carry_phase(&mut ledger);
                debug_assert!(
                    ledger.conservation_residual().abs()
                        < 1e-6 * self.config.initial_capital.max(1.0)
                );
            }
            day = day + Duration::days(1);
        }

        let open_marks = self.mark_open_positions(&ledger, window_start, as_of)?;
        let summary = SimulationSummary::compute(&ledger, &open_marks);
        Ok(SimulationResult {
            exit_type: self.config.exit_type,
            ledger,
            open_marks,
            summary,
        })
    }

    fn exit_phase(
        &mut self,
        ledger: &mut Ledger,
        day: NaiveDate,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<(), AlertsimError> {
        let mut tickers: Vec<String> = ledger.open_positions.keys().cloned().collect();
        tickers.sort();

        for ticker in tickers {
            let Some(kc) = self.keltner_for(&ticker, day, window_start, window_end)? else {
                continue;
            };

            match self.config.exit_type {
                ExitType::KcLower => {
                    apply_kc_lower_exit(ledger, &ticker, &kc, day, self.config.charges_per_leg_pct);
                }
                ExitType::KcMiddle => {
                    apply_kc_middle_exit(ledger, &ticker, &kc, day, self.config.charges_per_leg_pct);
                }
                ExitType::DeltaCvd => {
                    let Some(cvd) = self.cvd_for(&ticker, day, window_start, window_end)? else {
                        continue;
                    };
                    apply_delta_cvd_exit(
                        ledger,
                        &ticker,
                        &cvd,
                        kc.close,
                        day,
                        self.config.charges_per_leg_pct,
                    );
                }
                ExitType::TdStrategy => {
                    let Some(td) = self.td_for(&ticker, day, window_start, window_end)? else {
                        continue;
                    };
                    apply_td_tranche_exit(
                        ledger,
                        &ticker,
                        &td,
                        kc.close,
                        day,
                        self.config.charges_per_leg_pct,
                        self.td_engine,
                    );
                }
            }
        }
        Ok(())
    }

    fn entry_phase(
        &mut self,
        ledger: &mut Ledger,
        alerts_today: Option<&Vec<Alert>>,
        day: NaiveDate,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<(), AlertsimError> {
        let Some(alerts_today) = alerts_today else {
            return Ok(());
        };

        for alert in alerts_today {
            if ledger.has_position(&alert.ticker) {
                continue;
            }
            if alert.entry_price <= 0.0 {
                continue;
            }

            // Fixed nominal size regardless of current equity; cash already
            // reflects capital committed to open positions.
            let position_value =
                self.config.initial_capital * self.config.position_size_pct / 100.0;
            let buying_power =
                ledger.cash + self.config.initial_capital * self.config.margin_pct / 100.0;
            if position_value > buying_power {
                continue;
            }

            let Some(kc) = self.keltner_for(&alert.ticker, day, window_start, window_end)? else {
                continue;
            };

            let mut tdst_support = 0.0;
            let mut setup_lowest_low = 0.0;
            let stop_loss = match self.config.exit_type {
                ExitType::TdStrategy => {
                    let Some(td) = self.td_for(&alert.ticker, day, window_start, window_end)?
                    else {
                        continue;
                    };
                    if !td.entry_valid() {
                        continue;
                    }
                    tdst_support = td.tdst_support;
                    setup_lowest_low = td.setup_lowest_low;
                    td.tdst_support
                }
                ExitType::DeltaCvd => {
                    let Some(cvd) = self.cvd_for(&alert.ticker, day, window_start, window_end)?
                    else {
                        continue;
                    };
                    if !cvd.entry_signal() {
                        continue;
                    }
                    let Some(td) = self.td_for(&alert.ticker, day, window_start, window_end)?
                    else {
                        continue;
                    };
                    if !td.tdst_resistance_breached {
                        continue;
                    }
                    DELTA_CVD_STOP_FRACTION * alert.entry_price
                }
                ExitType::KcLower => kc.kc_lower,
                ExitType::KcMiddle => kc.kc_middle,
            };

            let quantity = (position_value / alert.entry_price).floor() as i64;
            if quantity == 0 {
                continue;
            }

            let entry_charges =
                self.config.charges_per_leg_pct / 100.0 * alert.entry_price * quantity as f64;
            let mut position = OpenPosition::new(
                alert.ticker.clone(),
                day,
                alert.entry_price,
                quantity,
                stop_loss,
                KeltnerLevels {
                    lower: kc.kc_lower,
                    middle: kc.kc_middle,
                    upper: kc.kc_upper,
                },
            );
            position.tdst_support = tdst_support;
            position.setup_lowest_low = setup_lowest_low;
            ledger.admit(position, entry_charges);
        }
        Ok(())
    }

    fn carry_phase(&mut self, ledger: &mut Ledger) {
        let mut total = 0.0;
        for position in ledger.open_positions.values_mut() {
            let charge = position.current_value * self.config.overnight_charge_pct / 100.0;
            position.overnight_charges += charge;
            total += charge;
        }
        ledger.accrue_overnight(total);
    }

    fn mark_open_positions(
        &mut self,
        ledger: &Ledger,
        window_start: NaiveDate,
        as_of: NaiveDate,
    ) -> Result<Vec<OpenPositionMark>, AlertsimError> {
        let mut positions: Vec<&OpenPosition> = ledger.open_positions.values().collect();
        positions.sort_by(|a, b| a.ticker.cmp(&b.ticker));

        let mut marks = Vec::with_capacity(positions.len());
        for position in positions {
            self.ensure_history(&position.ticker, window_start, as_of)?;
            let key = PriceKey {
                ticker: position.ticker.clone(),
                start: window_start,
                end: as_of,
            };
            let last_close = self
                .cache
                .price
                .get(&key)
                .and_then(|bars| {
                    let upto = bars.partition_point(|b| b.date <= as_of);
                    bars[..upto].last().map(|b| b.close)
                })
                .unwrap_or(position.entry_price);

            let unrealized_pnl = position.unrealized_pnl(last_close);
            let unrealized_pnl_pct = if position.current_value > 0.0 {
                unrealized_pnl / position.current_value * 100.0
            } else {
                0.0
            };

            marks.push(OpenPositionMark {
                ticker: position.ticker.clone(),
                entry_date: position.entry_date,
                entry_price: position.entry_price,
                quantity: position.quantity,
                last_close,
                unrealized_pnl,
                unrealized_pnl_pct,
                state: position.state,
                overnight_charges: position.overnight_charges,
                days_held: position.days_held(as_of),
            });
        }
        Ok(marks)
    }

    fn ensure_history(
        &mut self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(), AlertsimError> {
        let key = PriceKey {
            ticker: ticker.to_string(),
            start,
            end,
        };
        if self.cache.price.contains_key(&key) {
            return Ok(());
        }
        let mut bars = self.data.fetch_ohlcv(ticker, start, end)?;
        bars.sort_by_key(|b| b.date);
        self.cache.price.insert(key, bars);
        Ok(())
    }

    fn keltner_for(
        &mut self,
        ticker: &str,
        date: NaiveDate,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Option<KeltnerSnapshot>, AlertsimError> {
        let key = (ticker.to_string(), date);
        if let Some(hit) = self.cache.keltner.get(&key) {
            return Ok(*hit);
        }
        self.ensure_history(ticker, window_start, window_end)?;
        let price_key = PriceKey {
            ticker: ticker.to_string(),
            start: window_start,
            end: window_end,
        };
        let snap = {
            let bars = self
                .cache
                .price
                .get(&price_key)
                .map(|v| v.as_slice())
                .unwrap_or(&[]);
            let upto = bars.partition_point(|b| b.date <= date);
            keltner_snapshot(&bars[..upto], date)
        };
        self.cache.keltner.insert(key, snap);
        Ok(snap)
    }

    fn cvd_for(
        &mut self,
        ticker: &str,
        date: NaiveDate,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Option<CvdSnapshot>, AlertsimError> {
        let key = (ticker.to_string(), date);
        if let Some(hit) = self.cache.cvd.get(&key) {
            return Ok(*hit);
        }
        self.ensure_history(ticker, window_start, window_end)?;
        let price_key = PriceKey {
            ticker: ticker.to_string(),
            start: window_start,
            end: window_end,
        };
        let snap = {
            let bars = self
                .cache
                .price
                .get(&price_key)
                .map(|v| v.as_slice())
                .unwrap_or(&[]);
            let upto = bars.partition_point(|b| b.date <= date);
            cvd_snapshot(&bars[..upto], date)
        };
        self.cache.cvd.insert(key, snap);
        Ok(snap)
    }

    fn td_for(
        &mut self,
        ticker: &str,
        date: NaiveDate,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Option<TdState>, AlertsimError> {
        let key = (ticker.to_string(), date);
        if let Some(hit) = self.cache.td.get(&key) {
            return Ok(hit.clone());
        }
        self.ensure_history(ticker, window_start, window_end)?;
        let price_key = PriceKey {
            ticker: ticker.to_string(),
            start: window_start,
            end: window_end,
        };
        let snap = {
            let bars = self
                .cache
                .price
                .get(&price_key)
                .map(|v| v.as_slice())
                .unwrap_or(&[]);
            let upto = bars.partition_point(|b| b.date <= date);
            let slice = &bars[..upto];
            match slice.last() {
                Some(last) if last.date == date && slice.len() >= TD_MIN_BARS => self
                    .td_engine
                    .calculate_all(slice)
                    .pop()
                    .and_then(|row| row.state),
                _ => None,
            }
        };
        self.cache.td.insert(key, snap.clone());
        Ok(snap)
    }
}

fn is_weekday(day: NaiveDate) -> bool {
    !matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}
