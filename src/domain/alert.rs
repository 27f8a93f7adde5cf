//! Incoming trade alerts and per-day deduplication.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashSet};

/// One incoming trade signal from the notification feed. Immutable; at most
/// one alert per ticker is consumed per calendar day.
#[derive(Debug, Clone)]
pub struct Alert {
    pub ticker: String,
    pub alert_time: NaiveDateTime,
    pub entry_price: f64,
    pub score: f64,
    pub momentum: f64,
}

impl Alert {
    pub fn date(&self) -> NaiveDate {
        self.alert_time.date()
    }
}

/// Group alerts by calendar date, keeping only the first alert seen per
/// ticker per day. Input order is feed order; later same-day duplicates for
/// a ticker are discarded.
pub fn dedup_by_day(alerts: Vec<Alert>) -> BTreeMap<NaiveDate, Vec<Alert>> {
    let mut by_day: BTreeMap<NaiveDate, Vec<Alert>> = BTreeMap::new();
    let mut seen: HashSet<(NaiveDate, String)> = HashSet::new();

    for alert in alerts {
        let key = (alert.date(), alert.ticker.clone());
        if seen.contains(&key) {
            continue;
        }
        seen.insert(key);
        by_day.entry(alert.date()).or_default().push(alert);
    }

    by_day
}
