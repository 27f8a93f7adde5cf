//! JSON-lines alert log adapter.
//!
//! The notification feed persists one JSON object per line, append-only:
//! `{"ticker": "...", "alert_time": "2026-06-01T10:15:00", "entry_price":
//! 2900.0, "score": 7.5, "momentum": 1.2}`. Blank lines are skipped; an
//! unparseable line aborts the run.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::domain::alert::{Alert, dedup_by_day};
use crate::domain::error::AlertsimError;
use crate::ports::alert_port::AlertPort;

#[derive(Debug, Deserialize)]
struct RawAlert {
    ticker: String,
    alert_time: NaiveDateTime,
    entry_price: f64,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    momentum: f64,
}

pub struct JsonAlertAdapter {
    log_path: PathBuf,
}

impl JsonAlertAdapter {
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }
}

impl AlertPort for JsonAlertAdapter {
    fn fetch_alerts(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, Vec<Alert>>, AlertsimError> {
        let content = fs::read_to_string(&self.log_path).map_err(|e| AlertsimError::AlertLog {
            reason: format!("failed to read {}: {}", self.log_path.display(), e),
        })?;

        let mut alerts = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let raw: RawAlert =
                serde_json::from_str(line).map_err(|e| AlertsimError::AlertLog {
                    reason: format!("line {}: {}", lineno + 1, e),
                })?;

            if raw.entry_price <= 0.0 || !raw.entry_price.is_finite() {
                return Err(AlertsimError::AlertLog {
                    reason: format!(
                        "line {}: entry price out of range: {}",
                        lineno + 1,
                        raw.entry_price
                    ),
                });
            }

            let date = raw.alert_time.date();
            if date < start_date || date > end_date {
                continue;
            }

            alerts.push(Alert {
                ticker: raw.ticker,
                alert_time: raw.alert_time,
                entry_price: raw.entry_price,
                score: raw.score,
                momentum: raw.momentum,
            });
        }

        Ok(dedup_by_day(alerts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_log(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file.flush().unwrap();
        file
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_and_groups_alerts() {
        let file = write_log(concat!(
            r#"{"ticker": "RELIANCE", "alert_time": "2026-06-01T10:15:00", "entry_price": 2900.0, "score": 7.5, "momentum": 1.2}"#,
            "\n",
            r#"{"ticker": "TCS", "alert_time": "2026-06-02T11:00:00", "entry_price": 3800.0, "score": 6.0, "momentum": 0.8}"#,
            "\n",
        ));
        let adapter = JsonAlertAdapter::new(file.path().to_path_buf());

        let by_day = adapter
            .fetch_alerts(date(2026, 6, 1), date(2026, 6, 30))
            .unwrap();

        assert_eq!(by_day.len(), 2);
        assert_eq!(by_day[&date(2026, 6, 1)][0].ticker, "RELIANCE");
        assert!((by_day[&date(2026, 6, 1)][0].entry_price - 2900.0).abs() < f64::EPSILON);
    }

    #[test]
    fn deduplicates_same_day_ticker() {
        let file = write_log(concat!(
            r#"{"ticker": "RELIANCE", "alert_time": "2026-06-01T10:15:00", "entry_price": 2900.0}"#,
            "\n",
            r#"{"ticker": "RELIANCE", "alert_time": "2026-06-01T14:00:00", "entry_price": 2950.0}"#,
            "\n",
        ));
        let adapter = JsonAlertAdapter::new(file.path().to_path_buf());

        let by_day = adapter
            .fetch_alerts(date(2026, 6, 1), date(2026, 6, 30))
            .unwrap();

        assert_eq!(by_day[&date(2026, 6, 1)].len(), 1);
        assert!((by_day[&date(2026, 6, 1)][0].entry_price - 2900.0).abs() < f64::EPSILON);
    }

    #[test]
    fn filters_window_and_skips_blank_lines() {
        let file = write_log(concat!(
            r#"{"ticker": "OLD", "alert_time": "2026-05-01T10:00:00", "entry_price": 100.0}"#,
            "\n\n",
            r#"{"ticker": "NEW", "alert_time": "2026-06-03T10:00:00", "entry_price": 200.0}"#,
            "\n",
        ));
        let adapter = JsonAlertAdapter::new(file.path().to_path_buf());

        let by_day = adapter
            .fetch_alerts(date(2026, 6, 1), date(2026, 6, 30))
            .unwrap();

        assert_eq!(by_day.len(), 1);
        assert!(by_day.contains_key(&date(2026, 6, 3)));
    }

    #[test]
    fn malformed_line_aborts() {
        let file = write_log("{not json}\n");
        let adapter = JsonAlertAdapter::new(file.path().to_path_buf());

        let result = adapter.fetch_alerts(date(2026, 6, 1), date(2026, 6, 30));
        assert!(matches!(result, Err(AlertsimError::AlertLog { .. })));
    }

    #[test]
    fn nonpositive_entry_price_aborts() {
        let file = write_log(concat!(
            r#"{"ticker": "BAD", "alert_time": "2026-06-01T10:00:00", "entry_price": 0.0}"#,
            "\n",
        ));
        let adapter = JsonAlertAdapter::new(file.path().to_path_buf());

        let result = adapter.fetch_alerts(date(2026, 6, 1), date(2026, 6, 30));
        assert!(matches!(result, Err(AlertsimError::AlertLog { .. })));
    }

    #[test]
    fn missing_file_is_an_error() {
        let adapter = JsonAlertAdapter::new(PathBuf::from("/nonexistent/alerts.jsonl"));
        let result = adapter.fetch_alerts(date(2026, 6, 1), date(2026, 6, 30));
        assert!(matches!(result, Err(AlertsimError::AlertLog { .. })));
    }

    #[test]
    fn missing_optional_fields_default_to_zero() {
        let file = write_log(concat!(
            r#"{"ticker": "TCS", "alert_time": "2026-06-01T10:00:00", "entry_price": 3800.0}"#,
            "\n",
        ));
        let adapter = JsonAlertAdapter::new(file.path().to_path_buf());

        let by_day = adapter
            .fetch_alerts(date(2026, 6, 1), date(2026, 6, 30))
            .unwrap();
        let alert = &by_day[&date(2026, 6, 1)][0];
        assert!((alert.score - 0.0).abs() < f64::EPSILON);
        assert!((alert.momentum - 0.0).abs() < f64::EPSILON);
    }
}
