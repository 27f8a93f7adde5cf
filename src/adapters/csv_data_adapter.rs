//! CSV file data adapter.
//!
//! One file per ticker (`<TICKER>.csv`) with columns
//! date,open,high,low,close,volume. A missing file is "no data yet" and
//! yields an empty history; an unreadable or unparseable file is malformed
//! data and aborts the run.

use chrono::NaiveDate;
use std::path::PathBuf;

use crate::domain::error::AlertsimError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;

pub struct CsvDataAdapter {
    base_path: PathBuf,
}

impl CsvDataAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }
}

fn field<'a>(
    record: &'a csv::StringRecord,
    index: usize,
    name: &str,
    ticker: &str,
) -> Result<&'a str, AlertsimError> {
    record.get(index).ok_or_else(|| AlertsimError::MalformedData {
        ticker: ticker.to_string(),
        reason: format!("missing {} column", name),
    })
}

fn parse_price(value: &str, name: &str, ticker: &str) -> Result<f64, AlertsimError> {
    let parsed: f64 = value.parse().map_err(|e| AlertsimError::MalformedData {
        ticker: ticker.to_string(),
        reason: format!("invalid {} value: {}", name, e),
    })?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(AlertsimError::MalformedData {
            ticker: ticker.to_string(),
            reason: format!("{} out of range: {}", name, value),
        });
    }
    Ok(parsed)
}

impl DataPort for CsvDataAdapter {
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, AlertsimError> {
        let path = self.csv_path(ticker);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut rdr = csv::Reader::from_path(&path).map_err(|e| AlertsimError::Data {
            reason: format!("failed to open {}: {}", path.display(), e),
        })?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| AlertsimError::MalformedData {
                ticker: ticker.to_string(),
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = field(&record, 0, "date", ticker)?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                AlertsimError::MalformedData {
                    ticker: ticker.to_string(),
                    reason: format!("invalid date format: {}", e),
                }
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            let open = parse_price(field(&record, 1, "open", ticker)?, "open", ticker)?;
            let high = parse_price(field(&record, 2, "high", ticker)?, "high", ticker)?;
            let low = parse_price(field(&record, 3, "low", ticker)?, "low", ticker)?;
            let close = parse_price(field(&record, 4, "close", ticker)?, "close", ticker)?;

            let volume: i64 = field(&record, 5, "volume", ticker)?
                .parse()
                .map_err(|e| AlertsimError::MalformedData {
                    ticker: ticker.to_string(),
                    reason: format!("invalid volume value: {}", e),
                })?;
            if volume < 0 {
                return Err(AlertsimError::MalformedData {
                    ticker: ticker.to_string(),
                    reason: format!("negative volume: {}", volume),
                });
            }

            bars.push(OhlcvBar {
                ticker: ticker.to_string(),
                date,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}
