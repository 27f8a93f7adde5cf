//! Alert feed access port.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::domain::alert::Alert;
use crate::domain::error::AlertsimError;

/// Notification-log reader. Returns alerts grouped by calendar date within
/// the window, already deduplicated to one alert per ticker per day
/// (first-seen wins).
pub trait AlertPort {
    fn fetch_alerts(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, Vec<Alert>>, AlertsimError>;
}
