//! Historical OHLCV data access port.

use chrono::NaiveDate;

use crate::domain::error::AlertsimError;
use crate::domain::ohlcv::OhlcvBar;

/// Daily-bar provider. An unknown ticker yields `Ok` with an empty vec ("no
/// data yet", the simulator skips it); `Err` means the source itself failed
/// or returned malformed content, which aborts the run. Auth, rate limiting
/// and retry live behind the implementation.
pub trait DataPort {
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, AlertsimError>;
}
