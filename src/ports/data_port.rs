//! Bar source port.

use crate::domain::error::AlphaLabError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `code` within the inclusive date range, oldest first.
    /// `None` bounds are open.
    fn fetch_bars(
        &self,
        code: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, AlphaLabError>;

    fn list_symbols(&self) -> Result<Vec<String>, AlphaLabError>;

    /// First date, last date and bar count, or `None` without data.
    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, AlphaLabError> {
        let bars = self.fetch_bars(code, None, None)?;
        match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Ok(Some((first.date(), last.date(), bars.len()))),
            _ => Ok(None),
        }
    }
}
