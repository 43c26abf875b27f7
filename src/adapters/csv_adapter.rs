//! CSV bar files, one per symbol, named `{code}_{exchange}.csv`.
//!
//! Columns: `time,open,high,low,close,volume`. The time column takes a
//! date or a date-time (see [`parse_timestamp`]), so daily, hourly and
//! minute files share the format.

use crate::domain::error::AlphaLabError;
use crate::domain::ohlcv::{parse_timestamp, OhlcvBar};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use csv::StringRecord;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
    exchange: String,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf, exchange: &str) -> Self {
        Self {
            base_path,
            exchange: exchange.to_string(),
        }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", code, self.exchange))
    }
}

fn column(record: &StringRecord, index: usize, name: &str) -> Result<f64, AlphaLabError> {
    record
        .get(index)
        .ok_or_else(|| AlphaLabError::Data {
            reason: format!("missing {} column", name),
        })?
        .trim()
        .parse()
        .map_err(|e| AlphaLabError::Data {
            reason: format!("invalid {} value: {}", name, e),
        })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        code: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, AlphaLabError> {
        let path = self.csv_path(code);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AlphaLabError::NoData {
                code: code.to_string(),
            },
            _ => AlphaLabError::Data {
                reason: format!("failed to read {}: {}", path.display(), e),
            },
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| AlphaLabError::Data {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let time_str = record.get(0).ok_or_else(|| AlphaLabError::Data {
                reason: "missing time column".into(),
            })?;
            let time = parse_timestamp(time_str).ok_or_else(|| AlphaLabError::Data {
                reason: format!("invalid timestamp '{}'", time_str),
            })?;

            let date = time.date();
            if start_date.is_some_and(|s| date < s) || end_date.is_some_and(|e| date > e) {
                continue;
            }

            bars.push(OhlcvBar {
                code: code.to_string(),
                time,
                open: column(&record, 1, "open")?,
                high: column(&record, 2, "high")?,
                low: column(&record, 3, "low")?,
                close: column(&record, 4, "close")?,
                volume: column(&record, 5, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.time);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, AlphaLabError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| AlphaLabError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{}.csv", self.exchange);
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| AlphaLabError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(code) = name_str.strip_suffix(&suffix) {
                symbols.push(code.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
