#![allow(dead_code)]

use alphalab::domain::error::AlphaLabError;
pub use alphalab::domain::ohlcv::OhlcvBar;
use alphalab::ports::data_port::DataPort;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use std::collections::{BTreeMap, HashMap};

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

    pub fn with_bars(mut self, code: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        code: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, AlphaLabError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(AlphaLabError::Data {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(code).ok_or_else(|| AlphaLabError::NoData {
            code: code.to_string(),
        })?;
        Ok(bars
            .iter()
            .filter(|b| start_date.is_none_or(|s| b.date() >= s) && end_date.is_none_or(|e| b.date() <= e))
            .cloned()
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, AlphaLabError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// Deterministic uniform draws in [0, 1).
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407))
    }

    pub fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `count` weekdays from `start` (inclusive when it is a weekday).
pub fn trading_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(count);
    let mut day = start;
    while days.len() < count {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(day);
        }
        day += Duration::days(1);
    }
    days
}

pub fn make_bar(code: &str, time: NaiveDateTime, close: f64, volume: f64) -> OhlcvBar {
    OhlcvBar {
        code: code.to_string(),
        time,
        open: close,
        high: close * 1.002,
        low: close * 0.998,
        close,
        volume,
    }
}

/// One bar per trading day at midnight.
pub fn daily_bars(code: &str, start: NaiveDate, closes: &[f64]) -> Vec<OhlcvBar> {
    trading_days(start, closes.len())
        .into_iter()
        .zip(closes)
        .map(|(d, &c)| make_bar(code, d.and_hms_opt(0, 0, 0).unwrap(), c, 1_000_000.0))
        .collect()
}

/// Seven hourly bars (10:00 to 16:00) per trading day along a noisy walk.
pub fn hourly_walk(code: &str, start: NaiveDate, days: usize, seed: u64, start_price: f64) -> Vec<OhlcvBar> {
    let mut rng = Lcg::new(seed);
    let mut price = start_price;
    let mut bars = Vec::with_capacity(days * 7);
    for day in trading_days(start, days) {
        for hour in 10..17 {
            price *= 1.0 + 0.004 * (rng.next_f64() - 0.5) * 2.0;
            let volume = 20_000.0 + 60_000.0 * rng.next_f64();
            bars.push(make_bar(code, day.and_hms_opt(hour, 0, 0).unwrap(), price, volume));
        }
    }
    bars
}

pub fn by_symbol(series: Vec<Vec<OhlcvBar>>) -> BTreeMap<String, Vec<OhlcvBar>> {
    series
        .into_iter()
        .filter_map(|bars| Some((bars.first()?.code.clone(), bars)))
        .collect()
}

/// Closes that fall, rally, then fall again.
pub fn swing_closes() -> Vec<f64> {
    let mut closes = Vec::new();
    closes.extend((0..20).map(|i| 100.0 - i as f64));
    closes.extend((0..25).map(|i| 81.0 + 2.0 * i as f64));
    closes.extend((0..25).map(|i| 129.0 - 2.0 * i as f64));
    closes
}

pub fn to_csv(bars: &[OhlcvBar]) -> String {
    let mut out = String::from("time,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.time.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}
