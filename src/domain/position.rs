//! Per-symbol records of open positions.
//!
//! A record exists exactly while the engine considers the position open:
//! it is created when an entry signal is emitted and removed on exit.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedPosition {
    pub entry_price: f64,
    /// Price at which the position is stopped out; 0.0 disables the stop.
    pub stop_level: f64,
    /// Indicator reading at entry (entropy, Hurst, VPIN...).
    pub entry_indicator: f64,
    pub bars_held: u32,
    pub expected_duration: u32,
}

impl TrackedPosition {
    pub fn new(entry_price: f64, stop_level: f64, entry_indicator: f64) -> Self {
        Self {
            entry_price,
            stop_level,
            entry_indicator,
            bars_held: 0,
            expected_duration: 0,
        }
    }

    pub fn with_expected_duration(mut self, bars: u32) -> Self {
        self.expected_duration = bars;
        self
    }

    /// Return relative to entry; sign flipped for shorts.
    pub fn pnl_pct(&self, price: f64, is_long: bool) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        if is_long {
            (price - self.entry_price) / self.entry_price
        } else {
            (self.entry_price - price) / self.entry_price
        }
    }

    /// Long-only stop check: strictly below the stop level.
    pub fn should_stop(&self, price: f64) -> bool {
        self.stop_level > 0.0 && price < self.stop_level
    }

    /// Raises the stop to `candidate` if that tightens it.
    pub fn trail_stop(&mut self, candidate: f64) {
        if candidate > self.stop_level {
            self.stop_level = candidate;
        }
    }

    /// Bars held as a fraction of the expected move duration.
    pub fn duration_ratio(&self) -> f64 {
        if self.expected_duration == 0 {
            return 0.0;
        }
        self.bars_held as f64 / self.expected_duration as f64
    }
}

#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    positions: BTreeMap<String, TrackedPosition>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any existing record for the symbol.
    pub fn open(&mut self, symbol: &str, position: TrackedPosition) {
        self.positions.insert(symbol.to_string(), position);
    }

    pub fn close(&mut self, symbol: &str) -> Option<TrackedPosition> {
        self.positions.remove(symbol)
    }

    pub fn get(&self, symbol: &str) -> Option<&TrackedPosition> {
        self.positions.get(symbol)
    }

    pub fn get_mut(&mut self, symbol: &str) -> Option<&mut TrackedPosition> {
        self.positions.get_mut(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    /// Symbols with an open record, sorted.
    pub fn symbols(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }
}
