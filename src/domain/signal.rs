//! Trading signals emitted by the engines.
//!
//! A signal states intent only. Sizing into shares, order routing and fills
//! belong to the host.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalAction {
    /// Open or add to a long worth `size` of total equity.
    Buy,
    /// Close a long.
    Sell,
    /// Sell `size` (a fraction) of the current holding.
    Reduce,
    /// Move the holding to target portfolio weight `size` (may be negative).
    SetWeight,
    /// Close the symbol's position.
    Liquidate,
    /// Close every position.
    LiquidateAll,
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::Reduce => "REDUCE",
            SignalAction::SetWeight => "SET_WEIGHT",
            SignalAction::Liquidate => "LIQUIDATE",
            SignalAction::LiquidateAll => "LIQUIDATE_ALL",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub time: NaiveDateTime,
    pub symbol: String,
    pub action: SignalAction,
    pub size: f64,
    pub reason: String,
}

/// Symbol used by `LiquidateAll` signals.
pub const ALL_SYMBOLS: &str = "*";

impl Signal {
    pub fn new(
        time: NaiveDateTime,
        symbol: &str,
        action: SignalAction,
        size: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            time,
            symbol: symbol.to_string(),
            action,
            size,
            reason: reason.into(),
        }
    }

    pub fn buy(time: NaiveDateTime, symbol: &str, size: f64, reason: impl Into<String>) -> Self {
        Self::new(time, symbol, SignalAction::Buy, size, reason)
    }

    pub fn sell(time: NaiveDateTime, symbol: &str, reason: impl Into<String>) -> Self {
        Self::new(time, symbol, SignalAction::Sell, 0.0, reason)
    }

    pub fn reduce(time: NaiveDateTime, symbol: &str, fraction: f64, reason: impl Into<String>) -> Self {
        Self::new(time, symbol, SignalAction::Reduce, fraction, reason)
    }

    pub fn set_weight(time: NaiveDateTime, symbol: &str, weight: f64, reason: impl Into<String>) -> Self {
        Self::new(time, symbol, SignalAction::SetWeight, weight, reason)
    }

    pub fn liquidate(time: NaiveDateTime, symbol: &str, reason: impl Into<String>) -> Self {
        Self::new(time, symbol, SignalAction::Liquidate, 0.0, reason)
    }

    pub fn liquidate_all(time: NaiveDateTime, reason: impl Into<String>) -> Self {
        Self::new(time, ALL_SYMBOLS, SignalAction::LiquidateAll, 0.0, reason)
    }
}

/// Flat, serializable form of a [`Signal`] for CSV output.
#[derive(Debug, Clone, Serialize)]
pub struct SignalRecord {
    pub time: String,
    pub engine: String,
    pub symbol: String,
    pub action: String,
    pub size: f64,
    pub reason: String,
}

impl SignalRecord {
    pub fn from_signal(engine: &str, signal: &Signal) -> Self {
        Self {
            time: signal.time.format("%Y-%m-%d %H:%M:%S").to_string(),
            engine: engine.to_string(),
            symbol: signal.symbol.clone(),
            action: signal.action.to_string(),
            size: signal.size,
            reason: signal.reason.clone(),
        }
    }
}
