//! In-memory holdings for offline replays.
//!
//! Tracks one target weight per symbol and applies signals to it
//! directly. Equity is marked from the weights and each bar's close
//! return, as if the book were rebalanced to its weights every bar. There
//! is no cash, no fills and no fees.

use crate::domain::config_validation::DEFAULT_INITIAL_VALUE;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::{Signal, SignalAction};
use crate::ports::holdings_port::{HoldingsPort, LedgerPort};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct PaperLedger {
    weights: BTreeMap<String, f64>,
    last_close: HashMap<String, f64>,
    equity: f64,
}

impl Default for PaperLedger {
    fn default() -> Self {
        Self::with_initial_value(DEFAULT_INITIAL_VALUE)
    }
}

impl PaperLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_value(value: f64) -> Self {
        Self {
            weights: BTreeMap::new(),
            last_close: HashMap::new(),
            equity: value,
        }
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    /// Applies the weighted close-to-close return of `bars` to equity.
    /// A symbol's first bar only records its close.
    pub fn mark(&mut self, bars: &[OhlcvBar]) {
        let mut portfolio_return = 0.0;
        for bar in bars {
            if let Some(prev) = self.last_close.insert(bar.code.clone(), bar.close) {
                let weight = self.weight(&bar.code);
                if weight != 0.0 && prev > 0.0 {
                    portfolio_return += weight * (bar.close / prev - 1.0);
                }
            }
        }
        self.equity = (self.equity * (1.0 + portfolio_return)).max(0.0);
    }

    pub fn apply(&mut self, signal: &Signal) {
        match signal.action {
            SignalAction::Buy | SignalAction::SetWeight => self.set(&signal.symbol, signal.size),
            SignalAction::Sell | SignalAction::Liquidate => {
                self.weights.remove(&signal.symbol);
            }
            SignalAction::Reduce => {
                let current = self.weight(&signal.symbol);
                self.set(&signal.symbol, current * (1.0 - signal.size));
            }
            SignalAction::LiquidateAll => self.weights.clear(),
        }
    }

    fn set(&mut self, symbol: &str, weight: f64) {
        if weight.abs() < 1e-12 {
            self.weights.remove(symbol);
        } else {
            self.weights.insert(symbol.to_string(), weight);
        }
    }

    /// Non-zero holdings, sorted by symbol.
    pub fn holdings(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(s, w)| (s.as_str(), *w))
    }

    pub fn gross_exposure(&self) -> f64 {
        self.weights.values().map(|w| w.abs()).sum()
    }
}

impl LedgerPort for PaperLedger {
    fn mark(&mut self, bars: &[OhlcvBar]) {
        PaperLedger::mark(self, bars);
    }

    fn apply(&mut self, signal: &Signal) {
        PaperLedger::apply(self, signal);
    }
}

impl HoldingsPort for PaperLedger {
    fn weight(&self, symbol: &str) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }

    fn total_value(&self) -> Option<f64> {
        Some(self.equity)
    }
}
