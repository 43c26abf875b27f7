//! Read-only view of the host's portfolio.
//!
//! Engines only need the direction and size of each holding expressed as a
//! portfolio weight, plus total equity for drawdown guards.

use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::Signal;

pub trait HoldingsPort {
    /// Signed portfolio weight of `symbol`; 0.0 when flat.
    fn weight(&self, symbol: &str) -> f64;

    fn is_invested(&self, symbol: &str) -> bool {
        self.weight(symbol) != 0.0
    }

    /// Total portfolio value, when the host tracks one.
    fn total_value(&self) -> Option<f64> {
        None
    }
}

/// Holdings that can be moved by applying signals directly, without fills.
pub trait LedgerPort: HoldingsPort {
    /// Revalues the holdings at the closes of one timestamp's bars.
    fn mark(&mut self, bars: &[OhlcvBar]);

    fn apply(&mut self, signal: &Signal);
}
