//! Volatility term-structure slope and its regime.
//!
//! slope = near / mid - 1: positive is backwardation (acute fear), negative
//! is contango (complacency). The slope is z-scored against its own
//! history and bucketed into regimes.

use crate::domain::rolling::RollingWindow;
use crate::domain::stats::zscore;
use std::fmt;

pub fn term_structure_slope(near: f64, mid: f64) -> Option<f64> {
    if mid <= 0.0 {
        return None;
    }
    Some(near / mid - 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermStructureRegime {
    ExtremeBackwardation,
    Backwardation,
    SteepContango,
    Neutral,
    RiskOff,
}

impl fmt::Display for TermStructureRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TermStructureRegime::ExtremeBackwardation => "EXTREME_BACKWARDATION",
            TermStructureRegime::Backwardation => "BACKWARDATION",
            TermStructureRegime::SteepContango => "STEEP_CONTANGO",
            TermStructureRegime::Neutral => "NEUTRAL",
            TermStructureRegime::RiskOff => "RISK_OFF",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermStructureThresholds {
    pub extreme_buy: f64,
    pub buy: f64,
    pub sell: f64,
}

impl Default for TermStructureThresholds {
    fn default() -> Self {
        Self {
            extreme_buy: -2.5,
            buy: -1.5,
            sell: 1.5,
        }
    }
}

pub fn classify_term_structure(z: f64, t: &TermStructureThresholds) -> TermStructureRegime {
    if z < t.extreme_buy {
        TermStructureRegime::ExtremeBackwardation
    } else if z < t.buy {
        TermStructureRegime::Backwardation
    } else if z > t.sell {
        TermStructureRegime::SteepContango
    } else {
        TermStructureRegime::Neutral
    }
}

/// Slope history with z-scoring. `push` returns the z-score of the new
/// slope once `min_history` slopes (including it) are held and their
/// std is at least `min_std`.
#[derive(Debug, Clone)]
pub struct SlopeTracker {
    slopes: RollingWindow,
    min_history: usize,
    min_std: f64,
}

impl SlopeTracker {
    pub fn new(capacity: usize, min_history: usize, min_std: f64) -> Self {
        Self {
            slopes: RollingWindow::new(capacity),
            min_history,
            min_std,
        }
    }

    pub fn push(&mut self, slope: f64) -> Option<f64> {
        self.slopes.push(slope);
        if self.slopes.len() < self.min_history {
            return None;
        }
        zscore(slope, &self.slopes.to_vec(), self.min_std)
    }

    pub fn last(&self) -> Option<f64> {
        self.slopes.last()
    }

    pub fn len(&self) -> usize {
        self.slopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slopes.is_empty()
    }
}
