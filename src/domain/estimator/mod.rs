//! Streaming statistical estimators.
//!
//! Each submodule is a pure computation over a rolling buffer:
//! - `permutation_entropy`: ordinal-pattern entropy in [0, 1]
//! - `hurst`: R/S Hurst exponent in [0.01, 0.99], fractal dimension
//! - `vpin`: bulk volume classification and volume-bucket VPIN in [0, 1]
//! - `correlation`: realized vs. implied correlation spread
//! - `relative_strength`: RS level, velocity and acceleration
//! - `term_structure`: volatility curve slope and regime
//! - `sma`: moving average crossover

pub mod correlation;
pub mod hurst;
pub mod permutation_entropy;
pub mod relative_strength;
pub mod sma;
pub mod term_structure;
pub mod vpin;

use crate::domain::error::AlphaLabError;
use crate::domain::ohlcv::OhlcvBar;
use std::fmt;
use std::str::FromStr;

/// Estimators that can be run standalone over one symbol's bar history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EstimatorKind {
    PermutationEntropy { embedding_dim: usize, tau: usize },
    Hurst,
    Vpin,
}

impl EstimatorKind {
    /// Fewest bars that can produce a reading with default parameters.
    /// VPIN also needs enough volume to fill its buckets.
    pub fn min_bars(&self) -> usize {
        match *self {
            EstimatorKind::PermutationEntropy { embedding_dim, tau } => {
                embedding_dim + embedding_dim.saturating_sub(1) * tau
            }
            EstimatorKind::Hurst => hurst::HurstParams::default().lookback,
            EstimatorKind::Vpin => vpin::VpinParams::default().n_buckets,
        }
    }
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatorKind::PermutationEntropy { embedding_dim, tau } => {
                write!(f, "ENTROPY({},{})", embedding_dim, tau)
            }
            EstimatorKind::Hurst => write!(f, "HURST"),
            EstimatorKind::Vpin => write!(f, "VPIN"),
        }
    }
}

impl FromStr for EstimatorKind {
    type Err = AlphaLabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "entropy" | "permutation_entropy" => Ok(EstimatorKind::PermutationEntropy {
                embedding_dim: 5,
                tau: 1,
            }),
            "hurst" => Ok(EstimatorKind::Hurst),
            "vpin" => Ok(EstimatorKind::Vpin),
            other => Err(AlphaLabError::UnknownEstimator {
                name: other.to_string(),
            }),
        }
    }
}

/// Computes the estimator over the whole history with default parameters.
/// Entropy uses the newest 120 closes, Hurst the newest 100.
pub fn estimate(kind: EstimatorKind, bars: &[OhlcvBar]) -> Option<f64> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    match kind {
        EstimatorKind::PermutationEntropy { embedding_dim, tau } => {
            let start = closes.len().saturating_sub(120);
            permutation_entropy::permutation_entropy(&closes[start..], embedding_dim, tau)
        }
        EstimatorKind::Hurst => hurst::hurst_exponent(&closes, &hurst::HurstParams::default()),
        EstimatorKind::Vpin => {
            let mut calc = vpin::VpinCalculator::new(vpin::VpinParams::default());
            for bar in bars {
                calc.update(bar.close, bar.volume);
            }
            calc.current()
        }
    }
}
