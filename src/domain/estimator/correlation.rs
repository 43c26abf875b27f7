//! Realized vs. implied correlation for dispersion signals.
//!
//! Realized correlation is the mean pairwise Pearson correlation of the
//! component return series. Implied correlation is proxied from the ratio
//! of index volatility to average component volatility:
//! `clamp((σ_index / avg σ_i)² - 0.3, 0, 1)`.
//! The spread (implied - realized) is z-scored against its own history.

use crate::domain::rolling::RollingWindow;
use crate::domain::stats::{clip, mean, pearson_correlation, population_std};

pub const TRADING_DAYS: f64 = 252.0;

pub fn realized_correlation(series: &[Vec<f64>]) -> Option<f64> {
    let mut correlations = Vec::new();
    for i in 0..series.len() {
        for j in (i + 1)..series.len() {
            if let Some(c) = pearson_correlation(&series[i], &series[j]) {
                correlations.push(c);
            }
        }
    }
    if correlations.is_empty() {
        None
    } else {
        Some(mean(&correlations))
    }
}

pub fn annualized_volatility(returns: &[f64], periods_per_year: f64) -> f64 {
    population_std(returns) * periods_per_year.sqrt()
}

pub fn implied_correlation_proxy(index_vol: f64, avg_component_vol: f64) -> f64 {
    if avg_component_vol > 0.0 {
        let ratio = index_vol / avg_component_vol;
        clip(ratio * ratio - 0.3, 0.0, 1.0)
    } else {
        0.5
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationReading {
    pub realized: f64,
    pub implied: f64,
    pub spread: f64,
}

/// Histories of realized/implied correlation and their spread, plus the
/// normalized signal in [-1, 1] derived from the spread's z-score.
#[derive(Debug, Clone)]
pub struct CorrelationSpreadTracker {
    realized: RollingWindow,
    implied: RollingWindow,
    spreads: RollingWindow,
    min_history: usize,
    min_std: f64,
    signal: f64,
}

impl CorrelationSpreadTracker {
    pub fn new(capacity: usize, min_history: usize, min_std: f64) -> Self {
        Self {
            realized: RollingWindow::new(capacity),
            implied: RollingWindow::new(capacity),
            spreads: RollingWindow::new(capacity),
            min_history,
            min_std,
            signal: 0.0,
        }
    }

    /// Records a reading and returns the updated signal.
    pub fn push(&mut self, realized: f64, implied: f64) -> f64 {
        let spread = implied - realized;
        self.realized.push(realized);
        self.implied.push(implied);
        self.spreads.push(spread);

        self.signal = if self.spreads.len() >= self.min_history {
            let history = self.spreads.to_vec();
            let std = population_std(&history);
            if std > self.min_std {
                clip((spread - mean(&history)) / std / 2.0, -1.0, 1.0)
            } else {
                0.0
            }
        } else {
            0.0
        };
        self.signal
    }

    pub fn signal(&self) -> f64 {
        self.signal
    }

    pub fn last(&self) -> Option<CorrelationReading> {
        Some(CorrelationReading {
            realized: self.realized.last()?,
            implied: self.implied.last()?,
            spread: self.spreads.last()?,
        })
    }

    pub fn average_realized(&self) -> Option<f64> {
        (!self.realized.is_empty()).then(|| mean(&self.realized.to_vec()))
    }

    pub fn average_implied(&self) -> Option<f64> {
        (!self.implied.is_empty()).then(|| mean(&self.implied.to_vec()))
    }

    pub fn len(&self) -> usize {
        self.spreads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spreads.is_empty()
    }
}

impl Default for CorrelationSpreadTracker {
    fn default() -> Self {
        Self::new(252, 60, 0.01)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn realized_correlation_averages_pairs() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![2.0, 4.0, 6.0, 8.0];
        let c = vec![4.0, 3.0, 2.0, 1.0];
        // pairs: ab = 1, ac = -1, bc = -1
        let r = realized_correlation(&[a, b, c]).unwrap();
        assert_abs_diff_eq!(r, -1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn realized_correlation_skips_undefined_pairs() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![3.0, 5.0, 7.0];
        let flat = vec![1.0, 1.0, 1.0];
        let r = realized_correlation(&[a, b, flat.clone()]).unwrap();
        assert_abs_diff_eq!(r, 1.0, epsilon = 1e-12);
        assert!(realized_correlation(&[flat.clone(), flat]).is_none());
        assert!(realized_correlation(&[]).is_none());
    }

    #[test]
    fn implied_proxy_is_clamped() {
        assert_abs_diff_eq!(implied_correlation_proxy(0.2, 0.2), 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(implied_correlation_proxy(0.1, 0.4), 0.0);
        assert_abs_diff_eq!(implied_correlation_proxy(0.5, 0.2), 1.0);
        assert_abs_diff_eq!(implied_correlation_proxy(0.5, 0.0), 0.5);
    }

    #[test]
    fn annualized_vol_scales_by_sqrt_periods() {
        let r = [0.01, -0.01, 0.01, -0.01];
        assert_abs_diff_eq!(annualized_volatility(&r, 252.0), 0.01 * 252f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn tracker_signal_zero_until_history() {
        let mut t = CorrelationSpreadTracker::new(252, 5, 0.01);
        for i in 0..4 {
            assert_eq!(t.push(0.3, 0.3 + i as f64 * 0.1), 0.0);
        }
        let s = t.push(0.3, 1.0);
        assert!(s > 0.0 && s <= 1.0);
        assert_eq!(t.len(), 5);
    }

    #[test]
    fn tracker_signal_zero_for_flat_spread() {
        let mut t = CorrelationSpreadTracker::new(252, 3, 0.01);
        for _ in 0..10 {
            t.push(0.4, 0.5);
        }
        assert_eq!(t.signal(), 0.0);
        let last = t.last().unwrap();
        assert_abs_diff_eq!(last.spread, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(t.average_realized().unwrap(), 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(t.average_implied().unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn tracker_signal_negative_when_spread_collapses() {
        let mut t = CorrelationSpreadTracker::new(252, 5, 0.01);
        for i in 0..10 {
            t.push(0.2, 0.5 + (i % 2) as f64 * 0.1);
        }
        let s = t.push(0.9, 0.1);
        assert_abs_diff_eq!(s, -1.0);
    }
}
