//! Hurst exponent by rescaled-range (R/S) analysis.
//!
//! Log returns of the last `lookback` prices are split into consecutive
//! chunks of each lag. Per chunk the range R of the mean-adjusted cumulative
//! sum is divided by the chunk's sample standard deviation S. The slope of
//! ln(mean R/S) against ln(lag) estimates H, clamped to [0.01, 0.99].
//!
//! H > 0.5 persistent (trending), H < 0.5 anti-persistent (mean reverting),
//! H near 0.5 random walk.

use crate::domain::stats::{linear_regression_slope, log_returns, mean, sample_std};
use std::fmt;

pub const HURST_MIN: f64 = 0.01;
pub const HURST_MAX: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HurstParams {
    pub lookback: usize,
    pub min_lag: usize,
    pub max_lag: usize,
}

impl Default for HurstParams {
    fn default() -> Self {
        Self {
            lookback: 100,
            min_lag: 2,
            max_lag: 20,
        }
    }
}

pub fn hurst_exponent(prices: &[f64], params: &HurstParams) -> Option<f64> {
    if params.lookback < 2 || prices.len() < params.lookback {
        return None;
    }
    let window = &prices[prices.len() - params.lookback..];
    let returns = log_returns(window);

    if returns.len() < params.max_lag {
        return None;
    }

    let upper = params.max_lag.min(returns.len() / 4);
    let mut points: Vec<(f64, f64)> = Vec::new();

    for lag in params.min_lag.max(1)..upper {
        let chunks = returns.len() / lag;
        let mut rs_values = Vec::with_capacity(chunks);

        for chunk in returns.chunks_exact(lag).take(chunks) {
            if let Some(rs) = rescaled_range(chunk) {
                rs_values.push(rs);
            }
        }

        if !rs_values.is_empty() {
            points.push((lag as f64, mean(&rs_values)));
        }
    }

    if points.len() < 3 {
        return None;
    }

    let log_lags: Vec<f64> = points.iter().map(|(lag, _)| lag.ln()).collect();
    let log_rs: Vec<f64> = points.iter().map(|(_, rs)| rs.ln()).collect();

    let slope = linear_regression_slope(&log_lags, &log_rs)?;
    if !slope.is_finite() {
        return None;
    }
    Some(slope.clamp(HURST_MIN, HURST_MAX))
}

/// R/S of one chunk; `None` when the chunk is shorter than 2 or flat.
fn rescaled_range(chunk: &[f64]) -> Option<f64> {
    if chunk.len() < 2 {
        return None;
    }
    let m = mean(chunk);
    let mut cumsum = 0.0;
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in chunk {
        cumsum += v - m;
        lo = lo.min(cumsum);
        hi = hi.max(cumsum);
    }
    let s = sample_std(chunk)?;
    if s > 0.0 { Some((hi - lo) / s) } else { None }
}

/// D = 2 - H for a one-dimensional series.
pub fn fractal_dimension(hurst: f64) -> f64 {
    2.0 - hurst
}

/// Expected move length in bars: persistence lengthens moves from a base
/// of 10, anti-persistence shortens them from a base of 5.
pub fn estimate_move_duration(hurst: f64) -> u32 {
    let bars = if hurst > 0.5 {
        let persistence = (hurst - 0.5) * 4.0;
        (10.0 * (1.0 + persistence)).trunc()
    } else {
        let reversion = (0.5 - hurst) * 3.0;
        (5.0 * (1.0 - reversion * 0.5)).trunc()
    };
    (bars as u32).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HurstRegime {
    Trending,
    MeanReverting,
    RandomWalk,
}

impl HurstRegime {
    pub fn classify(hurst: f64, trending_threshold: f64, mean_rev_threshold: f64) -> Self {
        if hurst > trending_threshold {
            HurstRegime::Trending
        } else if hurst < mean_rev_threshold {
            HurstRegime::MeanReverting
        } else {
            HurstRegime::RandomWalk
        }
    }
}

impl fmt::Display for HurstRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HurstRegime::Trending => write!(f, "TRENDING"),
            HurstRegime::MeanReverting => write!(f, "MEAN-REV"),
            HurstRegime::RandomWalk => write!(f, "RANDOM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random walk (xorshift) so tests need no RNG crate.
    fn walk(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        let mut price = 100.0;
        (0..n)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let u = (state % 10_000) as f64 / 10_000.0 - 0.5;
                price *= 1.0 + u * 0.02;
                price
            })
            .collect()
    }

    #[test]
    fn requires_lookback_prices() {
        let prices = walk(99, 7);
        assert!(hurst_exponent(&prices, &HurstParams::default()).is_none());
    }

    #[test]
    fn random_walk_is_in_range() {
        let prices = walk(150, 42);
        let h = hurst_exponent(&prices, &HurstParams::default()).unwrap();
        assert!((HURST_MIN..=HURST_MAX).contains(&h), "h = {h}");
    }

    #[test]
    fn constant_prices_have_no_estimate() {
        let prices = vec![50.0; 120];
        assert!(hurst_exponent(&prices, &HurstParams::default()).is_none());
    }

    #[test]
    fn short_lookback_yields_too_few_lags() {
        // lookback 21 → 20 returns → lags 2, 3, 4.
        let prices = walk(60, 3);
        let params = HurstParams {
            lookback: 21,
            min_lag: 2,
            max_lag: 20,
        };
        let h = hurst_exponent(&prices, &params);
        assert!(h.is_some());

        let params = HurstParams {
            lookback: 17,
            min_lag: 2,
            max_lag: 16,
        };
        // 16 returns → upper = 4 → lags 2, 3 only.
        assert!(hurst_exponent(&prices, &params).is_none());
    }

    #[test]
    fn alternating_returns_are_anti_persistent() {
        let mut prices = vec![100.0];
        for i in 0..119 {
            let last = *prices.last().unwrap();
            let step = if i % 2 == 0 { 1.01 } else { 1.0 / 1.01 };
            prices.push(last * step);
        }
        let h = hurst_exponent(&prices, &HurstParams::default()).unwrap();
        assert!(h < 0.5, "h = {h}");
    }

    #[test]
    fn fractal_dimension_mirrors_hurst() {
        approx::assert_abs_diff_eq!(fractal_dimension(0.7), 1.3, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(fractal_dimension(0.5), 1.5);
    }

    #[test]
    fn move_duration_buckets() {
        assert_eq!(estimate_move_duration(0.75), 20);
        assert_eq!(estimate_move_duration(0.99), 29);
        assert_eq!(estimate_move_duration(0.5), 5);
        assert_eq!(estimate_move_duration(0.3), 3);
        assert_eq!(estimate_move_duration(0.01), 1);
    }

    #[test]
    fn regime_thresholds() {
        assert_eq!(HurstRegime::classify(0.6, 0.55, 0.45), HurstRegime::Trending);
        assert_eq!(HurstRegime::classify(0.4, 0.55, 0.45), HurstRegime::MeanReverting);
        assert_eq!(HurstRegime::classify(0.5, 0.55, 0.45), HurstRegime::RandomWalk);
        assert_eq!(HurstRegime::Trending.to_string(), "TRENDING");
    }
}
