//! Volume-synchronized probability of informed trading (VPIN).
//!
//! Bars are split into buy and sell volume by bulk volume classification
//! (BVC): the bar's log price change, standardized by recent return
//! volatility, is mapped through the normal CDF to a buy probability.
//! Classified volume fills equal-size buckets; a bucket's order imbalance
//! is |buy - sell|. VPIN is the summed imbalance of the last `n_buckets`
//! buckets divided by their total volume, so it lies in [0, 1].

use crate::domain::rolling::RollingWindow;
use crate::domain::stats::{log_returns, normal_cdf, population_std};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VpinParams {
    pub bucket_size: f64,
    pub n_buckets: usize,
    pub sigma_lookback: usize,
    pub price_history: usize,
    pub vpin_history: usize,
}

impl Default for VpinParams {
    fn default() -> Self {
        Self {
            bucket_size: 50_000.0,
            n_buckets: 50,
            sigma_lookback: 20,
            price_history: 100,
            vpin_history: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeBucket {
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub order_imbalance: f64,
}

/// Estimated buy volume of a bar given the closes that preceded it.
///
/// With fewer than `sigma_lookback` prior closes the bar is split evenly.
pub fn bvc_buy_volume(prior_closes: &[f64], close: f64, volume: f64, sigma_lookback: usize) -> f64 {
    if prior_closes.len() < sigma_lookback || prior_closes.is_empty() {
        return volume * 0.5;
    }
    let recent = &prior_closes[prior_closes.len() - sigma_lookback..];
    let returns = log_returns(recent);
    let sigma = if returns.is_empty() {
        0.01
    } else {
        population_std(&returns)
    };

    let prev = prior_closes[prior_closes.len() - 1];
    let change = (close / prev).ln();
    let z = if sigma > 0.0 && change.is_finite() {
        change / sigma
    } else {
        0.0
    };
    volume * normal_cdf(z)
}

/// Accumulates classified volume into fixed-size buckets.
#[derive(Debug, Clone)]
pub struct VolumeBucketer {
    bucket_size: f64,
    n_buckets: usize,
    volume: f64,
    buy_volume: f64,
    completed: Vec<VolumeBucket>,
}

impl VolumeBucketer {
    pub fn new(bucket_size: f64, n_buckets: usize) -> Self {
        Self {
            bucket_size,
            n_buckets: n_buckets.max(1),
            volume: 0.0,
            buy_volume: 0.0,
            completed: Vec::with_capacity(n_buckets),
        }
    }

    /// Adds volume and returns the number of buckets completed by it.
    /// Overflow beyond a bucket carries into the next one with the same
    /// buy share.
    pub fn add(&mut self, volume: f64, buy_volume: f64) -> usize {
        self.fill(volume, buy_volume).0
    }

    /// Like [`add`](Self::add), but returns the VPIN measured after each
    /// completed bucket once the bucket window is full.
    pub fn add_and_measure(&mut self, volume: f64, buy_volume: f64) -> Vec<f64> {
        self.fill(volume, buy_volume).1
    }

    fn fill(&mut self, volume: f64, buy_volume: f64) -> (usize, Vec<f64>) {
        let mut readings = Vec::new();
        if volume <= 0.0 || self.bucket_size <= 0.0 {
            return (0, readings);
        }
        self.volume += volume;
        self.buy_volume += buy_volume;

        let mut closed = 0;
        while self.volume >= self.bucket_size {
            let overflow = self.volume - self.bucket_size;
            let ratio = if self.volume > 0.0 {
                overflow / self.volume
            } else {
                0.0
            };

            let buy = self.buy_volume * (1.0 - ratio);
            let sell = self.bucket_size - buy;
            self.push_bucket(VolumeBucket {
                buy_volume: buy,
                sell_volume: sell,
                order_imbalance: (buy - sell).abs(),
            });
            if let Some(v) = self.vpin() {
                readings.push(v);
            }

            self.buy_volume *= ratio;
            self.volume = overflow;
            closed += 1;
        }
        (closed, readings)
    }

    fn push_bucket(&mut self, bucket: VolumeBucket) {
        if self.completed.len() == self.n_buckets {
            self.completed.remove(0);
        }
        self.completed.push(bucket);
    }

    pub fn buckets(&self) -> &[VolumeBucket] {
        &self.completed
    }

    pub fn pending_volume(&self) -> f64 {
        self.volume
    }

    pub fn is_ready(&self) -> bool {
        self.completed.len() >= self.n_buckets
    }

    pub fn vpin(&self) -> Option<f64> {
        if !self.is_ready() {
            return None;
        }
        let imbalance: f64 = self.completed.iter().map(|b| b.order_imbalance).sum();
        let total = self.n_buckets as f64 * self.bucket_size;
        if total > 0.0 {
            Some(imbalance / total)
        } else {
            Some(0.0)
        }
    }
}

/// Per-symbol VPIN state: close history for BVC, the bucketer and the
/// series of VPIN readings (one per completed bucket once warm).
#[derive(Debug, Clone)]
pub struct VpinCalculator {
    params: VpinParams,
    prices: RollingWindow,
    bucketer: VolumeBucketer,
    history: RollingWindow,
}

impl VpinCalculator {
    pub fn new(params: VpinParams) -> Self {
        Self {
            prices: RollingWindow::new(params.price_history),
            bucketer: VolumeBucketer::new(params.bucket_size, params.n_buckets),
            history: RollingWindow::new(params.vpin_history),
            params,
        }
    }

    /// Feeds one bar. Returns the latest VPIN if this bar completed a
    /// bucket while the bucket window was full.
    pub fn update(&mut self, close: f64, volume: f64) -> Option<f64> {
        let mut latest = None;
        if volume > 0.0 {
            let prior = self.prices.to_vec();
            let buy = bvc_buy_volume(&prior, close, volume, self.params.sigma_lookback);
            for v in self.bucketer.add_and_measure(volume, buy) {
                self.history.push(v);
                latest = Some(v);
            }
        }
        self.prices.push(close);
        latest
    }

    pub fn current(&self) -> Option<f64> {
        self.history.last()
    }

    pub fn history(&self) -> &RollingWindow {
        &self.history
    }

    pub fn prices(&self) -> &RollingWindow {
        &self.prices
    }

    pub fn bucketer(&self) -> &VolumeBucketer {
        &self.bucketer
    }
}
