//! Volatility term-structure engine.
//!
//! Trades the index ETF on the regime of the near/mid volatility slope.
//! Backwardation reads as panic that tends to resolve upward, steep contango
//! as complacency. Exposure is scaled down when near-term volatility is high.

use crate::domain::engine::{any_invested, bar_for, SignalEngine};
use crate::domain::estimator::term_structure::{
    classify_term_structure, term_structure_slope, SlopeTracker, TermStructureRegime,
    TermStructureThresholds,
};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::risk::DrawdownGuard;
use crate::domain::rolling::RollingWindow;
use crate::domain::signal::Signal;
use crate::domain::stats::mean;
use crate::ports::config_port::ConfigPort;
use crate::ports::holdings_port::HoldingsPort;
use chrono::NaiveDateTime;
use tracing::{debug, info};

pub const SECTION: &str = "term_structure";

/// Near-term volatility level treated as normal when sizing.
const VOL_BASELINE: f64 = 20.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TermStructureConfig {
    pub traded: String,
    pub near: String,
    pub mid: String,
    pub price_history: usize,
    pub slope_history: usize,
    pub min_prices: usize,
    pub min_slopes: usize,
    pub min_slope_std: f64,
    pub thresholds: TermStructureThresholds,
    pub base_weight: f64,
    pub max_weight: f64,
    pub min_weight: f64,
    pub backwardation_boost: f64,
    pub rebalance_threshold: f64,
    pub max_drawdown: f64,
}

impl Default for TermStructureConfig {
    fn default() -> Self {
        Self {
            traded: "SPY".into(),
            near: "VXX".into(),
            mid: "VIXM".into(),
            price_history: 60,
            slope_history: 252,
            min_prices: 20,
            min_slopes: 60,
            min_slope_std: 0.001,
            thresholds: TermStructureThresholds::default(),
            base_weight: 0.6,
            max_weight: 0.95,
            min_weight: 0.1,
            backwardation_boost: 0.2,
            rebalance_threshold: 0.05,
            max_drawdown: 0.15,
        }
    }
}

fn symbol_or(config: &dyn ConfigPort, key: &str, default: String) -> String {
    config
        .get_symbols(SECTION, key, &[])
        .into_iter()
        .next()
        .unwrap_or(default)
}

impl TermStructureConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let d = Self::default();
        Self {
            traded: symbol_or(config, "traded", d.traded),
            near: symbol_or(config, "near", d.near),
            mid: symbol_or(config, "mid", d.mid),
            price_history: config.get_usize(SECTION, "price_history", d.price_history),
            slope_history: config.get_usize(SECTION, "slope_history", d.slope_history),
            min_prices: config.get_usize(SECTION, "min_prices", d.min_prices),
            min_slopes: config.get_usize(SECTION, "min_slopes", d.min_slopes),
            min_slope_std: config.get_double(SECTION, "min_slope_std", d.min_slope_std),
            thresholds: TermStructureThresholds {
                extreme_buy: config.get_double(SECTION, "zscore_extreme_buy", d.thresholds.extreme_buy),
                buy: config.get_double(SECTION, "zscore_buy", d.thresholds.buy),
                sell: config.get_double(SECTION, "zscore_sell", d.thresholds.sell),
            },
            base_weight: config.get_double(SECTION, "base_weight", d.base_weight),
            max_weight: config.get_double(SECTION, "max_weight", d.max_weight),
            min_weight: config.get_double(SECTION, "min_weight", d.min_weight),
            backwardation_boost: config.get_double(SECTION, "backwardation_boost", d.backwardation_boost),
            rebalance_threshold: config.get_double(SECTION, "rebalance_threshold", d.rebalance_threshold),
            max_drawdown: config.get_double(SECTION, "max_drawdown", d.max_drawdown),
        }
    }

    /// Unscaled weight for a regime.
    pub fn regime_weight(&self, regime: TermStructureRegime) -> f64 {
        match regime {
            TermStructureRegime::ExtremeBackwardation => self.max_weight,
            TermStructureRegime::Backwardation => self.base_weight + self.backwardation_boost,
            TermStructureRegime::SteepContango => self.min_weight,
            TermStructureRegime::Neutral => self.base_weight,
            TermStructureRegime::RiskOff => 0.0,
        }
    }
}

/// Shrinks exposure when recent near-term volatility sits above the
/// baseline, and grows it up to 1.5x when below. Levels under 10 count as 10.
pub fn vol_scalar(recent_near: &[f64]) -> f64 {
    (VOL_BASELINE / mean(recent_near).max(10.0)).min(1.5)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub time: NaiveDateTime,
    pub increase: bool,
    pub weight: f64,
    pub regime: TermStructureRegime,
}

pub struct TermStructureEngine {
    config: TermStructureConfig,
    near_prices: RollingWindow,
    mid_prices: RollingWindow,
    traded_price: Option<f64>,
    slopes: SlopeTracker,
    regime: TermStructureRegime,
    last_zscore: Option<f64>,
    trades: Vec<Trade>,
    guard: DrawdownGuard,
}

impl TermStructureEngine {
    pub fn new(config: TermStructureConfig) -> Self {
        Self {
            near_prices: RollingWindow::new(config.price_history),
            mid_prices: RollingWindow::new(config.price_history),
            traded_price: None,
            slopes: SlopeTracker::new(config.slope_history, config.min_slopes, config.min_slope_std),
            regime: TermStructureRegime::Neutral,
            last_zscore: None,
            trades: Vec::new(),
            guard: DrawdownGuard::new(config.max_drawdown),
            config,
        }
    }

    pub fn regime(&self) -> TermStructureRegime {
        self.regime
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    fn analyze(&mut self) {
        if self.near_prices.len() < self.config.min_prices || self.mid_prices.len() < self.config.min_prices {
            return;
        }
        let (Some(near), Some(mid)) = (self.near_prices.last(), self.mid_prices.last()) else {
            return;
        };
        let Some(slope) = term_structure_slope(near, mid) else {
            return;
        };
        let Some(z) = self.slopes.push(slope) else {
            return;
        };
        self.last_zscore = Some(z);

        let next = classify_term_structure(z, &self.config.thresholds);
        if next != self.regime {
            debug!(from = %self.regime, to = %next, zscore = z, slope, "term structure regime change");
        }
        self.regime = next;
    }

    /// Regime weight scaled by near-term volatility and clamped to
    /// `[0, max_weight]`.
    pub fn target_weight(&self) -> f64 {
        let mut target = self.config.regime_weight(self.regime);
        if self.near_prices.len() >= 5 {
            target *= vol_scalar(&self.near_prices.tail(5));
        }
        target.clamp(0.0, self.config.max_weight)
    }

    fn execute(&mut self, time: NaiveDateTime, holdings: &dyn HoldingsPort) -> Vec<Signal> {
        if self.traded_price.is_none_or(|p| p <= 0.0) {
            return Vec::new();
        }
        let target = self.target_weight();
        let current = holdings.weight(&self.config.traded);
        if (target - current).abs() <= self.config.rebalance_threshold {
            return Vec::new();
        }

        let increase = target > current;
        debug!(regime = %self.regime, target, current, "term structure rebalance");
        self.trades.push(Trade {
            time,
            increase,
            weight: target,
            regime: self.regime,
        });
        vec![Signal::set_weight(
            time,
            &self.config.traded,
            target,
            format!("{} {}", if increase { "BUY" } else { "REDUCE" }, self.regime),
        )]
    }
}

impl SignalEngine for TermStructureEngine {
    fn name(&self) -> &'static str {
        SECTION
    }

    fn symbols(&self) -> Vec<String> {
        vec![
            self.config.traded.clone(),
            self.config.near.clone(),
            self.config.mid.clone(),
        ]
    }

    fn on_data(&mut self, time: NaiveDateTime, bars: &[OhlcvBar], holdings: &dyn HoldingsPort) -> Vec<Signal> {
        if let Some(b) = bar_for(bars, &self.config.near) {
            self.near_prices.push(b.close);
        }
        if let Some(b) = bar_for(bars, &self.config.mid) {
            self.mid_prices.push(b.close);
        }
        if let Some(b) = bar_for(bars, &self.config.traded) {
            self.traded_price = Some(b.close);
        }

        if let Some(equity) = holdings.total_value() {
            if let Some(drawdown) = self.guard.update(equity) {
                self.regime = TermStructureRegime::RiskOff;
                if any_invested(holdings, &self.symbols()) {
                    info!(drawdown, "term structure drawdown stop");
                    return vec![Signal::liquidate_all(time, format!("drawdown {:.2}%", drawdown * 100.0))];
                }
            }
        }
        Vec::new()
    }

    fn on_schedule(&mut self, time: NaiveDateTime, holdings: &dyn HoldingsPort) -> Vec<Signal> {
        self.analyze();
        self.execute(time, holdings)
    }

    fn summary(&self) -> Vec<String> {
        let buys = self.trades.iter().filter(|t| t.increase).count();
        let mut lines = vec![
            format!("regime {}", self.regime),
            format!("trades {} ({} buys, {} reductions)", self.trades.len(), buys, self.trades.len() - buys),
        ];
        if let (Some(slope), Some(z)) = (self.slopes.last(), self.last_zscore) {
            lines.push(format!("last slope {slope:.4} z-score {z:.2}"));
        }
        lines
    }
}
