//! Hurst-exponent breakout engine.
//!
//! Daily R/S analysis classifies each symbol as trending, mean reverting or
//! random. While trending, a close beyond the prior 20-bar range (widened by
//! a volatility-scaled margin) opens a long, and a breakdown rotates into the
//! hedge asset. Holding time is budgeted from the Hurst reading.

use crate::domain::engine::{bar_for, SignalEngine};
use crate::domain::estimator::hurst::{
    estimate_move_duration, fractal_dimension, hurst_exponent, HurstParams, HurstRegime,
};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::position::{PositionBook, TrackedPosition};
use crate::domain::rolling::RollingWindow;
use crate::domain::signal::Signal;
use crate::domain::stats::{clip, log_returns, population_std};
use crate::ports::config_port::ConfigPort;
use crate::ports::holdings_port::HoldingsPort;
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub const SECTION: &str = "fractal";

/// Hourly bars per year, for annualizing volatility.
const PERIODS_PER_YEAR: f64 = 252.0 * 6.5;

#[derive(Debug, Clone, PartialEq)]
pub struct FractalConfig {
    pub symbols: Vec<String>,
    pub hedge: String,
    pub hurst: HurstParams,
    pub buffer: usize,
    pub history: usize,
    pub min_readings: usize,
    pub breakout_lookback: usize,
    pub trending_threshold: f64,
    pub mean_rev_threshold: f64,
    pub max_position: f64,
    pub base_stop: f64,
}

impl Default for FractalConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["SPY".into(), "QQQ".into()],
            hedge: "TLT".into(),
            hurst: HurstParams::default(),
            buffer: 150,
            history: 48,
            min_readings: 5,
            breakout_lookback: 20,
            trending_threshold: 0.55,
            mean_rev_threshold: 0.45,
            max_position: 0.35,
            base_stop: 0.025,
        }
    }
}

impl FractalConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let d = Self::default();
        let hedge = config
            .get_symbols(SECTION, "hedge", &[])
            .into_iter()
            .next()
            .unwrap_or(d.hedge);
        Self {
            symbols: config.get_symbols(SECTION, "symbols", &["SPY", "QQQ"]),
            hedge,
            hurst: HurstParams {
                lookback: config.get_usize(SECTION, "hurst_lookback", d.hurst.lookback),
                min_lag: config.get_usize(SECTION, "min_lag", d.hurst.min_lag),
                max_lag: config.get_usize(SECTION, "max_lag", d.hurst.max_lag),
            },
            buffer: config.get_usize(SECTION, "buffer", d.buffer),
            history: config.get_usize(SECTION, "history", d.history),
            min_readings: config.get_usize(SECTION, "min_readings", d.min_readings),
            breakout_lookback: config.get_usize(SECTION, "breakout_lookback", d.breakout_lookback),
            trending_threshold: config.get_double(SECTION, "trending_threshold", d.trending_threshold),
            mean_rev_threshold: config.get_double(SECTION, "mean_rev_threshold", d.mean_rev_threshold),
            max_position: config.get_double(SECTION, "max_position", d.max_position),
            base_stop: config.get_double(SECTION, "base_stop", d.base_stop),
        }
    }

    fn all_symbols(&self) -> Vec<String> {
        let mut all = self.symbols.clone();
        if !all.contains(&self.hedge) {
            all.push(self.hedge.clone());
        }
        all
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakoutLevels {
    pub high: f64,
    pub low: f64,
    /// Annualized population volatility of the window's log returns.
    pub volatility: f64,
}

impl BreakoutLevels {
    /// Levels over `window`, which must not contain the bar being tested.
    pub fn from_window(window: &[f64]) -> Option<Self> {
        if window.len() < 2 {
            return None;
        }
        let high = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let low = window.iter().copied().fold(f64::INFINITY, f64::min);
        let volatility = population_std(&log_returns(window)) * PERIODS_PER_YEAR.sqrt();
        Some(Self {
            high,
            low,
            volatility,
        })
    }

    /// Breakout margin, `volatility * 0.05` bounded to [0.5%, 2%].
    pub fn margin(&self) -> f64 {
        clip(self.volatility * 0.05, 0.005, 0.02)
    }

    pub fn upper(&self) -> f64 {
        self.high * (1.0 + self.margin())
    }

    pub fn lower(&self) -> f64 {
        self.low * (1.0 - self.margin())
    }
}

/// Entry confidence from distance to a random walk.
pub fn hurst_confidence(hurst: f64) -> f64 {
    ((hurst - 0.5).abs() * 2.0).min(1.0)
}

pub struct FractalBreakoutEngine {
    config: FractalConfig,
    prices: HashMap<String, RollingWindow>,
    hurst: HashMap<String, RollingWindow>,
    last_price: HashMap<String, f64>,
    book: PositionBook,
}

impl FractalBreakoutEngine {
    pub fn new(config: FractalConfig) -> Self {
        let all = config.all_symbols();
        let prices = all
            .iter()
            .map(|s| (s.clone(), RollingWindow::new(config.buffer)))
            .collect();
        let hurst = all
            .iter()
            .map(|s| (s.clone(), RollingWindow::new(config.history)))
            .collect();
        Self {
            config,
            prices,
            hurst,
            last_price: HashMap::new(),
            book: PositionBook::new(),
        }
    }

    pub fn latest_hurst(&self, symbol: &str) -> Option<f64> {
        self.hurst.get(symbol).and_then(|w| w.last())
    }

    pub fn positions(&self) -> &PositionBook {
        &self.book
    }

    fn analyze(&mut self) {
        let cfg = &self.config;
        for symbol in cfg.all_symbols() {
            let Some(prices) = self.prices.get(&symbol) else {
                continue;
            };
            if prices.len() < cfg.hurst.lookback {
                continue;
            }
            let Some(h) = hurst_exponent(&prices.to_vec(), &cfg.hurst) else {
                continue;
            };
            if let Some(history) = self.hurst.get_mut(&symbol) {
                history.push(h);
            }
            let regime = HurstRegime::classify(h, cfg.trending_threshold, cfg.mean_rev_threshold);
            debug!(
                symbol = %symbol,
                hurst = h,
                dimension = fractal_dimension(h),
                regime = %regime,
                "fractal analysis"
            );
        }
    }

    /// Returns the entry signals and the symbols that got a new record.
    fn check_breakouts(
        &mut self,
        time: NaiveDateTime,
        bars: &[OhlcvBar],
        holdings: &dyn HoldingsPort,
    ) -> (Vec<Signal>, HashSet<String>) {
        let cfg = &self.config;
        let mut signals = Vec::new();
        let mut entered = HashSet::new();

        for symbol in &cfg.symbols {
            let Some(bar) = bar_for(bars, symbol) else {
                continue;
            };
            let Some(history) = self.hurst.get(symbol) else {
                continue;
            };
            if history.len() < cfg.min_readings {
                continue;
            }
            let Some(h) = history.last() else {
                continue;
            };
            if h < cfg.trending_threshold || self.book.contains(symbol) {
                continue;
            }

            let Some(prices) = self.prices.get(symbol) else {
                continue;
            };
            // The newest buffered close is the current bar.
            let recent = prices.tail(cfg.breakout_lookback + 1);
            if recent.len() <= cfg.breakout_lookback {
                continue;
            }
            let Some(levels) = BreakoutLevels::from_window(&recent[..cfg.breakout_lookback]) else {
                continue;
            };
            if levels.volatility <= 0.0 {
                continue;
            }

            let price = bar.close;
            let confidence = hurst_confidence(h);
            let size = cfg.max_position * confidence;
            let expected = estimate_move_duration(h);

            if price > levels.upper() {
                debug!(symbol = %symbol, price, hurst = h, expected, "breakout long");
                self.book.open(
                    symbol,
                    TrackedPosition::new(price, 0.0, h).with_expected_duration(expected),
                );
                entered.insert(symbol.clone());
                signals.push(Signal::buy(time, symbol, size, format!("breakout H={h:.3}")));
            } else if price < levels.lower() {
                if holdings.weight(symbol) > 0.0 {
                    signals.push(Signal::liquidate(time, symbol, "breakdown"));
                }
                let Some(&hedge_price) = self.last_price.get(&cfg.hedge) else {
                    continue;
                };
                debug!(symbol = %symbol, hedge = %cfg.hedge, hedge_price, "breakdown hedge");
                self.book.open(
                    &cfg.hedge,
                    TrackedPosition::new(hedge_price, 0.0, h).with_expected_duration(expected),
                );
                entered.insert(cfg.hedge.clone());
                signals.push(Signal::buy(
                    time,
                    &cfg.hedge,
                    size * 0.5,
                    format!("hedge for {symbol} breakdown"),
                ));
            }
        }
        (signals, entered)
    }

    fn manage_positions(
        &mut self,
        time: NaiveDateTime,
        bars: &[OhlcvBar],
        holdings: &dyn HoldingsPort,
        entered: &HashSet<String>,
    ) -> Vec<Signal> {
        let base_stop = self.config.base_stop;
        let mut signals = Vec::new();

        for symbol in self.book.symbols() {
            let Some(bar) = bar_for(bars, &symbol) else {
                continue;
            };
            let weight = holdings.weight(&symbol);
            let Some(pos) = self.book.get_mut(&symbol) else {
                continue;
            };
            pos.bars_held += 1;

            if weight == 0.0 && !entered.contains(&symbol) {
                self.book.close(&symbol);
                continue;
            }

            let price = bar.close;
            let pnl = pos.pnl_pct(price, weight >= 0.0);
            let h = pos.entry_indicator;
            let stop = if h > 0.5 {
                base_stop * (1.0 + (h - 0.5))
            } else {
                base_stop
            };

            if pnl < -stop {
                debug!(symbol = %symbol, price, pnl, "fractal stop");
                self.book.close(&symbol);
                signals.push(Signal::liquidate(time, &symbol, "stop loss"));
                continue;
            }

            let ratio = pos.duration_ratio();
            if ratio >= 1.5 {
                debug!(symbol = %symbol, bars = pos.bars_held, expected = pos.expected_duration, "duration exit");
                self.book.close(&symbol);
                signals.push(Signal::liquidate(time, &symbol, "duration exceeded"));
                continue;
            }

            if ratio >= 0.8 && pnl > 0.02 {
                signals.push(Signal::reduce(time, &symbol, 0.4, "duration profit"));
            }

            if pnl > 0.03 {
                pos.entry_price += (price - pos.entry_price) * 0.3;
            }
        }
        signals
    }
}

impl SignalEngine for FractalBreakoutEngine {
    fn name(&self) -> &'static str {
        SECTION
    }

    fn symbols(&self) -> Vec<String> {
        self.config.all_symbols()
    }

    fn on_data(&mut self, time: NaiveDateTime, bars: &[OhlcvBar], holdings: &dyn HoldingsPort) -> Vec<Signal> {
        for bar in bars {
            if let Some(buffer) = self.prices.get_mut(&bar.code) {
                buffer.push(bar.close);
                self.last_price.insert(bar.code.clone(), bar.close);
            }
        }
        let (mut signals, entered) = self.check_breakouts(time, bars, holdings);
        signals.extend(self.manage_positions(time, bars, holdings, &entered));
        signals
    }

    fn on_schedule(&mut self, _time: NaiveDateTime, _holdings: &dyn HoldingsPort) -> Vec<Signal> {
        self.analyze();
        Vec::new()
    }

    fn summary(&self) -> Vec<String> {
        self.config
            .all_symbols()
            .iter()
            .map(|s| match self.latest_hurst(s) {
                Some(h) => format!(
                    "{s}: H={h:.3} D={:.3} {}",
                    fractal_dimension(h),
                    HurstRegime::classify(h, self.config.trending_threshold, self.config.mean_rev_threshold)
                ),
                None => format!("{s}: no Hurst reading"),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::test_support::{bar, ts, FixedHoldings};
    use crate::domain::signal::SignalAction;

    /// Engine with a trending Hurst history and a gently oscillating
    /// price buffer around 100.
    fn primed(h: f64) -> FractalBreakoutEngine {
        let mut engine = FractalBreakoutEngine::new(FractalConfig::default());
        for i in 0..30 {
            let close = if i % 2 == 0 { 100.0 } else { 100.5 };
            engine.on_data(ts(i), &[bar("SPY", i, close), bar("TLT", i, 90.0)], &FixedHoldings::default());
        }
        for _ in 0..5 {
            engine.hurst.get_mut("SPY").unwrap().push(h);
        }
        engine
    }

    #[test]
    fn levels_exclude_the_tested_bar() {
        let levels = BreakoutLevels::from_window(&[100.0, 101.0, 99.0, 100.0]).unwrap();
        assert_eq!(levels.high, 101.0);
        assert_eq!(levels.low, 99.0);
        assert!(levels.volatility > 0.0);
        assert!(levels.upper() > 101.0);
        assert!(levels.lower() < 99.0);
    }

    #[test]
    fn margin_is_bounded() {
        let calm = BreakoutLevels { high: 1.0, low: 1.0, volatility: 0.01 };
        assert_eq!(calm.margin(), 0.005);
        let wild = BreakoutLevels { high: 1.0, low: 1.0, volatility: 5.0 };
        assert_eq!(wild.margin(), 0.02);
    }

    #[test]
    fn confidence_scales_with_distance_from_half() {
        assert!((hurst_confidence(0.75) - 0.5).abs() < 1e-12);
        assert!((hurst_confidence(0.99) - 0.98).abs() < 1e-12);
        assert_eq!(hurst_confidence(0.01), hurst_confidence(0.99));
        assert_eq!(hurst_confidence(0.5), 0.0);
    }

    #[test]
    fn upside_breakout_opens_long_with_duration() {
        let mut engine = primed(0.75);
        let signals = engine.on_data(ts(30), &[bar("SPY", 30, 110.0)], &FixedHoldings::default());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].action, SignalAction::Buy);
        assert!((signals[0].size - 0.35 * 0.5).abs() < 1e-12);

        let pos = engine.positions().get("SPY").unwrap();
        assert_eq!(pos.entry_price, 110.0);
        assert_eq!(pos.expected_duration, estimate_move_duration(0.75));
        assert_eq!(pos.bars_held, 1);
    }

    #[test]
    fn no_breakout_below_trending_threshold() {
        let mut engine = primed(0.5);
        let signals = engine.on_data(ts(30), &[bar("SPY", 30, 110.0)], &FixedHoldings::default());
        assert!(signals.is_empty());
        assert!(engine.positions().is_empty());
    }

    #[test]
    fn breakdown_rotates_into_hedge() {
        let mut engine = primed(0.75);
        let long = FixedHoldings::with("SPY", 0.2);
        let signals = engine.on_data(ts(30), &[bar("SPY", 30, 90.0)], &long);
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].action, SignalAction::Liquidate);
        assert_eq!(signals[0].symbol, "SPY");
        assert_eq!(signals[1].action, SignalAction::Buy);
        assert_eq!(signals[1].symbol, "TLT");
        assert!((signals[1].size - 0.35 * 0.5 * 0.5).abs() < 1e-12);
        assert_eq!(engine.positions().get("TLT").unwrap().entry_price, 90.0);
    }

    #[test]
    fn stop_widens_with_entry_hurst() {
        let mut engine = primed(0.75);
        engine.book.open("SPY", TrackedPosition::new(100.0, 0.0, 0.7).with_expected_duration(18));
        let long = FixedHoldings::with("SPY", 0.2);
        // stop = 2.5% * 1.2 = 3%; a 2.9% loss holds
        assert!(engine.on_data(ts(30), &[bar("SPY", 30, 97.1)], &long).is_empty());
        let signals = engine.on_data(ts(31), &[bar("SPY", 31, 96.9)], &long);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].action, SignalAction::Liquidate);
        assert!(!engine.positions().contains("SPY"));
    }

    #[test]
    fn duration_budget_forces_exit() {
        let mut engine = FractalBreakoutEngine::new(FractalConfig::default());
        engine.book.open("SPY", TrackedPosition::new(100.0, 0.0, 0.5).with_expected_duration(2));
        let long = FixedHoldings::with("SPY", 0.2);
        assert!(engine.on_data(ts(0), &[bar("SPY", 0, 100.0)], &long).is_empty());
        assert!(engine.on_data(ts(1), &[bar("SPY", 1, 100.0)], &long).is_empty());
        let signals = engine.on_data(ts(2), &[bar("SPY", 2, 100.0)], &long);
        assert_eq!(signals[0].action, SignalAction::Liquidate);
    }

    #[test]
    fn profit_ratchets_entry_and_trims_near_duration() {
        let mut engine = FractalBreakoutEngine::new(FractalConfig::default());
        let mut pos = TrackedPosition::new(100.0, 0.0, 0.6).with_expected_duration(10);
        pos.bars_held = 7;
        engine.book.open("SPY", pos);
        let long = FixedHoldings::with("SPY", 0.2);
        let signals = engine.on_data(ts(0), &[bar("SPY", 0, 104.0)], &long);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].action, SignalAction::Reduce);
        assert_eq!(signals[0].size, 0.4);
        let entry = engine.positions().get("SPY").unwrap().entry_price;
        assert!((entry - 101.2).abs() < 1e-9);
    }

    #[test]
    fn flat_holding_drops_record() {
        let mut engine = FractalBreakoutEngine::new(FractalConfig::default());
        engine.book.open("QQQ", TrackedPosition::new(100.0, 0.0, 0.6).with_expected_duration(10));
        let signals = engine.on_data(ts(0), &[bar("QQQ", 0, 100.0)], &FixedHoldings::default());
        assert!(signals.is_empty());
        assert!(!engine.positions().contains("QQQ"));
    }

    #[test]
    fn daily_analysis_needs_lookback() {
        let mut engine = FractalBreakoutEngine::new(FractalConfig::default());
        let mut x: u64 = 7;
        let mut price = 100.0;
        for i in 0..120 {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            price *= 1.0 + ((x % 2001) as f64 / 1000.0 - 1.0) * 0.01;
            engine.on_data(ts(i), &[bar("SPY", i, price)], &FixedHoldings::default());
            if i == 50 {
                engine.on_schedule(ts(i), &FixedHoldings::default());
                assert!(engine.latest_hurst("SPY").is_none());
            }
        }
        engine.on_schedule(ts(120), &FixedHoldings::default());
        let h = engine.latest_hurst("SPY").unwrap();
        assert!((0.01..=0.99).contains(&h));
        assert!(engine.latest_hurst("TLT").is_none());
    }
}
