//! Permutation-entropy regime engine.
//!
//! Low entropy marks a trending, predictable market; high entropy a
//! chaotic, mean-reverting one. Trending regimes follow 20-bar momentum,
//! chaotic regimes fade deviations from the 20-bar mean, and transitions
//! cut exposure in half. Entries carry a fixed stop that moves to
//! breakeven after the profit target and trails winners.

use crate::domain::engine::{bar_for, SignalEngine};
use crate::domain::estimator::permutation_entropy::permutation_entropy;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::position::{PositionBook, TrackedPosition};
use crate::domain::rolling::RollingWindow;
use crate::domain::signal::Signal;
use crate::domain::stats::mean;
use crate::ports::config_port::ConfigPort;
use crate::ports::holdings_port::HoldingsPort;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

pub const SECTION: &str = "entropy";

#[derive(Debug, Clone, PartialEq)]
pub struct EntropyConfig {
    pub symbols: Vec<String>,
    pub embedding_dim: usize,
    pub tau: usize,
    pub lookback: usize,
    pub history: usize,
    pub min_readings: usize,
    pub low_threshold: f64,
    pub high_threshold: f64,
    pub max_position: f64,
    pub stop_loss: f64,
    pub profit_target: f64,
    pub momentum_period: usize,
    pub momentum_threshold: f64,
    pub reversion_threshold: f64,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["SPY".into(), "QQQ".into(), "IWM".into()],
            embedding_dim: 5,
            tau: 1,
            lookback: 120,
            history: 24,
            min_readings: 6,
            low_threshold: 0.65,
            high_threshold: 0.85,
            max_position: 0.3,
            stop_loss: 0.03,
            profit_target: 0.05,
            momentum_period: 20,
            momentum_threshold: 0.02,
            reversion_threshold: 0.03,
        }
    }
}

impl EntropyConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let d = Self::default();
        Self {
            symbols: config.get_symbols(SECTION, "symbols", &["SPY", "QQQ", "IWM"]),
            embedding_dim: config.get_usize(SECTION, "embedding_dim", d.embedding_dim),
            tau: config.get_usize(SECTION, "tau", d.tau),
            lookback: config.get_usize(SECTION, "lookback", d.lookback),
            history: config.get_usize(SECTION, "history", d.history),
            min_readings: config.get_usize(SECTION, "min_readings", d.min_readings),
            low_threshold: config.get_double(SECTION, "low_threshold", d.low_threshold),
            high_threshold: config.get_double(SECTION, "high_threshold", d.high_threshold),
            max_position: config.get_double(SECTION, "max_position", d.max_position),
            stop_loss: config.get_double(SECTION, "stop_loss", d.stop_loss),
            profit_target: config.get_double(SECTION, "profit_target", d.profit_target),
            momentum_period: config.get_usize(SECTION, "momentum_period", d.momentum_period),
            momentum_threshold: config.get_double(SECTION, "momentum_threshold", d.momentum_threshold),
            reversion_threshold: config.get_double(SECTION, "reversion_threshold", d.reversion_threshold),
        }
    }

    fn buffer_capacity(&self) -> usize {
        self.lookback + self.embedding_dim * self.tau
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyRegime {
    Trending,
    Chaotic,
    Transitioning,
}

impl fmt::Display for EntropyRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntropyRegime::Trending => write!(f, "trending"),
            EntropyRegime::Chaotic => write!(f, "chaotic"),
            EntropyRegime::Transitioning => write!(f, "transitioning"),
        }
    }
}

/// Classifies the newest reading of `history` (oldest first).
///
/// Confidence grows with the distance past a threshold and gets a 1.5x
/// boost when the newest reading moved more than 0.05 away from the mean
/// of the earlier ones. Needs `min_readings` readings.
pub fn classify_entropy_regime(
    history: &[f64],
    min_readings: usize,
    low: f64,
    high: f64,
) -> Option<(EntropyRegime, f64)> {
    if history.len() < min_readings.max(2) {
        return None;
    }
    let (&current, previous) = history.split_last()?;
    let change = current - mean(previous);

    let (regime, mut confidence) = if current < low {
        (EntropyRegime::Trending, (low - current) / low)
    } else if current > high {
        (EntropyRegime::Chaotic, (current - high) / (1.0 - high))
    } else {
        (EntropyRegime::Transitioning, 0.3)
    };

    if change.abs() > 0.05 {
        confidence = (confidence * 1.5).min(1.0);
    }
    Some((regime, confidence.min(1.0)))
}

pub struct EntropyRegimeEngine {
    config: EntropyConfig,
    prices: HashMap<String, RollingWindow>,
    entropy: HashMap<String, RollingWindow>,
    regimes: HashMap<String, (EntropyRegime, f64)>,
    book: PositionBook,
}

impl EntropyRegimeEngine {
    pub fn new(config: EntropyConfig) -> Self {
        let prices = config
            .symbols
            .iter()
            .map(|s| (s.clone(), RollingWindow::new(config.buffer_capacity())))
            .collect();
        let entropy = config
            .symbols
            .iter()
            .map(|s| (s.clone(), RollingWindow::new(config.history)))
            .collect();
        Self {
            config,
            prices,
            entropy,
            regimes: HashMap::new(),
            book: PositionBook::new(),
        }
    }

    pub fn regime(&self, symbol: &str) -> Option<(EntropyRegime, f64)> {
        self.regimes.get(symbol).copied()
    }

    pub fn latest_entropy(&self, symbol: &str) -> Option<f64> {
        self.entropy.get(symbol).and_then(|w| w.last())
    }

    pub fn positions(&self) -> &PositionBook {
        &self.book
    }

    fn analyze_regimes(&mut self, time: NaiveDateTime, holdings: &dyn HoldingsPort) -> Vec<Signal> {
        let cfg = &self.config;
        let mut signals = Vec::new();

        for symbol in &cfg.symbols {
            let Some(prices) = self.prices.get(symbol) else {
                continue;
            };
            if prices.len() < cfg.lookback {
                continue;
            }
            let window = prices.tail(cfg.lookback);
            let Some(entropy) = permutation_entropy(&window, cfg.embedding_dim, cfg.tau) else {
                continue;
            };

            let Some(history) = self.entropy.get_mut(symbol) else {
                continue;
            };
            history.push(entropy);

            let Some((regime, confidence)) = classify_entropy_regime(
                &history.to_vec(),
                cfg.min_readings,
                cfg.low_threshold,
                cfg.high_threshold,
            ) else {
                continue;
            };

            let old = self.regimes.insert(symbol.clone(), (regime, confidence));
            if old.map(|(r, _)| r) != Some(regime) {
                debug!(
                    symbol = %symbol,
                    from = ?old.map(|(r, _)| r.to_string()),
                    to = %regime,
                    entropy,
                    confidence,
                    "entropy regime change"
                );
            }

            let holding = holdings.weight(symbol);
            let Some(last) = prices.last() else {
                continue;
            };
            let period = cfg.momentum_period.max(1);

            match regime {
                EntropyRegime::Trending if confidence > 0.5 => {
                    if let Some(past) = prices.from_end(period - 1).filter(|_| prices.len() >= period) {
                        let momentum = (last - past) / past;
                        if momentum > cfg.momentum_threshold && holding <= 0.0 {
                            signals.push(self::entry(
                                &mut self.book,
                                time,
                                symbol,
                                last,
                                cfg,
                                confidence,
                                entropy,
                                "entropy trend momentum",
                            ));
                        } else if momentum < -cfg.momentum_threshold && holding >= 0.0 {
                            if let Some(s) = exit(&mut self.book, time, symbol, holding, "entropy trend reversal") {
                                signals.push(s);
                            }
                        }
                    }
                }
                EntropyRegime::Chaotic if confidence > 0.6 => {
                    if prices.len() >= period {
                        let ma = mean(&prices.tail(period));
                        let deviation = (last - ma) / ma;
                        if deviation < -cfg.reversion_threshold && holding <= 0.0 {
                            signals.push(self::entry(
                                &mut self.book,
                                time,
                                symbol,
                                last,
                                cfg,
                                confidence * 0.7,
                                entropy,
                                "entropy chaotic oversold",
                            ));
                        } else if deviation > cfg.reversion_threshold && holding > 0.0 {
                            if let Some(s) = exit(&mut self.book, time, symbol, holding, "entropy chaotic overbought") {
                                signals.push(s);
                            }
                        }
                    }
                }
                EntropyRegime::Transitioning if holding > 0.0 => {
                    debug!(symbol = %symbol, "reducing exposure during transition");
                    signals.push(Signal::reduce(time, symbol, 0.5, "entropy transition"));
                }
                _ => {}
            }
        }
        signals
    }

    fn manage_positions(&mut self, time: NaiveDateTime, bars: &[OhlcvBar], holdings: &dyn HoldingsPort) -> Vec<Signal> {
        let mut signals = Vec::new();
        for symbol in self.book.symbols() {
            let Some(bar) = bar_for(bars, &symbol) else {
                continue;
            };
            if holdings.weight(&symbol) <= 0.0 {
                continue;
            }
            let price = bar.close;
            let Some(pos) = self.book.get_mut(&symbol) else {
                continue;
            };

            if pos.should_stop(price) {
                debug!(symbol = %symbol, price, entry = pos.entry_price, "stop hit");
                self.book.close(&symbol);
                signals.push(Signal::liquidate(time, &symbol, "stop loss"));
                continue;
            }

            let entry = pos.entry_price;
            if price >= entry * (1.0 + self.config.profit_target) {
                pos.stop_level = entry;
                debug!(symbol = %symbol, price, "partial profit, stop to breakeven");
                signals.push(Signal::reduce(time, &symbol, 0.5, "profit target"));
            } else if price > entry * 1.02 {
                pos.trail_stop(price * 0.98);
            }
        }
        signals
    }
}

#[allow(clippy::too_many_arguments)]
fn entry(
    book: &mut PositionBook,
    time: NaiveDateTime,
    symbol: &str,
    price: f64,
    cfg: &EntropyConfig,
    confidence: f64,
    entropy: f64,
    reason: &str,
) -> Signal {
    let size = cfg.max_position * confidence;
    book.open(
        symbol,
        TrackedPosition::new(price, price * (1.0 - cfg.stop_loss), entropy),
    );
    debug!(symbol = %symbol, price, confidence, "entropy entry");
    Signal::buy(time, symbol, size, reason)
}

fn exit(book: &mut PositionBook, time: NaiveDateTime, symbol: &str, holding: f64, reason: &str) -> Option<Signal> {
    if holding <= 0.0 {
        return None;
    }
    book.close(symbol);
    Some(Signal::sell(time, symbol, reason))
}

impl SignalEngine for EntropyRegimeEngine {
    fn name(&self) -> &'static str {
        "entropy"
    }

    fn symbols(&self) -> Vec<String> {
        self.config.symbols.clone()
    }

    fn on_data(&mut self, time: NaiveDateTime, bars: &[OhlcvBar], holdings: &dyn HoldingsPort) -> Vec<Signal> {
        for symbol in &self.config.symbols {
            if let (Some(bar), Some(buffer)) = (bar_for(bars, symbol), self.prices.get_mut(symbol)) {
                buffer.push(bar.close);
            }
        }
        self.manage_positions(time, bars, holdings)
    }

    fn on_schedule(&mut self, time: NaiveDateTime, holdings: &dyn HoldingsPort) -> Vec<Signal> {
        self.analyze_regimes(time, holdings)
    }

    fn summary(&self) -> Vec<String> {
        self.config
            .symbols
            .iter()
            .map(|s| match (self.latest_entropy(s), self.regime(s)) {
                (Some(e), Some((r, c))) => format!("{s}: entropy {e:.3}, regime {r} (conf {c:.2})"),
                (Some(e), None) => format!("{s}: entropy {e:.3}"),
                _ => format!("{s}: no entropy reading"),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::test_support::{bar, ts, FixedHoldings};

    fn small_config() -> EntropyConfig {
        EntropyConfig {
            symbols: vec!["SPY".into()],
            embedding_dim: 3,
            lookback: 30,
            min_readings: 2,
            ..EntropyConfig::default()
        }
    }

    #[test]
    fn classify_requires_min_readings() {
        assert!(classify_entropy_regime(&[0.5; 5], 6, 0.65, 0.85).is_none());
    }

    #[test]
    fn classify_trending_confidence() {
        let (regime, conf) = classify_entropy_regime(&[0.3; 6], 6, 0.65, 0.85).unwrap();
        assert_eq!(regime, EntropyRegime::Trending);
        assert!((conf - (0.65 - 0.3) / 0.65).abs() < 1e-12);
    }

    #[test]
    fn classify_chaotic_with_boost() {
        let history = [0.8, 0.8, 0.8, 0.8, 0.8, 0.95];
        let (regime, conf) = classify_entropy_regime(&history, 6, 0.65, 0.85).unwrap();
        assert_eq!(regime, EntropyRegime::Chaotic);
        let base: f64 = (0.95 - 0.85) / (1.0 - 0.85);
        assert!((conf - (base * 1.5).min(1.0)).abs() < 1e-9);
    }

    #[test]
    fn classify_transitioning_is_fixed_confidence() {
        let (regime, conf) = classify_entropy_regime(&[0.75; 6], 6, 0.65, 0.85).unwrap();
        assert_eq!(regime, EntropyRegime::Transitioning);
        assert_eq!(conf, 0.3);
    }

    #[test]
    fn uptrend_produces_buy_and_tracks_entry() {
        let mut engine = EntropyRegimeEngine::new(small_config());
        let flat = FixedHoldings::default();
        for i in 0..40 {
            engine.on_data(ts(i), &[bar("SPY", i, 100.0 + i as f64)], &flat);
        }
        assert!(engine.on_schedule(ts(40), &flat).is_empty());
        let signals = engine.on_schedule(ts(41), &flat);
        assert_eq!(signals.len(), 1);
        let s = &signals[0];
        assert_eq!(s.action, crate::domain::signal::SignalAction::Buy);
        // entropy 0 → confidence 1 → size = max_position
        assert!((s.size - 0.3).abs() < 1e-12);

        let pos = engine.positions().get("SPY").unwrap();
        assert_eq!(pos.entry_price, 139.0);
        assert!((pos.stop_level - 139.0 * 0.97).abs() < 1e-9);
        assert_eq!(engine.regime("SPY").unwrap().0, EntropyRegime::Trending);
    }

    #[test]
    fn downtrend_sells_only_when_long() {
        let mut engine = EntropyRegimeEngine::new(small_config());
        for i in 0..40 {
            engine.on_data(ts(i), &[bar("SPY", i, 200.0 - i as f64)], &FixedHoldings::default());
        }
        engine.on_schedule(ts(40), &FixedHoldings::default());
        assert!(engine.on_schedule(ts(41), &FixedHoldings::default()).is_empty());

        let long = FixedHoldings::with("SPY", 0.2);
        let signals = engine.on_schedule(ts(42), &long);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].action, crate::domain::signal::SignalAction::Sell);
    }

    #[test]
    fn stop_loss_liquidates_and_clears_record() {
        let mut engine = EntropyRegimeEngine::new(small_config());
        engine.book.open("SPY", TrackedPosition::new(100.0, 97.0, 0.2));
        let long = FixedHoldings::with("SPY", 0.3);
        let signals = engine.on_data(ts(0), &[bar("SPY", 0, 96.0)], &long);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].action, crate::domain::signal::SignalAction::Liquidate);
        assert!(!engine.positions().contains("SPY"));
    }

    #[test]
    fn profit_target_moves_stop_to_breakeven() {
        let mut engine = EntropyRegimeEngine::new(small_config());
        engine.book.open("SPY", TrackedPosition::new(100.0, 97.0, 0.2));
        let long = FixedHoldings::with("SPY", 0.3);
        let signals = engine.on_data(ts(0), &[bar("SPY", 0, 106.0)], &long);
        assert_eq!(signals[0].action, crate::domain::signal::SignalAction::Reduce);
        assert_eq!(engine.positions().get("SPY").unwrap().stop_level, 100.0);
    }

    #[test]
    fn winners_trail_the_stop() {
        let mut engine = EntropyRegimeEngine::new(small_config());
        engine.book.open("SPY", TrackedPosition::new(100.0, 97.0, 0.2));
        let long = FixedHoldings::with("SPY", 0.3);
        assert!(engine.on_data(ts(0), &[bar("SPY", 0, 103.0)], &long).is_empty());
        let stop = engine.positions().get("SPY").unwrap().stop_level;
        assert!((stop - 103.0 * 0.98).abs() < 1e-9);
    }

    #[test]
    fn flat_holdings_skip_management() {
        let mut engine = EntropyRegimeEngine::new(small_config());
        engine.book.open("SPY", TrackedPosition::new(100.0, 97.0, 0.2));
        let signals = engine.on_data(ts(0), &[bar("SPY", 0, 50.0)], &FixedHoldings::default());
        assert!(signals.is_empty());
        assert!(engine.positions().contains("SPY"));
    }
}
