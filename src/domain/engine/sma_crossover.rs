//! Fast/slow SMA trend following on a single symbol.
//!
//! `crossover` mode trades only on the bar where the averages cross.
//! `level` mode goes long whenever fast is above slow and exits whenever it
//! is below, so it also enters a trend that was already running at warm-up.

use crate::domain::engine::{bar_for, SignalEngine};
use crate::domain::error::AlphaLabError;
use crate::domain::estimator::sma::{detect_crossover, simple_moving_average, Crossover};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::rolling::RollingWindow;
use crate::domain::signal::Signal;
use crate::ports::config_port::ConfigPort;
use crate::ports::holdings_port::HoldingsPort;
use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const SECTION: &str = "sma_crossover";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmaMode {
    #[default]
    Crossover,
    Level,
}

impl fmt::Display for SmaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmaMode::Crossover => write!(f, "crossover"),
            SmaMode::Level => write!(f, "level"),
        }
    }
}

impl FromStr for SmaMode {
    type Err = AlphaLabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crossover" | "cross" => Ok(SmaMode::Crossover),
            "level" => Ok(SmaMode::Level),
            other => Err(AlphaLabError::invalid(
                SECTION,
                "mode",
                format!("unknown mode '{other}', expected crossover or level"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmaConfig {
    pub symbol: String,
    pub fast_period: usize,
    pub slow_period: usize,
    pub mode: SmaMode,
}

impl Default for SmaConfig {
    fn default() -> Self {
        Self {
            symbol: "SPY".into(),
            fast_period: 10,
            slow_period: 30,
            mode: SmaMode::Crossover,
        }
    }
}

impl SmaConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let d = Self::default();
        Self {
            symbol: config
                .get_symbols(SECTION, "symbol", &[])
                .into_iter()
                .next()
                .unwrap_or(d.symbol),
            fast_period: config.get_usize(SECTION, "fast_period", d.fast_period),
            slow_period: config.get_usize(SECTION, "slow_period", d.slow_period),
            mode: config
                .get_string(SECTION, "mode")
                .and_then(|m| m.parse().ok())
                .unwrap_or(d.mode),
        }
    }
}

pub struct SmaCrossoverEngine {
    config: SmaConfig,
    closes: RollingWindow,
    previous: Option<(f64, f64)>,
    trades: usize,
}

impl SmaCrossoverEngine {
    pub fn new(config: SmaConfig) -> Self {
        Self {
            closes: RollingWindow::new(config.fast_period.max(config.slow_period)),
            previous: None,
            trades: 0,
            config,
        }
    }

    /// Current (fast, slow) averages once the slow window is full.
    pub fn averages(&self) -> Option<(f64, f64)> {
        let closes = self.closes.to_vec();
        Some((
            simple_moving_average(&closes, self.config.fast_period)?,
            simple_moving_average(&closes, self.config.slow_period)?,
        ))
    }
}

impl SignalEngine for SmaCrossoverEngine {
    fn name(&self) -> &'static str {
        SECTION
    }

    fn symbols(&self) -> Vec<String> {
        vec![self.config.symbol.clone()]
    }

    fn on_data(&mut self, time: NaiveDateTime, bars: &[OhlcvBar], holdings: &dyn HoldingsPort) -> Vec<Signal> {
        let Some(bar) = bar_for(bars, &self.config.symbol) else {
            return Vec::new();
        };
        self.closes.push(bar.close);
        let Some((fast, slow)) = self.averages() else {
            return Vec::new();
        };
        let previous = self.previous.replace((fast, slow));

        let symbol = &self.config.symbol;
        let weight = holdings.weight(symbol);
        let signal = match self.config.mode {
            SmaMode::Crossover => {
                let Some((prev_fast, prev_slow)) = previous else {
                    return Vec::new();
                };
                match detect_crossover(prev_fast, prev_slow, fast, slow) {
                    Some(Crossover::Bullish) if weight == 0.0 => Signal::set_weight(
                        time,
                        symbol,
                        1.0,
                        format!("fast {fast:.2} crossed above slow {slow:.2}"),
                    ),
                    Some(Crossover::Bearish) if weight != 0.0 => Signal::liquidate(
                        time,
                        symbol,
                        format!("fast {fast:.2} crossed below slow {slow:.2}"),
                    ),
                    _ => return Vec::new(),
                }
            }
            SmaMode::Level if fast > slow && weight <= 0.0 => {
                Signal::set_weight(time, symbol, 1.0, format!("fast {fast:.2} above slow {slow:.2}"))
            }
            SmaMode::Level if fast < slow && weight > 0.0 => {
                Signal::liquidate(time, symbol, format!("fast {fast:.2} below slow {slow:.2}"))
            }
            SmaMode::Level => return Vec::new(),
        };
        self.trades += 1;
        debug!(symbol = %symbol, mode = %self.config.mode, action = %signal.action, fast, slow, "sma signal");
        vec![signal]
    }

    fn summary(&self) -> Vec<String> {
        let mut lines = vec![format!("{} trades {}", self.config.mode, self.trades)];
        if let Some((fast, slow)) = self.averages() {
            lines.push(format!("fast {fast:.2} slow {slow:.2}"));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::test_support::{bar, ts, FixedHoldings};
    use crate::domain::signal::SignalAction;

    fn small() -> SmaCrossoverEngine {
        SmaCrossoverEngine::new(SmaConfig {
            fast_period: 2,
            slow_period: 4,
            ..SmaConfig::default()
        })
    }

    fn small_level() -> SmaCrossoverEngine {
        SmaCrossoverEngine::new(SmaConfig {
            fast_period: 2,
            slow_period: 4,
            mode: SmaMode::Level,
            ..SmaConfig::default()
        })
    }

    fn run(engine: &mut SmaCrossoverEngine, closes: &[f64], holdings: &FixedHoldings) -> Vec<Signal> {
        closes
            .iter()
            .enumerate()
            .flat_map(|(i, c)| engine.on_data(ts(i as i64), &[bar("SPY", i as i64, *c)], holdings))
            .collect()
    }

    #[test]
    fn waits_for_slow_window() {
        let mut engine = small();
        assert!(run(&mut engine, &[10.0, 9.0, 8.0], &FixedHoldings::default()).is_empty());
        assert!(engine.averages().is_none());
    }

    #[test]
    fn bullish_cross_buys_when_flat() {
        let mut engine = small();
        let signals = run(&mut engine, &[10.0, 9.0, 8.0, 7.0, 6.0, 12.0], &FixedHoldings::default());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].action, SignalAction::SetWeight);
        assert_eq!(signals[0].size, 1.0);
        assert_eq!(signals[0].time, ts(5));
    }

    #[test]
    fn bullish_cross_ignored_when_invested() {
        let mut engine = small();
        let signals = run(&mut engine, &[10.0, 9.0, 8.0, 7.0, 6.0, 12.0], &FixedHoldings::with("SPY", 1.0));
        assert!(signals.is_empty());
    }

    #[test]
    fn bearish_cross_liquidates_when_invested() {
        let mut engine = small();
        let signals = run(&mut engine, &[6.0, 7.0, 8.0, 9.0, 10.0, 4.0], &FixedHoldings::with("SPY", 1.0));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].action, SignalAction::Liquidate);

        let mut engine = small();
        assert!(run(&mut engine, &[6.0, 7.0, 8.0, 9.0, 10.0, 4.0], &FixedHoldings::default()).is_empty());
    }

    #[test]
    fn other_symbols_are_ignored() {
        let mut engine = small();
        let holdings = FixedHoldings::default();
        for i in 0..6 {
            assert!(engine.on_data(ts(i), &[bar("QQQ", i, 1.0)], &holdings).is_empty());
        }
        assert!(engine.averages().is_none());
    }

    #[test]
    fn level_mode_enters_a_running_trend() {
        // fast sits above slow from the first full window, with no cross
        let mut engine = small_level();
        let signals = run(&mut engine, &[1.0, 2.0, 3.0, 4.0, 5.0], &FixedHoldings::default());
        assert_eq!(signals.len(), 2, "re-signals while the test holdings stay flat");
        assert!(signals.iter().all(|s| s.action == SignalAction::SetWeight && s.size == 1.0));
        assert_eq!(signals[0].time, ts(3));

        let mut engine = small();
        assert!(run(&mut engine, &[1.0, 2.0, 3.0, 4.0, 5.0], &FixedHoldings::default()).is_empty());
    }

    #[test]
    fn level_mode_exits_below_and_holds_above() {
        let mut engine = small_level();
        let long = FixedHoldings::with("SPY", 1.0);
        assert!(run(&mut engine, &[1.0, 2.0, 3.0, 4.0], &long).is_empty());

        let mut engine = small_level();
        let signals = run(&mut engine, &[4.0, 3.0, 2.0, 1.0], &long);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].action, SignalAction::Liquidate);

        let mut engine = small_level();
        assert!(run(&mut engine, &[4.0, 3.0, 2.0, 1.0], &FixedHoldings::default()).is_empty());
    }

    #[test]
    fn mode_names() {
        assert_eq!("level".parse::<SmaMode>().unwrap(), SmaMode::Level);
        assert_eq!(" Crossover ".parse::<SmaMode>().unwrap(), SmaMode::Crossover);
        assert!(matches!(
            "momentum".parse::<SmaMode>(),
            Err(AlphaLabError::ConfigInvalid { key, .. }) if key == "mode"
        ));
    }
}
