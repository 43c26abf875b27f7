//! Order-flow toxicity engine.
//!
//! Minute bars feed a VPIN calculator per symbol. Minute bars are also
//! consolidated into hour bars; each completed hour classifies toxicity
//! and may open a long when informed flow agrees with price momentum.
//! Open positions are managed on every minute bar.

use crate::domain::engine::{bar_for, SignalEngine};
use crate::domain::estimator::vpin::{VpinCalculator, VpinParams};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::position::{PositionBook, TrackedPosition};
use crate::domain::signal::Signal;
use crate::domain::stats::mean;
use crate::ports::config_port::ConfigPort;
use crate::ports::holdings_port::HoldingsPort;
use chrono::{Duration, NaiveDateTime, Timelike};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

pub const SECTION: &str = "vpin";

#[derive(Debug, Clone, PartialEq)]
pub struct VpinConfig {
    pub symbols: Vec<String>,
    pub vpin: VpinParams,
    pub high_toxicity: f64,
    pub low_toxicity: f64,
    pub acceleration: f64,
    pub min_readings: usize,
    pub momentum_period: usize,
    pub max_position: f64,
    pub base_stop: f64,
    pub profit_target: f64,
    pub signal_interval_secs: i64,
}

impl Default for VpinConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["SPY".into(), "QQQ".into()],
            vpin: VpinParams::default(),
            high_toxicity: 0.65,
            low_toxicity: 0.35,
            acceleration: 0.05,
            min_readings: 20,
            momentum_period: 20,
            max_position: 0.3,
            base_stop: 0.02,
            profit_target: 0.04,
            signal_interval_secs: 3600,
        }
    }
}

impl VpinConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let d = Self::default();
        Self {
            symbols: config.get_symbols(SECTION, "symbols", &["SPY", "QQQ"]),
            vpin: VpinParams {
                bucket_size: config.get_double(SECTION, "bucket_size", d.vpin.bucket_size),
                n_buckets: config.get_usize(SECTION, "n_buckets", d.vpin.n_buckets),
                sigma_lookback: config.get_usize(SECTION, "sigma_lookback", d.vpin.sigma_lookback),
                price_history: config.get_usize(SECTION, "price_history", d.vpin.price_history),
                vpin_history: config.get_usize(SECTION, "vpin_history", d.vpin.vpin_history),
            },
            high_toxicity: config.get_double(SECTION, "high_threshold", d.high_toxicity),
            low_toxicity: config.get_double(SECTION, "low_threshold", d.low_toxicity),
            acceleration: config.get_double(SECTION, "acceleration", d.acceleration),
            min_readings: config.get_usize(SECTION, "min_readings", d.min_readings),
            momentum_period: config.get_usize(SECTION, "momentum_period", d.momentum_period),
            max_position: config.get_double(SECTION, "max_position", d.max_position),
            base_stop: config.get_double(SECTION, "stop_loss", d.base_stop),
            profit_target: config.get_double(SECTION, "profit_target", d.profit_target),
            signal_interval_secs: config.get_int(SECTION, "signal_interval_secs", d.signal_interval_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToxicityRegime {
    Toxic,
    Normal,
    Clean,
}

impl fmt::Display for ToxicityRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToxicityRegime::Toxic => write!(f, "toxic"),
            ToxicityRegime::Normal => write!(f, "normal"),
            ToxicityRegime::Clean => write!(f, "clean"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowDirection {
    Long,
    Short,
    /// Toxic flow without a price move yet.
    Pending,
    /// VPIN accelerating inside the normal band.
    Rising,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToxicityReading {
    pub regime: ToxicityRegime,
    pub direction: Option<FlowDirection>,
    pub confidence: f64,
    pub vpin: f64,
}

/// Classifies the newest VPIN reading (`readings` oldest first) given the
/// price momentum over the same horizon. Needs 10 readings.
pub fn detect_toxicity(
    readings: &[f64],
    momentum: f64,
    high: f64,
    low: f64,
    acceleration: f64,
) -> Option<ToxicityReading> {
    if readings.len() < 10 {
        return None;
    }
    let n = readings.len();
    let current = readings[n - 1];
    let change = if n > 5 {
        current - mean(&readings[n - 5..n - 1])
    } else {
        0.0
    };

    let (regime, direction, confidence) = if current > high {
        if momentum.abs() > 0.01 {
            let direction = if momentum > 0.0 {
                FlowDirection::Long
            } else {
                FlowDirection::Short
            };
            (ToxicityRegime::Toxic, Some(direction), ((current - 0.5) * 2.0).min(1.0))
        } else {
            (
                ToxicityRegime::Toxic,
                Some(FlowDirection::Pending),
                ((current - 0.5) * 1.5).min(1.0),
            )
        }
    } else if current < low {
        (ToxicityRegime::Clean, None, 0.0)
    } else if change > acceleration {
        (
            ToxicityRegime::Normal,
            Some(FlowDirection::Rising),
            (change / 0.1).min(1.0),
        )
    } else {
        (ToxicityRegime::Normal, None, 0.0)
    };

    Some(ToxicityReading {
        regime,
        direction,
        confidence,
        vpin: current,
    })
}

/// Aggregates bars into clock-hour bars.
///
/// An hour bar is emitted when the first bar of a later hour arrives; it
/// is stamped with the start of its hour.
#[derive(Debug, Clone, Default)]
pub struct HourlyConsolidator {
    current: Option<OhlcvBar>,
}

impl HourlyConsolidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn hour_start(time: NaiveDateTime) -> NaiveDateTime {
        time - Duration::minutes(time.minute() as i64)
            - Duration::seconds(time.second() as i64)
            - Duration::nanoseconds(time.nanosecond() as i64)
    }

    pub fn update(&mut self, bar: &OhlcvBar) -> Option<OhlcvBar> {
        let start = Self::hour_start(bar.time);
        if let Some(agg) = self.current.as_mut() {
            if agg.time == start {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
                return None;
            }
        }
        self.current.replace(OhlcvBar {
            time: start,
            ..bar.clone()
        })
    }
}

struct SymbolState {
    calculator: VpinCalculator,
    consolidator: HourlyConsolidator,
    regime: ToxicityRegime,
    last_signal: Option<NaiveDateTime>,
}

pub struct VpinToxicityEngine {
    config: VpinConfig,
    states: HashMap<String, SymbolState>,
    book: PositionBook,
}

impl VpinToxicityEngine {
    pub fn new(config: VpinConfig) -> Self {
        let states = config
            .symbols
            .iter()
            .map(|s| {
                (
                    s.clone(),
                    SymbolState {
                        calculator: VpinCalculator::new(config.vpin),
                        consolidator: HourlyConsolidator::new(),
                        regime: ToxicityRegime::Normal,
                        last_signal: None,
                    },
                )
            })
            .collect();
        Self {
            config,
            states,
            book: PositionBook::new(),
        }
    }

    pub fn current_vpin(&self, symbol: &str) -> Option<f64> {
        self.states.get(symbol).and_then(|s| s.calculator.current())
    }

    pub fn regime(&self, symbol: &str) -> Option<ToxicityRegime> {
        self.states.get(symbol).map(|s| s.regime)
    }

    pub fn positions(&self) -> &PositionBook {
        &self.book
    }

    /// Analysis of one completed hour bar. `now` is the time of the minute
    /// bar that completed it; that bar's close is not yet in the
    /// calculator, so momentum spans the closes before it.
    fn on_hour(
        &mut self,
        now: NaiveDateTime,
        hour: &OhlcvBar,
        holdings: &dyn HoldingsPort,
    ) -> Option<Signal> {
        let cfg = &self.config;
        let state = self.states.get_mut(&hour.code)?;
        let history = state.calculator.history();
        if history.len() < cfg.min_readings {
            return None;
        }

        let prices = state.calculator.prices();
        let period = cfg.momentum_period.max(1);
        let momentum = match (prices.last(), prices.from_end(period - 1)) {
            (Some(last), Some(past)) if past != 0.0 => (last - past) / past,
            _ => 0.0,
        };

        let reading = detect_toxicity(
            &history.to_vec(),
            momentum,
            cfg.high_toxicity,
            cfg.low_toxicity,
            cfg.acceleration,
        )?;

        let old = state.regime;
        state.regime = reading.regime;
        if old != reading.regime {
            debug!(
                symbol = %hour.code,
                from = %old,
                to = %reading.regime,
                vpin = reading.vpin,
                direction = ?reading.direction,
                "toxicity regime change"
            );
        }

        if let Some(last) = state.last_signal {
            if (now - last).num_seconds() < cfg.signal_interval_secs {
                return None;
            }
        }

        let weight = holdings.weight(&hour.code);
        match (reading.regime, reading.direction) {
            (ToxicityRegime::Toxic, Some(FlowDirection::Long))
                if reading.confidence > 0.5 && weight <= 0.0 =>
            {
                let price = hour.close;
                state.last_signal = Some(now);
                self.book.open(
                    &hour.code,
                    TrackedPosition::new(price, price * (1.0 - cfg.base_stop), reading.vpin),
                );
                debug!(symbol = %hour.code, price, vpin = reading.vpin, confidence = reading.confidence, "toxicity long");
                Some(Signal::buy(
                    now,
                    &hour.code,
                    cfg.max_position * reading.confidence,
                    format!("toxic flow VPIN={:.3}", reading.vpin),
                ))
            }
            (ToxicityRegime::Toxic, Some(FlowDirection::Pending))
                if reading.confidence > 0.5 && weight == 0.0 =>
            {
                debug!(symbol = %hour.code, vpin = reading.vpin, "pending breakout");
                None
            }
            (ToxicityRegime::Clean, _) if weight > 0.0 => {
                debug!(symbol = %hour.code, vpin = reading.vpin, "clean flow while long");
                None
            }
            _ => None,
        }
    }

    fn manage_positions(
        &mut self,
        time: NaiveDateTime,
        bars: &[OhlcvBar],
        holdings: &dyn HoldingsPort,
        entered: &HashSet<String>,
    ) -> Vec<Signal> {
        let mut signals = Vec::new();
        for symbol in self.book.symbols() {
            let Some(bar) = bar_for(bars, &symbol) else {
                continue;
            };
            if holdings.weight(&symbol) <= 0.0 && !entered.contains(&symbol) {
                self.book.close(&symbol);
                continue;
            }
            let current_vpin = self.current_vpin(&symbol);
            let Some(pos) = self.book.get_mut(&symbol) else {
                continue;
            };
            let price = bar.close;
            let pnl = pos.pnl_pct(price, true);

            let exit = if pos.should_stop(price) {
                Some("stop loss")
            } else if pnl >= self.config.profit_target {
                Some("profit target")
            } else if current_vpin.is_some_and(|v| pos.entry_indicator - v > 0.15) && pnl > 0.0 {
                Some("toxicity faded")
            } else {
                None
            };

            if let Some(reason) = exit {
                debug!(symbol = %symbol, price, pnl, reason, "vpin exit");
                self.book.close(&symbol);
                signals.push(Signal::liquidate(time, &symbol, reason));
                continue;
            }

            if pnl > 0.02 {
                pos.trail_stop(price * 0.985);
            }
        }
        signals
    }
}

impl SignalEngine for VpinToxicityEngine {
    fn name(&self) -> &'static str {
        SECTION
    }

    fn symbols(&self) -> Vec<String> {
        self.config.symbols.clone()
    }

    fn on_data(&mut self, time: NaiveDateTime, bars: &[OhlcvBar], holdings: &dyn HoldingsPort) -> Vec<Signal> {
        let mut signals = Vec::new();
        let mut entered = HashSet::new();

        for symbol in self.config.symbols.clone() {
            let Some(bar) = bar_for(bars, &symbol) else {
                continue;
            };
            let Some(state) = self.states.get_mut(&symbol) else {
                continue;
            };
            // A completed hour is analysed before the minute that closed it
            // reaches the calculator.
            let completed = state.consolidator.update(bar);
            if let Some(hour) = completed {
                if let Some(signal) = self.on_hour(time, &hour, holdings) {
                    entered.insert(signal.symbol.clone());
                    signals.push(signal);
                }
            }
            if let Some(state) = self.states.get_mut(&symbol) {
                state.calculator.update(bar.close, bar.volume);
            }
        }

        signals.extend(self.manage_positions(time, bars, holdings, &entered));
        signals
    }

    fn summary(&self) -> Vec<String> {
        self.config
            .symbols
            .iter()
            .map(|s| match self.current_vpin(s) {
                Some(v) => format!("{s}: final VPIN {v:.3}"),
                None => format!("{s}: VPIN not warm"),
            })
            .collect()
    }
}
