//! Implied-vs-realized correlation dispersion engine.
//!
//! Each day the mean pairwise correlation of sector returns is compared with
//! a correlation implied by index volatility relative to sector volatility.
//! A rich implied correlation goes long sectors against a short index; a
//! cheap one goes long the index against short sectors.

use crate::domain::engine::{any_invested, SignalEngine};
use crate::domain::estimator::correlation::{
    annualized_volatility, implied_correlation_proxy, realized_correlation,
    CorrelationSpreadTracker, TRADING_DAYS,
};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::risk::DrawdownGuard;
use crate::domain::rolling::RollingWindow;
use crate::domain::signal::Signal;
use crate::domain::stats::mean;
use crate::ports::config_port::ConfigPort;
use crate::ports::holdings_port::HoldingsPort;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

pub const SECTION: &str = "dispersion";

const DEFAULT_SECTORS: [&str; 8] = ["XLK", "XLF", "XLE", "XLV", "XLI", "XLC", "XLY", "XLP"];

#[derive(Debug, Clone, PartialEq)]
pub struct DispersionConfig {
    pub index: String,
    pub sectors: Vec<String>,
    pub history: usize,
    pub lookback: usize,
    pub min_sectors: usize,
    pub spread_history: usize,
    pub min_spread_history: usize,
    pub min_spread_std: f64,
    pub min_signal: f64,
    pub zscore_threshold: f64,
    pub max_sector_weight: f64,
    pub max_index_weight: f64,
    pub max_drawdown: f64,
}

impl Default for DispersionConfig {
    fn default() -> Self {
        Self {
            index: "SPY".into(),
            sectors: DEFAULT_SECTORS.iter().map(|s| s.to_string()).collect(),
            history: 60,
            lookback: 20,
            min_sectors: 5,
            spread_history: 252,
            min_spread_history: 60,
            min_spread_std: 0.01,
            min_signal: 0.3,
            zscore_threshold: 1.5,
            max_sector_weight: 0.10,
            max_index_weight: 0.40,
            max_drawdown: 0.12,
        }
    }
}

impl DispersionConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let d = Self::default();
        let index = config
            .get_symbols(SECTION, "index", &[])
            .into_iter()
            .next()
            .unwrap_or(d.index);
        Self {
            index,
            sectors: config.get_symbols(SECTION, "sectors", &DEFAULT_SECTORS),
            history: config.get_usize(SECTION, "history", d.history),
            lookback: config.get_usize(SECTION, "lookback", d.lookback),
            min_sectors: config.get_usize(SECTION, "min_sectors", d.min_sectors),
            spread_history: config.get_usize(SECTION, "spread_history", d.spread_history),
            min_spread_history: config.get_usize(SECTION, "min_spread_history", d.min_spread_history),
            min_spread_std: config.get_double(SECTION, "min_spread_std", d.min_spread_std),
            min_signal: config.get_double(SECTION, "min_signal", d.min_signal),
            zscore_threshold: config.get_double(SECTION, "zscore_threshold", d.zscore_threshold),
            max_sector_weight: config.get_double(SECTION, "max_sector_weight", d.max_sector_weight),
            max_index_weight: config.get_double(SECTION, "max_index_weight", d.max_index_weight),
            max_drawdown: config.get_double(SECTION, "max_drawdown", d.max_drawdown),
        }
    }

    fn all_symbols(&self) -> Vec<String> {
        let mut all = vec![self.index.clone()];
        all.extend(self.sectors.iter().filter(|s| **s != self.index).cloned());
        all
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispersionPosition {
    Flat,
    /// Long sectors, short index.
    Long,
    /// Long index, short sectors.
    Short,
}

impl fmt::Display for DispersionPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispersionPosition::Flat => write!(f, "FLAT"),
            DispersionPosition::Long => write!(f, "DISPERSION_LONG"),
            DispersionPosition::Short => write!(f, "DISPERSION_SHORT"),
        }
    }
}

/// Realized and implied correlation over the trailing returns. Sectors
/// with fewer than `lookback` returns are left out; `None` when fewer than
/// `min_sectors` qualify or the index is short.
pub fn correlation_snapshot(
    index_returns: &[f64],
    sector_returns: &[Vec<f64>],
    lookback: usize,
    min_sectors: usize,
) -> Option<(f64, f64)> {
    let tail = |r: &[f64]| r[r.len() - lookback..].to_vec();
    let sectors: Vec<Vec<f64>> = sector_returns
        .iter()
        .filter(|r| r.len() >= lookback)
        .map(|r| tail(r.as_slice()))
        .collect();
    if sectors.len() < min_sectors || index_returns.len() < lookback {
        return None;
    }

    let realized = realized_correlation(&sectors)?;
    let vols: Vec<f64> = sectors
        .iter()
        .map(|r| annualized_volatility(r, TRADING_DAYS))
        .collect();
    let index_vol = annualized_volatility(&tail(index_returns), TRADING_DAYS);
    Some((realized, implied_correlation_proxy(index_vol, mean(&vols))))
}

pub struct DispersionEngine {
    config: DispersionConfig,
    prices: HashMap<String, RollingWindow>,
    returns: HashMap<String, RollingWindow>,
    tracker: CorrelationSpreadTracker,
    position: DispersionPosition,
    guard: DrawdownGuard,
}

impl DispersionEngine {
    pub fn new(config: DispersionConfig) -> Self {
        let all = config.all_symbols();
        let windows = || -> HashMap<String, RollingWindow> {
            all.iter()
                .map(|s| (s.clone(), RollingWindow::new(config.history)))
                .collect()
        };
        Self {
            prices: windows(),
            returns: windows(),
            tracker: CorrelationSpreadTracker::new(
                config.spread_history,
                config.min_spread_history,
                config.min_spread_std,
            ),
            position: DispersionPosition::Flat,
            guard: DrawdownGuard::new(config.max_drawdown),
            config,
        }
    }

    pub fn signal(&self) -> f64 {
        self.tracker.signal()
    }

    pub fn position(&self) -> DispersionPosition {
        self.position
    }

    fn returns_of(&self, symbol: &str) -> Vec<f64> {
        self.returns
            .get(symbol)
            .map(|w| w.to_vec())
            .unwrap_or_default()
    }

    fn calculate_correlations(&mut self) {
        let cfg = &self.config;
        let sector_returns: Vec<Vec<f64>> = cfg.sectors.iter().map(|s| self.returns_of(s)).collect();
        let index_returns = self.returns_of(&cfg.index);

        let Some((realized, implied)) =
            correlation_snapshot(&index_returns, &sector_returns, cfg.lookback, cfg.min_sectors)
        else {
            return;
        };
        let signal = self.tracker.push(realized, implied);
        debug!(realized, implied, spread = implied - realized, signal, "correlation update");
    }

    fn execute(&mut self) {
        let signal = self.tracker.signal();
        if signal.abs() < self.config.min_signal {
            return;
        }
        let threshold = self.config.zscore_threshold / 2.0;
        let next = if signal > threshold {
            DispersionPosition::Long
        } else if signal < -threshold {
            DispersionPosition::Short
        } else {
            return;
        };
        if next != self.position {
            debug!(from = %self.position, to = %next, signal, "dispersion position change");
        }
        self.position = next;
    }

    fn rebalance(&self, time: NaiveDateTime, holdings: &dyn HoldingsPort) -> Vec<Signal> {
        let cfg = &self.config;
        let strength = self.tracker.signal().abs();
        let (index_weight, sector_weight) = match self.position {
            DispersionPosition::Long => (
                -cfg.max_index_weight * strength * 0.8,
                cfg.max_sector_weight * strength,
            ),
            DispersionPosition::Short => (
                cfg.max_index_weight * strength,
                -cfg.max_sector_weight * strength * 0.5,
            ),
            DispersionPosition::Flat => {
                return if any_invested(holdings, &cfg.all_symbols()) {
                    vec![Signal::liquidate_all(time, "dispersion flat")]
                } else {
                    Vec::new()
                };
            }
        };

        let reason = format!("{} signal {:.2}", self.position, self.tracker.signal());
        let mut signals = vec![Signal::set_weight(time, &cfg.index, index_weight, reason.clone())];
        signals.extend(
            cfg.sectors
                .iter()
                .map(|s| Signal::set_weight(time, s, sector_weight, reason.clone())),
        );
        signals
    }
}

impl SignalEngine for DispersionEngine {
    fn name(&self) -> &'static str {
        SECTION
    }

    fn symbols(&self) -> Vec<String> {
        self.config.all_symbols()
    }

    fn on_data(&mut self, time: NaiveDateTime, bars: &[OhlcvBar], holdings: &dyn HoldingsPort) -> Vec<Signal> {
        for bar in bars {
            let Some(prices) = self.prices.get_mut(&bar.code) else {
                continue;
            };
            if let Some(prev) = prices.last().filter(|p| *p > 0.0) {
                if let Some(returns) = self.returns.get_mut(&bar.code) {
                    returns.push((bar.close / prev).ln());
                }
            }
            prices.push(bar.close);
        }

        if let Some(equity) = holdings.total_value() {
            if let Some(drawdown) = self.guard.update(equity) {
                self.position = DispersionPosition::Flat;
                if any_invested(holdings, &self.config.all_symbols()) {
                    info!(drawdown, "dispersion drawdown stop");
                    return vec![Signal::liquidate_all(time, format!("drawdown {:.2}%", drawdown * 100.0))];
                }
            }
        }
        Vec::new()
    }

    fn on_schedule(&mut self, time: NaiveDateTime, holdings: &dyn HoldingsPort) -> Vec<Signal> {
        self.calculate_correlations();
        self.execute();
        self.rebalance(time, holdings)
    }

    fn summary(&self) -> Vec<String> {
        let mut lines = vec![format!("position {} signal {:.3}", self.position, self.signal())];
        if let (Some(r), Some(i)) = (self.tracker.average_realized(), self.tracker.average_implied()) {
            lines.push(format!("avg realized correlation {r:.3}"));
            lines.push(format!("avg implied correlation {i:.3}"));
        }
        lines
    }
}
