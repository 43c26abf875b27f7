//! Sector rotation by relative-strength acceleration.
//!
//! Ranks sectors by a composite of RS acceleration, velocity and level
//! against the benchmark, and rotates into the leaders that are both
//! gaining strength and gaining it faster.

use crate::domain::engine::{any_invested, SignalEngine};
use crate::domain::estimator::relative_strength::{composite_score, relative_strength, RsParams, RsTracker};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::position::{PositionBook, TrackedPosition};
use crate::domain::risk::DrawdownGuard;
use crate::domain::rolling::RollingWindow;
use crate::domain::signal::Signal;
use crate::ports::config_port::ConfigPort;
use crate::ports::holdings_port::HoldingsPort;
use chrono::{Datelike, NaiveDateTime, Weekday};
use std::collections::HashMap;
use tracing::{debug, info};

pub const SECTION: &str = "rotation";

const DEFAULT_SECTORS: [&str; 11] = [
    "XLK", "XLF", "XLE", "XLV", "XLI", "XLC", "XLY", "XLP", "XLU", "XLB", "XLRE",
];

#[derive(Debug, Clone, PartialEq)]
pub struct RotationConfig {
    pub benchmark: String,
    pub sectors: Vec<String>,
    pub history: usize,
    pub rs_lookback: usize,
    pub rs: RsParams,
    pub min_rank_readings: usize,
    pub top_n: usize,
    pub max_sector_weight: f64,
    pub total_exposure: f64,
    pub sector_stop: f64,
    pub max_drawdown: f64,
    pub rebalance_days: i64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            benchmark: "SPY".into(),
            sectors: DEFAULT_SECTORS.iter().map(|s| s.to_string()).collect(),
            history: 100,
            rs_lookback: 20,
            rs: RsParams::default(),
            min_rank_readings: 10,
            top_n: 3,
            max_sector_weight: 0.25,
            total_exposure: 0.90,
            sector_stop: 0.08,
            max_drawdown: 0.18,
            rebalance_days: 5,
        }
    }
}

impl RotationConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let d = Self::default();
        let benchmark = config
            .get_symbols(SECTION, "benchmark", &[])
            .into_iter()
            .next()
            .unwrap_or(d.benchmark);
        Self {
            benchmark,
            sectors: config.get_symbols(SECTION, "sectors", &DEFAULT_SECTORS),
            history: config.get_usize(SECTION, "history", d.history),
            rs_lookback: config.get_usize(SECTION, "rs_lookback", d.rs_lookback),
            rs: RsParams {
                rs_history: config.get_usize(SECTION, "rs_history", d.rs.rs_history),
                velocity_history: config.get_usize(SECTION, "velocity_history", d.rs.velocity_history),
                velocity_lookback: config.get_usize(SECTION, "velocity_lookback", d.rs.velocity_lookback),
                accel_lookback: config.get_usize(SECTION, "accel_lookback", d.rs.accel_lookback),
            },
            min_rank_readings: config.get_usize(SECTION, "min_rank_readings", d.min_rank_readings),
            top_n: config.get_usize(SECTION, "top_n", d.top_n),
            max_sector_weight: config.get_double(SECTION, "max_sector_weight", d.max_sector_weight),
            total_exposure: config.get_double(SECTION, "total_exposure", d.total_exposure),
            sector_stop: config.get_double(SECTION, "sector_stop", d.sector_stop),
            max_drawdown: config.get_double(SECTION, "max_drawdown", d.max_drawdown),
            rebalance_days: config.get_int(SECTION, "rebalance_days", d.rebalance_days),
        }
    }

    /// Closes needed before RS can be measured.
    fn min_prices(&self) -> usize {
        self.rs_lookback + 10
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectorRanking {
    pub symbol: String,
    pub level: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub score: f64,
}

/// Leaders among the first `2 * top_n` rankings with positive velocity
/// and acceleration, at most `top_n` of them.
pub fn select_leaders(rankings: &[SectorRanking], top_n: usize) -> Vec<&SectorRanking> {
    rankings
        .iter()
        .take(top_n * 2)
        .filter(|r| r.velocity > 0.0 && r.acceleration > 0.0)
        .take(top_n)
        .collect()
}

/// Score-weighted allocation of `exposure`, each weight capped at `cap`.
pub fn leader_weights(leaders: &[&SectorRanking], exposure: f64, cap: f64) -> Vec<f64> {
    let total: f64 = leaders.iter().map(|r| r.score).sum();
    leaders
        .iter()
        .map(|r| {
            if total > 0.0 {
                (r.score / total * exposure).min(cap)
            } else {
                0.0
            }
        })
        .collect()
}

pub struct SectorRotationEngine {
    config: RotationConfig,
    prices: HashMap<String, RollingWindow>,
    trackers: HashMap<String, RsTracker>,
    rankings: Vec<SectorRanking>,
    last_rebalance: Option<NaiveDateTime>,
    book: PositionBook,
    guard: DrawdownGuard,
}

impl SectorRotationEngine {
    pub fn new(config: RotationConfig) -> Self {
        let mut prices: HashMap<String, RollingWindow> = config
            .sectors
            .iter()
            .map(|s| (s.clone(), RollingWindow::new(config.history)))
            .collect();
        prices.insert(config.benchmark.clone(), RollingWindow::new(config.history));
        let trackers = config
            .sectors
            .iter()
            .map(|s| (s.clone(), RsTracker::new(config.rs)))
            .collect();
        Self {
            prices,
            trackers,
            rankings: Vec::new(),
            last_rebalance: None,
            book: PositionBook::new(),
            guard: DrawdownGuard::new(config.max_drawdown),
            config,
        }
    }

    pub fn rankings(&self) -> &[SectorRanking] {
        &self.rankings
    }

    pub fn positions(&self) -> &PositionBook {
        &self.book
    }

    fn now_and_past(&self, symbol: &str) -> Option<(f64, f64)> {
        let prices = self.prices.get(symbol)?;
        if prices.len() < self.config.min_prices() {
            return None;
        }
        Some((prices.last()?, prices.from_end(self.config.rs_lookback - 1)?))
    }

    fn calculate_velocity(&mut self) {
        let Some((bench_now, bench_past)) = self.now_and_past(&self.config.benchmark) else {
            return;
        };
        if bench_past <= 0.0 {
            return;
        }
        for symbol in self.config.sectors.clone() {
            let Some((now, past)) = self.now_and_past(&symbol) else {
                continue;
            };
            let Some(rs) = relative_strength(now, past, bench_now, bench_past) else {
                continue;
            };
            if let Some(tracker) = self.trackers.get_mut(&symbol) {
                tracker.push(rs);
            }
        }
        self.rank();
    }

    fn rank(&mut self) {
        let mut rankings: Vec<SectorRanking> = self
            .config
            .sectors
            .iter()
            .filter_map(|symbol| {
                let t = self.trackers.get(symbol)?;
                if t.readings() < self.config.min_rank_readings {
                    return None;
                }
                let level = t.level().unwrap_or(1.0);
                let velocity = t.velocity().unwrap_or(0.0);
                let acceleration = t.acceleration();
                Some(SectorRanking {
                    symbol: symbol.clone(),
                    level,
                    velocity,
                    acceleration,
                    score: composite_score(level, velocity, acceleration),
                })
            })
            .collect();
        rankings.sort_by(|a, b| b.score.total_cmp(&a.score));
        self.rankings = rankings;
    }

    fn rebalance_due(&self, time: NaiveDateTime) -> bool {
        if !matches!(time.weekday(), Weekday::Mon | Weekday::Thu) {
            return false;
        }
        self.last_rebalance
            .is_none_or(|last| (time - last).num_days() >= self.config.rebalance_days)
    }

    fn rebalance(&mut self, time: NaiveDateTime, holdings: &dyn HoldingsPort) -> Vec<Signal> {
        let cfg = &self.config;
        if self.rankings.len() < cfg.top_n || !self.rebalance_due(time) {
            return Vec::new();
        }
        self.last_rebalance = Some(time);

        let leaders = select_leaders(&self.rankings, cfg.top_n);
        if leaders.is_empty() {
            info!("no accelerating sectors, going defensive");
            self.book.clear();
            return vec![Signal::liquidate_all(time, "no accelerating sectors")];
        }

        let mut signals = Vec::new();
        for symbol in &cfg.sectors {
            if holdings.is_invested(symbol) && !leaders.iter().any(|l| &l.symbol == symbol) {
                self.book.close(symbol);
                signals.push(Signal::liquidate(time, symbol, "rotated out"));
            }
        }

        let weights = leader_weights(&leaders, cfg.total_exposure, cfg.max_sector_weight);
        for (leader, weight) in leaders.iter().zip(weights) {
            if let Some(price) = self.prices.get(&leader.symbol).and_then(|p| p.last()) {
                self.book.open(
                    &leader.symbol,
                    TrackedPosition::new(price, price * (1.0 - cfg.sector_stop), leader.acceleration),
                );
            }
            signals.push(Signal::set_weight(
                time,
                &leader.symbol,
                weight,
                format!("rotation score {:.3}", leader.score),
            ));
        }
        debug!(
            leaders = ?leaders.iter().map(|l| l.symbol.as_str()).collect::<Vec<_>>(),
            "rotation"
        );
        signals
    }
}

impl SignalEngine for SectorRotationEngine {
    fn name(&self) -> &'static str {
        SECTION
    }

    fn symbols(&self) -> Vec<String> {
        let mut all = vec![self.config.benchmark.clone()];
        all.extend(self.config.sectors.iter().cloned());
        all
    }

    fn on_data(&mut self, time: NaiveDateTime, bars: &[OhlcvBar], holdings: &dyn HoldingsPort) -> Vec<Signal> {
        self.last_rebalance.get_or_insert(time);
        for bar in bars {
            if let Some(prices) = self.prices.get_mut(&bar.code) {
                prices.push(bar.close);
            }
        }

        if let Some(equity) = holdings.total_value() {
            if let Some(drawdown) = self.guard.update(equity) {
                self.book.clear();
                if any_invested(holdings, &self.symbols()) {
                    info!(drawdown, "rotation drawdown stop");
                    return vec![Signal::liquidate_all(time, format!("drawdown {:.2}%", drawdown * 100.0))];
                }
            }
        }

        let mut signals = Vec::new();
        for symbol in self.book.symbols() {
            if !holdings.is_invested(&symbol) {
                continue;
            }
            let Some(price) = self.prices.get(&symbol).and_then(|p| p.last()) else {
                continue;
            };
            if self.book.get(&symbol).is_some_and(|p| p.should_stop(price)) {
                debug!(symbol = %symbol, price, "sector stop");
                self.book.close(&symbol);
                signals.push(Signal::liquidate(time, &symbol, "sector stop"));
            }
        }
        signals
    }

    fn on_schedule(&mut self, time: NaiveDateTime, holdings: &dyn HoldingsPort) -> Vec<Signal> {
        self.last_rebalance.get_or_insert(time);
        self.calculate_velocity();
        self.rebalance(time, holdings)
    }

    fn summary(&self) -> Vec<String> {
        self.rankings
            .iter()
            .take(5)
            .enumerate()
            .map(|(i, r)| {
                format!(
                    "{}. {}: accel={:.4} vel={:.4} rs={:.3}",
                    i + 1,
                    r.symbol,
                    r.acceleration,
                    r.velocity,
                    r.level
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::test_support::{bar_at, FixedHoldings};
    use crate::domain::signal::SignalAction;
    use chrono::{Duration, NaiveDate};

    fn ranking(symbol: &str, velocity: f64, acceleration: f64, score: f64) -> SectorRanking {
        SectorRanking {
            symbol: symbol.into(),
            level: 1.0,
            velocity,
            acceleration,
            score,
        }
    }

    /// 2024-01-01 is a Monday.
    fn day(n: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            + Duration::days(n)
    }

    fn small_config() -> RotationConfig {
        RotationConfig {
            sectors: vec!["XLK".into(), "XLE".into(), "XLU".into(), "XLP".into()],
            top_n: 2,
            ..RotationConfig::default()
        }
    }

    #[test]
    fn leaders_need_positive_velocity_and_acceleration() {
        let rankings = vec![
            ranking("A", 0.01, 0.001, 0.9),
            ranking("B", -0.01, 0.001, 0.8),
            ranking("C", 0.01, -0.001, 0.7),
            ranking("D", 0.01, 0.001, 0.6),
            ranking("E", 0.01, 0.001, 0.5),
        ];
        let leaders = select_leaders(&rankings, 2);
        let names: Vec<&str> = leaders.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(names, vec!["A", "D"]);

        // Only the first 2 * top_n are considered.
        let leaders = select_leaders(&rankings[1..], 1);
        assert!(leaders.is_empty());
    }

    #[test]
    fn weights_are_score_weighted_and_capped() {
        let a = ranking("A", 0.01, 0.001, 0.6);
        let b = ranking("B", 0.01, 0.001, 0.3);
        let weights = leader_weights(&[&a, &b], 0.9, 0.25);
        assert_eq!(weights, vec![0.25, 0.25]);

        let weights = leader_weights(&[&a, &b], 0.3, 0.25);
        assert!((weights[0] - 0.2).abs() < 1e-12);
        assert!((weights[1] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn rebalance_only_on_monday_or_thursday_after_interval() {
        let mut engine = SectorRotationEngine::new(small_config());
        engine.last_rebalance = Some(day(0));
        assert!(!engine.rebalance_due(day(1)));
        assert!(!engine.rebalance_due(day(3)), "Thursday but only 3 days");
        assert!(engine.rebalance_due(day(7)), "next Monday");
        assert!(!engine.rebalance_due(day(8)));
        assert!(engine.rebalance_due(day(10)), "Thursday after 10 days");
    }

    /// Feeds daily closes where XLK and XLE accelerate against a slowly
    /// rising benchmark while XLU falls and XLP stays flat.
    fn feed(engine: &mut SectorRotationEngine, days: i64, holdings: &FixedHoldings) -> Vec<Signal> {
        let mut out = Vec::new();
        for d in 0..days {
            let t = day(d);
            let x = d as f64;
            let bars = vec![
                bar_at("SPY", t, 100.0 * (1.0 + 0.001 * x), 1.0),
                bar_at("XLK", t, 100.0 * (0.0001 * x * x).exp(), 1.0),
                bar_at("XLE", t, 100.0 * (0.00005 * x * x).exp(), 1.0),
                bar_at("XLU", t, 100.0 * (1.0 - 0.001 * x), 1.0),
                bar_at("XLP", t, 100.0, 1.0),
            ];
            out.extend(engine.on_data(t, &bars, holdings));
            out.extend(engine.on_schedule(t, holdings));
        }
        out
    }

    #[test]
    fn accelerating_sectors_lead_the_rotation() {
        let mut engine = SectorRotationEngine::new(small_config());
        let signals = feed(&mut engine, 70, &FixedHoldings::with("XLU", 0.2));

        assert_eq!(engine.rankings().len(), 4);
        assert_eq!(engine.rankings()[0].symbol, "XLK");

        let weights: Vec<&Signal> = signals.iter().filter(|s| s.action == SignalAction::SetWeight).collect();
        assert!(!weights.is_empty());
        assert!(weights.iter().all(|s| s.symbol == "XLK" || s.symbol == "XLE"));
        assert!(weights.iter().all(|s| s.size > 0.0 && s.size <= 0.25));
        assert!(signals
            .iter()
            .any(|s| s.action == SignalAction::Liquidate && s.symbol == "XLU"));
        assert!(engine.positions().contains("XLK"));
    }

    #[test]
    fn sector_stop_liquidates_invested_position() {
        let mut engine = SectorRotationEngine::new(small_config());
        engine.book.open("XLK", TrackedPosition::new(100.0, 92.0, 0.0));
        let long = FixedHoldings::with("XLK", 0.25);
        assert!(engine.on_data(day(0), &[bar_at("XLK", day(0), 93.0, 1.0)], &long).is_empty());
        let signals = engine.on_data(day(1), &[bar_at("XLK", day(1), 91.0, 1.0)], &long);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].action, SignalAction::Liquidate);
        assert!(!engine.positions().contains("XLK"));
    }

    #[test]
    fn drawdown_liquidates_all() {
        let mut engine = SectorRotationEngine::new(small_config());
        let mut holdings = FixedHoldings::with("XLK", 0.25);
        holdings.total = Some(100.0);
        engine.on_data(day(0), &[], &holdings);
        holdings.total = Some(81.0);
        let signals = engine.on_data(day(1), &[], &holdings);
        assert_eq!(signals[0].action, SignalAction::LiquidateAll);

        // once flat, a lasting drawdown stays silent
        let mut flat = FixedHoldings::default();
        flat.total = Some(81.0);
        assert!(engine.on_data(day(2), &[], &flat).is_empty());
    }
}
