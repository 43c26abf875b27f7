//! Signal engines.
//!
//! An engine consumes bars through [`SignalEngine::on_data`], runs its
//! periodic analysis in [`SignalEngine::on_schedule`] and answers with
//! [`Signal`]s. It reads the host portfolio only through [`HoldingsPort`].

pub mod correlation_dispersion;
pub mod entropy_regime;
pub mod fractal_breakout;
pub mod sector_rotation;
pub mod sma_crossover;
pub mod vol_term_structure;
pub mod vpin_toxicity;

use crate::domain::error::AlphaLabError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::Signal;
use crate::ports::config_port::ConfigPort;
use crate::ports::holdings_port::HoldingsPort;
use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

pub trait SignalEngine {
    fn name(&self) -> &'static str;

    /// Every symbol the engine needs bars for.
    fn symbols(&self) -> Vec<String>;

    /// Called once per timestamp with the bars that closed at `time`.
    fn on_data(
        &mut self,
        time: NaiveDateTime,
        bars: &[OhlcvBar],
        holdings: &dyn HoldingsPort,
    ) -> Vec<Signal>;

    /// Daily analysis hook.
    fn on_schedule(&mut self, _time: NaiveDateTime, _holdings: &dyn HoldingsPort) -> Vec<Signal> {
        Vec::new()
    }

    /// End-of-run report lines.
    fn summary(&self) -> Vec<String> {
        Vec::new()
    }
}

pub(crate) fn any_invested(holdings: &dyn HoldingsPort, symbols: &[String]) -> bool {
    symbols.iter().any(|s| holdings.is_invested(s))
}

pub(crate) fn bar_for<'a>(bars: &'a [OhlcvBar], symbol: &str) -> Option<&'a OhlcvBar> {
    bars.iter().find(|b| b.code == symbol)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Entropy,
    Fractal,
    Vpin,
    Dispersion,
    Rotation,
    TermStructure,
    SmaCrossover,
}

impl EngineKind {
    pub const ALL: [EngineKind; 7] = [
        EngineKind::Entropy,
        EngineKind::Fractal,
        EngineKind::Vpin,
        EngineKind::Dispersion,
        EngineKind::Rotation,
        EngineKind::TermStructure,
        EngineKind::SmaCrossover,
    ];

    /// Name of the INI section holding the engine's parameters.
    pub fn section(&self) -> &'static str {
        match self {
            EngineKind::Entropy => entropy_regime::SECTION,
            EngineKind::Fractal => fractal_breakout::SECTION,
            EngineKind::Vpin => vpin_toxicity::SECTION,
            EngineKind::Dispersion => correlation_dispersion::SECTION,
            EngineKind::Rotation => sector_rotation::SECTION,
            EngineKind::TermStructure => vol_term_structure::SECTION,
            EngineKind::SmaCrossover => sma_crossover::SECTION,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.section())
    }
}

impl FromStr for EngineKind {
    type Err = AlphaLabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        EngineKind::ALL
            .into_iter()
            .find(|k| k.section() == name)
            .ok_or(AlphaLabError::UnknownEngine { name })
    }
}

/// Builds the engine with parameters from its INI section.
pub fn build_engine(kind: EngineKind, config: &dyn ConfigPort) -> Box<dyn SignalEngine> {
    match kind {
        EngineKind::Entropy => Box::new(entropy_regime::EntropyRegimeEngine::new(
            entropy_regime::EntropyConfig::from_config(config),
        )),
        EngineKind::Fractal => Box::new(fractal_breakout::FractalBreakoutEngine::new(
            fractal_breakout::FractalConfig::from_config(config),
        )),
        EngineKind::Vpin => Box::new(vpin_toxicity::VpinToxicityEngine::new(
            vpin_toxicity::VpinConfig::from_config(config),
        )),
        EngineKind::Dispersion => Box::new(correlation_dispersion::DispersionEngine::new(
            correlation_dispersion::DispersionConfig::from_config(config),
        )),
        EngineKind::Rotation => Box::new(sector_rotation::SectorRotationEngine::new(
            sector_rotation::RotationConfig::from_config(config),
        )),
        EngineKind::TermStructure => Box::new(vol_term_structure::TermStructureEngine::new(
            vol_term_structure::TermStructureConfig::from_config(config),
        )),
        EngineKind::SmaCrossover => Box::new(sma_crossover::SmaCrossoverEngine::new(
            sma_crossover::SmaConfig::from_config(config),
        )),
    }
}
