//! Configuration validation.
//!
//! Checks the `[data]` section and the selected engine's section before
//! any bars are loaded. Absent keys fall back to engine defaults, which are
//! valid by construction, so only values present in the file can fail.

use crate::domain::engine::correlation_dispersion::{self, DispersionConfig};
use crate::domain::engine::entropy_regime::{self, EntropyConfig};
use crate::domain::engine::fractal_breakout::{self, FractalConfig};
use crate::domain::engine::sector_rotation::{self, RotationConfig};
use crate::domain::engine::sma_crossover::{self, SmaConfig, SmaMode};
use crate::domain::engine::vol_term_structure::{self, TermStructureConfig};
use crate::domain::engine::vpin_toxicity::{self, VpinConfig};
use crate::domain::engine::EngineKind;
use crate::domain::error::AlphaLabError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DATA_SECTION: &str = "data";
pub const ENGINE_SECTION: &str = "engine";
/// Starting equity of a replay when `[data] initial_value` is absent.
pub const DEFAULT_INITIAL_VALUE: f64 = 1.0;

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), AlphaLabError> {
    require(config, DATA_SECTION, "path")?;
    require(config, DATA_SECTION, "exchange")?;

    let start = parse_date(config, "start_date")?;
    let end = parse_date(config, "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(AlphaLabError::invalid(
                DATA_SECTION,
                "start_date",
                "start_date must be before end_date",
            ));
        }
    }

    let initial = config.get_double(DATA_SECTION, "initial_value", DEFAULT_INITIAL_VALUE);
    if !(initial.is_finite() && initial > 0.0) {
        return Err(AlphaLabError::invalid(
            DATA_SECTION,
            "initial_value",
            "must be a positive number",
        ));
    }
    Ok(())
}

/// Engine named in `[engine] name`, or `None` when the key is absent.
pub fn configured_engine(config: &dyn ConfigPort) -> Result<Option<EngineKind>, AlphaLabError> {
    match config.get_string(ENGINE_SECTION, "name") {
        Some(name) if !name.trim().is_empty() => name.parse().map(Some),
        _ => Ok(None),
    }
}

pub fn validate_engine_config(kind: EngineKind, config: &dyn ConfigPort) -> Result<(), AlphaLabError> {
    match kind {
        EngineKind::Entropy => validate_entropy(config),
        EngineKind::Fractal => validate_fractal(config),
        EngineKind::Vpin => validate_vpin(config),
        EngineKind::Dispersion => validate_dispersion(config),
        EngineKind::Rotation => validate_rotation(config),
        EngineKind::TermStructure => validate_term_structure(config),
        EngineKind::SmaCrossover => validate_sma(config),
    }
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, AlphaLabError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(AlphaLabError::missing(section, key)),
    }
}

fn parse_date(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, AlphaLabError> {
    match config.get_string(DATA_SECTION, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                AlphaLabError::invalid(
                    DATA_SECTION,
                    key,
                    format!("invalid {} format, expected YYYY-MM-DD", key),
                )
            }),
    }
}

/// Window lengths and counts must be at least 1. Reads the raw integer so
/// negative values are reported instead of falling back to the default.
fn window(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> Result<usize, AlphaLabError> {
    let value = config.get_int(section, key, default as i64);
    if value < 1 {
        return Err(AlphaLabError::invalid(section, key, format!("{key} must be at least 1")));
    }
    Ok(value as usize)
}

/// Fractions of equity or price in (0, 1].
fn fraction(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, AlphaLabError> {
    let value = config.get_double(section, key, default);
    if !(value > 0.0 && value <= 1.0) {
        return Err(AlphaLabError::invalid(section, key, format!("{key} must be in (0, 1]")));
    }
    Ok(value)
}

fn non_negative(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, AlphaLabError> {
    let value = config.get_double(section, key, default);
    if !(value >= 0.0) {
        return Err(AlphaLabError::invalid(section, key, format!("{key} must be non-negative")));
    }
    Ok(value)
}

fn ordered(section: &str, low_key: &str, low: f64, high_key: &str, high: f64) -> Result<(), AlphaLabError> {
    if low >= high {
        return Err(AlphaLabError::invalid(
            section,
            low_key,
            format!("{low_key} must be below {high_key}"),
        ));
    }
    Ok(())
}

fn validate_entropy(config: &dyn ConfigPort) -> Result<(), AlphaLabError> {
    let s = entropy_regime::SECTION;
    let d = EntropyConfig::default();
    let dim = window(config, s, "embedding_dim", d.embedding_dim)?;
    if dim < 2 {
        return Err(AlphaLabError::invalid(s, "embedding_dim", "embedding_dim must be at least 2"));
    }
    window(config, s, "tau", d.tau)?;
    window(config, s, "lookback", d.lookback)?;
    window(config, s, "history", d.history)?;
    window(config, s, "min_readings", d.min_readings)?;
    window(config, s, "momentum_period", d.momentum_period)?;
    let low = fraction(config, s, "low_threshold", d.low_threshold)?;
    let high = fraction(config, s, "high_threshold", d.high_threshold)?;
    ordered(s, "low_threshold", low, "high_threshold", high)?;
    fraction(config, s, "max_position", d.max_position)?;
    fraction(config, s, "stop_loss", d.stop_loss)?;
    fraction(config, s, "profit_target", d.profit_target)?;
    non_negative(config, s, "momentum_threshold", d.momentum_threshold)?;
    non_negative(config, s, "reversion_threshold", d.reversion_threshold)?;
    Ok(())
}

fn validate_fractal(config: &dyn ConfigPort) -> Result<(), AlphaLabError> {
    let s = fractal_breakout::SECTION;
    let d = FractalConfig::default();
    let lookback = window(config, s, "hurst_lookback", d.hurst.lookback)?;
    let min_lag = window(config, s, "min_lag", d.hurst.min_lag)?;
    let max_lag = window(config, s, "max_lag", d.hurst.max_lag)?;
    ordered(s, "min_lag", min_lag as f64, "max_lag", max_lag as f64)?;
    let buffer = window(config, s, "buffer", d.buffer)?;
    if buffer < lookback {
        return Err(AlphaLabError::invalid(s, "buffer", "buffer must hold at least hurst_lookback prices"));
    }
    window(config, s, "history", d.history)?;
    window(config, s, "min_readings", d.min_readings)?;
    window(config, s, "breakout_lookback", d.breakout_lookback)?;
    let mean_rev = fraction(config, s, "mean_rev_threshold", d.mean_rev_threshold)?;
    let trending = fraction(config, s, "trending_threshold", d.trending_threshold)?;
    ordered(s, "mean_rev_threshold", mean_rev, "trending_threshold", trending)?;
    fraction(config, s, "max_position", d.max_position)?;
    fraction(config, s, "base_stop", d.base_stop)?;
    Ok(())
}

fn validate_vpin(config: &dyn ConfigPort) -> Result<(), AlphaLabError> {
    let s = vpin_toxicity::SECTION;
    let d = VpinConfig::default();
    let bucket = config.get_double(s, "bucket_size", d.vpin.bucket_size);
    if !(bucket > 0.0) {
        return Err(AlphaLabError::invalid(s, "bucket_size", "bucket_size must be positive"));
    }
    window(config, s, "n_buckets", d.vpin.n_buckets)?;
    window(config, s, "sigma_lookback", d.vpin.sigma_lookback)?;
    window(config, s, "price_history", d.vpin.price_history)?;
    window(config, s, "vpin_history", d.vpin.vpin_history)?;
    window(config, s, "min_readings", d.min_readings)?;
    window(config, s, "momentum_period", d.momentum_period)?;
    let low = fraction(config, s, "low_threshold", d.low_toxicity)?;
    let high = fraction(config, s, "high_threshold", d.high_toxicity)?;
    ordered(s, "low_threshold", low, "high_threshold", high)?;
    non_negative(config, s, "acceleration", d.acceleration)?;
    fraction(config, s, "max_position", d.max_position)?;
    fraction(config, s, "stop_loss", d.base_stop)?;
    fraction(config, s, "profit_target", d.profit_target)?;
    if config.get_int(s, "signal_interval_secs", d.signal_interval_secs) < 0 {
        return Err(AlphaLabError::invalid(
            s,
            "signal_interval_secs",
            "signal_interval_secs must be non-negative",
        ));
    }
    Ok(())
}

fn validate_dispersion(config: &dyn ConfigPort) -> Result<(), AlphaLabError> {
    let s = correlation_dispersion::SECTION;
    let d = DispersionConfig::default();
    let history = window(config, s, "history", d.history)?;
    let lookback = window(config, s, "lookback", d.lookback)?;
    if lookback < 2 || lookback >= history {
        return Err(AlphaLabError::invalid(s, "lookback", "lookback must be at least 2 and below history"));
    }
    let min_sectors = window(config, s, "min_sectors", d.min_sectors)?;
    if min_sectors < 2 {
        return Err(AlphaLabError::invalid(s, "min_sectors", "min_sectors must be at least 2"));
    }
    window(config, s, "spread_history", d.spread_history)?;
    window(config, s, "min_spread_history", d.min_spread_history)?;
    non_negative(config, s, "min_spread_std", d.min_spread_std)?;
    non_negative(config, s, "min_signal", d.min_signal)?;
    non_negative(config, s, "zscore_threshold", d.zscore_threshold)?;
    fraction(config, s, "max_sector_weight", d.max_sector_weight)?;
    fraction(config, s, "max_index_weight", d.max_index_weight)?;
    fraction(config, s, "max_drawdown", d.max_drawdown)?;
    Ok(())
}

fn validate_rotation(config: &dyn ConfigPort) -> Result<(), AlphaLabError> {
    let s = sector_rotation::SECTION;
    let d = RotationConfig::default();
    let history = window(config, s, "history", d.history)?;
    let rs_lookback = window(config, s, "rs_lookback", d.rs_lookback)?;
    if rs_lookback + 10 > history {
        return Err(AlphaLabError::invalid(s, "rs_lookback", "history must hold rs_lookback + 10 closes"));
    }
    window(config, s, "rs_history", d.rs.rs_history)?;
    window(config, s, "velocity_history", d.rs.velocity_history)?;
    window(config, s, "velocity_lookback", d.rs.velocity_lookback)?;
    window(config, s, "accel_lookback", d.rs.accel_lookback)?;
    window(config, s, "min_rank_readings", d.min_rank_readings)?;
    window(config, s, "top_n", d.top_n)?;
    fraction(config, s, "max_sector_weight", d.max_sector_weight)?;
    fraction(config, s, "total_exposure", d.total_exposure)?;
    fraction(config, s, "sector_stop", d.sector_stop)?;
    fraction(config, s, "max_drawdown", d.max_drawdown)?;
    if config.get_int(s, "rebalance_days", d.rebalance_days) < 0 {
        return Err(AlphaLabError::invalid(s, "rebalance_days", "rebalance_days must be non-negative"));
    }
    Ok(())
}

fn validate_term_structure(config: &dyn ConfigPort) -> Result<(), AlphaLabError> {
    let s = vol_term_structure::SECTION;
    let d = TermStructureConfig::default();
    window(config, s, "price_history", d.price_history)?;
    window(config, s, "slope_history", d.slope_history)?;
    window(config, s, "min_prices", d.min_prices)?;
    window(config, s, "min_slopes", d.min_slopes)?;
    non_negative(config, s, "min_slope_std", d.min_slope_std)?;
    let t = d.thresholds;
    let extreme = config.get_double(s, "zscore_extreme_buy", t.extreme_buy);
    let buy = config.get_double(s, "zscore_buy", t.buy);
    let sell = config.get_double(s, "zscore_sell", t.sell);
    ordered(s, "zscore_extreme_buy", extreme, "zscore_buy", buy)?;
    ordered(s, "zscore_buy", buy, "zscore_sell", sell)?;
    let min = fraction(config, s, "min_weight", d.min_weight)?;
    let base = fraction(config, s, "base_weight", d.base_weight)?;
    let max = fraction(config, s, "max_weight", d.max_weight)?;
    ordered(s, "min_weight", min, "base_weight", base)?;
    ordered(s, "base_weight", base, "max_weight", max)?;
    non_negative(config, s, "backwardation_boost", d.backwardation_boost)?;
    non_negative(config, s, "rebalance_threshold", d.rebalance_threshold)?;
    fraction(config, s, "max_drawdown", d.max_drawdown)?;
    Ok(())
}

fn validate_sma(config: &dyn ConfigPort) -> Result<(), AlphaLabError> {
    let s = sma_crossover::SECTION;
    let d = SmaConfig::default();
    let fast = window(config, s, "fast_period", d.fast_period)?;
    let slow = window(config, s, "slow_period", d.slow_period)?;
    if let Some(mode) = config.get_string(s, "mode") {
        mode.parse::<SmaMode>()?;
    }
    ordered(s, "fast_period", fast as f64, "slow_period", slow as f64)
}
