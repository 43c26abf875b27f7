//! Simple moving average and crossover detection.

pub fn simple_moving_average(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossover {
    Bullish,
    Bearish,
}

/// Fast crossing above slow (from at-or-below) is bullish, crossing below
/// (from at-or-above) is bearish.
pub fn detect_crossover(prev_fast: f64, prev_slow: f64, fast: f64, slow: f64) -> Option<Crossover> {
    if prev_fast <= prev_slow && fast > slow {
        Some(Crossover::Bullish)
    } else if prev_fast >= prev_slow && fast < slow {
        Some(Crossover::Bearish)
    } else {
        None
    }
}
