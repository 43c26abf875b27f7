//! Peak-to-trough drawdown guard.

#[derive(Debug, Clone)]
pub struct DrawdownGuard {
    max_drawdown: f64,
    peak: Option<f64>,
}

impl DrawdownGuard {
    pub fn new(max_drawdown: f64) -> Self {
        Self {
            max_drawdown,
            peak: None,
        }
    }

    /// Updates the running peak with `equity`. Returns the current drawdown
    /// when it exceeds the limit.
    pub fn update(&mut self, equity: f64) -> Option<f64> {
        let peak = self.peak.map_or(equity, |p| p.max(equity));
        self.peak = Some(peak);
        if peak <= 0.0 {
            return None;
        }
        let drawdown = (peak - equity) / peak;
        (drawdown > self.max_drawdown).then_some(drawdown)
    }

    pub fn peak(&self) -> Option<f64> {
        self.peak
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }
}
