//! Relative strength with its first and second differences.
//!
//! RS = (1 + r_sector) / (1 + r_benchmark) over a fixed lookback.
//! Velocity is the average per-step change of RS over `velocity_lookback`
//! readings; acceleration is the same difference taken over velocities.

use crate::domain::rolling::RollingWindow;
use crate::domain::stats::clip;

pub fn relative_strength(
    sector_now: f64,
    sector_past: f64,
    bench_now: f64,
    bench_past: f64,
) -> Option<f64> {
    if sector_past <= 0.0 || bench_past <= 0.0 {
        return None;
    }
    let sector_return = sector_now / sector_past - 1.0;
    let bench_return = bench_now / bench_past - 1.0;
    if bench_return == 0.0 {
        return Some(1.0);
    }
    Some((1.0 + sector_return) / (1.0 + bench_return))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsParams {
    pub rs_history: usize,
    pub velocity_history: usize,
    pub velocity_lookback: usize,
    pub accel_lookback: usize,
}

impl Default for RsParams {
    fn default() -> Self {
        Self {
            rs_history: 40,
            velocity_history: 20,
            velocity_lookback: 10,
            accel_lookback: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RsTracker {
    params: RsParams,
    rs: RollingWindow,
    velocity: RollingWindow,
    acceleration: f64,
}

impl RsTracker {
    pub fn new(params: RsParams) -> Self {
        Self {
            rs: RollingWindow::new(params.rs_history),
            velocity: RollingWindow::new(params.velocity_history),
            acceleration: 0.0,
            params,
        }
    }

    pub fn push(&mut self, rs: f64) {
        self.rs.push(rs);

        let vl = self.params.velocity_lookback.max(1);
        if self.rs.len() < vl {
            return;
        }
        let (Some(newest), Some(past)) = (self.rs.from_end(0), self.rs.from_end(vl - 1)) else {
            return;
        };
        self.velocity.push((newest - past) / vl as f64);

        let al = self.params.accel_lookback.max(1);
        if self.velocity.len() >= al {
            if let (Some(v_new), Some(v_past)) =
                (self.velocity.from_end(0), self.velocity.from_end(al - 1))
            {
                self.acceleration = (v_new - v_past) / al as f64;
            }
        }
    }

    pub fn level(&self) -> Option<f64> {
        self.rs.last()
    }

    pub fn velocity(&self) -> Option<f64> {
        self.velocity.last()
    }

    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    pub fn readings(&self) -> usize {
        self.rs.len()
    }
}

/// Maps typical acceleration range [-0.01, 0.01] onto [0, 1].
pub fn normalize_acceleration(accel: f64) -> f64 {
    clip((accel + 0.01) / 0.02, 0.0, 1.0)
}

/// Maps typical velocity range [-0.05, 0.05] onto [0, 1].
pub fn normalize_velocity(vel: f64) -> f64 {
    clip((vel + 0.05) / 0.10, 0.0, 1.0)
}

/// Maps typical RS range [0.8, 1.2] onto [0, 1].
pub fn normalize_level(level: f64) -> f64 {
    clip((level - 0.8) / 0.4, 0.0, 1.0)
}

/// Acceleration 50%, velocity 30%, level 20%.
pub fn composite_score(level: f64, velocity: f64, acceleration: f64) -> f64 {
    0.50 * normalize_acceleration(acceleration)
        + 0.30 * normalize_velocity(velocity)
        + 0.20 * normalize_level(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rs_ratio() {
        // sector +10%, bench +5%
        let rs = relative_strength(110.0, 100.0, 105.0, 100.0).unwrap();
        assert_abs_diff_eq!(rs, 1.10 / 1.05, epsilon = 1e-12);
    }

    #[test]
    fn rs_flat_benchmark_is_one() {
        assert_eq!(relative_strength(120.0, 100.0, 100.0, 100.0), Some(1.0));
    }

    #[test]
    fn rs_rejects_non_positive_past() {
        assert!(relative_strength(1.0, 0.0, 1.0, 1.0).is_none());
        assert!(relative_strength(1.0, 1.0, 1.0, -1.0).is_none());
    }

    #[test]
    fn velocity_after_lookback() {
        let mut t = RsTracker::new(RsParams::default());
        for i in 0..9 {
            t.push(1.0 + i as f64 * 0.01);
        }
        assert!(t.velocity().is_none());
        t.push(1.09);
        // (1.09 - 1.00) / 10
        assert_abs_diff_eq!(t.velocity().unwrap(), 0.009, epsilon = 1e-12);
        assert_eq!(t.acceleration(), 0.0);
    }

    #[test]
    fn acceleration_of_quadratic_rs() {
        let mut t = RsTracker::new(RsParams::default());
        for i in 0..20 {
            let x = i as f64;
            t.push(1.0 + 0.001 * x * x);
        }
        // velocity_k = 0.001 * ((k)^2 - (k-9)^2) / 10 = 0.001 * (18k - 81) / 10
        // accel = (v_19 - v_15) / 5 = 0.001 * 18 * 4 / 10 / 5
        assert_abs_diff_eq!(t.acceleration(), 0.001 * 72.0 / 50.0, epsilon = 1e-12);
        assert_eq!(t.readings(), 20);
    }

    #[test]
    fn normalizers_are_bounded() {
        assert_eq!(normalize_acceleration(0.0), 0.5);
        assert_eq!(normalize_acceleration(1.0), 1.0);
        assert_eq!(normalize_velocity(-1.0), 0.0);
        assert_abs_diff_eq!(normalize_level(1.0), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn composite_weights() {
        // all mid-range → 0.5
        assert_abs_diff_eq!(composite_score(1.0, 0.0, 0.0), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(composite_score(2.0, 1.0, 1.0), 1.0, epsilon = 1e-12);
    }
}
