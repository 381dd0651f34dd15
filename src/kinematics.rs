use crate::config::SessionConfig;
use crate::mapper::Drive;

/// Converts a speed in px/s to km/h using the pixel scale.
pub fn kmh_from_pxps(pxps: f64, px_per_m: f64) -> f64 {
    (pxps / px_per_m) * 3.6
}

/// Vehicle state integrated once per tick from the commanded drive.
///
/// Scroll offsets exist for the parallax background only; they carry no
/// control semantics.
#[derive(Debug, Clone, Default)]
pub struct KinematicState {
    /// Current speed in px/s, clamped to [-v_rev_max, v_max].
    pub speed: f64,
    /// Signed cumulative distance, px.
    pub distance_px: f64,
    pub road_offset: f64,
    pub mid_offset: f64,
    pub far_offset: f64,
    /// Absolute distance in meters, for average-speed reporting.
    abs_distance_m: f64,
    /// Time accumulated while motion was enabled, seconds.
    moving_time_s: f64,
}

impl KinematicState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances one tick. When `enabled` is false the speed is hard-reset
    /// to zero for the tick (no decay) and nothing is integrated.
    pub fn step(&mut self, drive: Drive, dt: f64, enabled: bool, cfg: &SessionConfig) {
        let mut accel = cfg.a_max * drive.throttle
            - cfg.a_rev_max * drive.reverse
            - cfg.drag * (self.speed / cfg.v_max);
        if !enabled {
            accel = 0.0;
            self.speed = 0.0;
        }
        self.speed += accel * dt;
        self.speed = self.speed.clamp(-cfg.v_rev_max, cfg.v_max);

        if enabled {
            let ds = self.speed * dt;
            self.road_offset += ds;
            self.mid_offset += ds;
            self.far_offset += ds * 0.6;
            self.distance_px += ds;
            self.abs_distance_m += self.speed.abs() * dt / cfg.px_per_m;
            self.moving_time_s += dt;
        }
    }

    pub fn distance_m(&self, cfg: &SessionConfig) -> f64 {
        self.distance_px / cfg.px_per_m
    }

    /// Average absolute speed in km/h over the time motion was enabled.
    pub fn avg_speed_kmh(&self) -> f64 {
        if self.moving_time_s > 0.0 {
            self.abs_distance_m / self.moving_time_s * 3.6
        } else {
            0.0
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
