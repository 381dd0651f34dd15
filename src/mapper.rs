use crate::config::SessionConfig;

/// Commanded actuation fractions, both in [0, 1]; at most one is nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Drive {
    pub throttle: f64,
    pub reverse: f64,
}

impl Drive {
    pub fn idle() -> Self {
        Self::default()
    }
}

/// Maps a calibrated angle to throttle/reverse fractions.
///
/// Inside the deadzone both outputs are zero. Outside, the deadzone width
/// is subtracted, the remainder is normalized by the per-direction max
/// angle and shaped by a power curve; with an exponent below 1 the
/// response is steep near the deadzone edge and flattens toward the end
/// of range.
pub fn map_drive(angle_deg: f64, cfg: &SessionConfig) -> Drive {
    let dz = cfg.deadzone_deg;
    if angle_deg.abs() < dz {
        return Drive::idle();
    }
    let a_eff = (angle_deg.abs() - dz).copysign(angle_deg);
    if a_eff > 0.0 {
        let t = (a_eff / cfg.angle_max_forward_deg).clamp(0.0, 1.0);
        Drive {
            throttle: t.powf(cfg.gamma_forward),
            reverse: 0.0,
        }
    } else {
        let t = (-a_eff / cfg.angle_max_reverse_deg).clamp(0.0, 1.0);
        Drive {
            throttle: 0.0,
            reverse: t.powf(cfg.gamma_reverse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SessionConfig {
        SessionConfig {
            deadzone_deg: 2.0,
            angle_max_forward_deg: 30.0,
            angle_max_reverse_deg: 30.0,
            gamma_forward: 0.9,
            gamma_reverse: 0.9,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn inside_deadzone_is_idle() {
        let cfg = cfg();
        assert_eq!(map_drive(1.0, &cfg), Drive::idle());
        assert_eq!(map_drive(-1.9, &cfg), Drive::idle());
        assert_eq!(map_drive(0.0, &cfg), Drive::idle());
    }

    #[test]
    fn forward_power_curve() {
        let cfg = cfg();
        let d = map_drive(16.0, &cfg);
        // t = (16-2)/30, throttle = t^0.9
        let expected = (14.0_f64 / 30.0).powf(0.9);
        assert!((d.throttle - expected).abs() < 1e-12);
        assert!((d.throttle - 0.503).abs() < 1e-3);
        assert_eq!(d.reverse, 0.0);
    }

    #[test]
    fn reverse_power_curve() {
        let cfg = cfg();
        let d = map_drive(-16.0, &cfg);
        let expected = (14.0_f64 / 30.0).powf(0.9);
        assert!((d.reverse - expected).abs() < 1e-12);
        assert_eq!(d.throttle, 0.0);
    }

    #[test]
    fn saturates_past_max_angle() {
        let cfg = cfg();
        let d = map_drive(90.0, &cfg);
        assert!((d.throttle - 1.0).abs() < 1e-12);
        let d = map_drive(-90.0, &cfg);
        assert!((d.reverse - 1.0).abs() < 1e-12);
    }

    #[test]
    fn outputs_mutually_exclusive_and_bounded() {
        let cfg = cfg();
        let mut a = -60.0;
        while a <= 60.0 {
            let d = map_drive(a, &cfg);
            assert!((0.0..=1.0).contains(&d.throttle));
            assert!((0.0..=1.0).contains(&d.reverse));
            assert!(d.throttle == 0.0 || d.reverse == 0.0);
            a += 0.7;
        }
    }
}
