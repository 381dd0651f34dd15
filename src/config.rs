use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Immutable set of session tunables. Angles are degrees, speeds are px/s,
/// accelerations px/s², durations seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Angle band around zero that produces no actuation.
    pub deadzone_deg: f64,
    /// Angle at which forward (plantar) actuation saturates.
    pub angle_max_forward_deg: f64,
    /// Angle at which reverse (dorsi) actuation saturates.
    pub angle_max_reverse_deg: f64,
    /// Power-curve exponent for the forward response.
    pub gamma_forward: f64,
    /// Power-curve exponent for the reverse response.
    pub gamma_reverse: f64,
    pub v_max: f64,
    pub v_rev_max: f64,
    pub a_max: f64,
    pub a_rev_max: f64,
    /// Drag coefficient, applied against forward-normalized speed.
    pub drag: f64,
    /// Pixels per simulated meter, for km/h and distance readouts.
    pub px_per_m: f64,
    pub start_countdown_secs: f64,
    /// Target angle for a successful front (plantar) repetition.
    pub target_front_deg: f64,
    /// Target angle for a successful back (dorsi) repetition, negative.
    pub target_back_deg: f64,
    /// Hysteresis enter threshold.
    pub angle_enter_deg: f64,
    /// Hysteresis exit threshold, strictly below enter.
    pub angle_exit_deg: f64,
    pub rep_secs: f64,
    pub rest_secs: f64,
    /// Repetitions per direction; the phase sequence has 4x this many entries.
    pub reps_each: usize,
    /// Continuous time within tolerance required to leave a transition.
    pub settle_secs: f64,
    pub settle_tolerance_deg: f64,
    /// Transition hard timeout; forces advance even if never settled.
    pub settle_max_secs: f64,
    pub calibration_secs: f64,
    pub filter_alpha: f64,
    pub low_battery_volts: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            deadzone_deg: 2.0,
            angle_max_forward_deg: 30.0,
            angle_max_reverse_deg: 30.0,
            gamma_forward: 0.9,
            gamma_reverse: 0.9,
            v_max: 980.0,
            v_rev_max: 600.0,
            a_max: 1200.0,
            a_rev_max: 900.0,
            drag: 180.0,
            px_per_m: 70.0,
            start_countdown_secs: 8.0,
            target_front_deg: 20.0,
            target_back_deg: -20.0,
            angle_enter_deg: 3.0,
            angle_exit_deg: 2.0,
            rep_secs: 10.0,
            rest_secs: 2.0,
            reps_each: 5,
            settle_secs: 3.0,
            settle_tolerance_deg: 2.5,
            settle_max_secs: 6.0,
            calibration_secs: 4.0,
            filter_alpha: 0.25,
            low_battery_volts: 3.6,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> SessionConfig;
    fn save(&self, cfg: &SessionConfig) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "dorsi") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("dorsi_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> SessionConfig {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<SessionConfig>(&bytes) {
                return cfg;
            }
        }
        SessionConfig::default()
    }

    fn save(&self, cfg: &SessionConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
