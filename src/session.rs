use crate::classifier::{DirectionClassifier, DirectionState};
use crate::config::SessionConfig;
use crate::filter::Calibrator;
use crate::kinematics::KinematicState;
use crate::mapper::map_drive;
use crate::phase::{build_sequence, PhaseKind, PhaseSpec};

/// Session lifecycle. A calibration overlay can be active in any of these
/// and suspends angle-dependent control without changing the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Lifecycle {
    NotStarted,
    Countdown,
    Running,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum RepDirection {
    Back,
    Front,
}

/// Running metrics for the repetition currently in progress.
#[derive(Debug, Clone, Default)]
struct RepMetrics {
    extreme_deg: Option<f64>,
    target_hit: bool,
    time_to_target: Option<f64>,
    elapsed_secs: f64,
}

/// Finalized snapshot of one repetition, appended exactly once when its
/// phase ends.
#[derive(Debug, Clone, PartialEq)]
pub struct RepRecord {
    pub direction: RepDirection,
    /// Peak excursion reached during the phase: max angle for front reps,
    /// min for back reps, clamped toward zero if the direction was never
    /// entered.
    pub extreme_deg: f64,
    /// Time from phase start to first crossing of the target angle;
    /// `None` if the target was never reached.
    pub time_to_target: Option<f64>,
}

/// Final session report, immutable once the protocol completes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub records: Vec<RepRecord>,
    pub total_secs: f64,
    pub avg_speed_kmh: f64,
}

/// All mutable per-session state, kept in one struct so a single tick can
/// be exercised in isolation.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub lifecycle: Lifecycle,
    pub countdown_left: f64,
    pub phase_index: usize,
    pub phase_left: f64,
    /// Continuous time the angle has stayed within the settle tolerance.
    pub settle_ok_time: f64,
    /// Total time spent in the current transition phase.
    pub settle_total_time: f64,
    pub reps_done: usize,
    pub elapsed_secs: f64,
    /// Zero offset from the last completed calibration window, degrees.
    pub zero_deg: f64,
    /// Calibrated control angle for this tick (forced to 0 when the
    /// session is not controllable).
    pub angle_deg: f64,
    pub angle_rate: f64,
    prev_angle: f64,
    rep: RepMetrics,
    records: Vec<RepRecord>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            lifecycle: Lifecycle::NotStarted,
            countdown_left: 0.0,
            phase_index: 0,
            phase_left: 0.0,
            settle_ok_time: 0.0,
            settle_total_time: 0.0,
            reps_done: 0,
            elapsed_secs: 0.0,
            zero_deg: 0.0,
            angle_deg: 0.0,
            angle_rate: 0.0,
            prev_angle: 0.0,
            rep: RepMetrics::default(),
            records: Vec::new(),
        }
    }
}

/// The control/session engine: consumes one filtered raw angle per tick
/// and advances calibration, classification, the exercise protocol and
/// the vehicle model. Never blocks; invalid commands are silent no-ops.
#[derive(Debug)]
pub struct Session {
    cfg: SessionConfig,
    sequence: Vec<PhaseSpec>,
    pub state: SessionState,
    pub kinematics: KinematicState,
    calibrator: Calibrator,
    classifier: DirectionClassifier,
    report: Option<SessionReport>,
}

impl Session {
    pub fn new(cfg: SessionConfig) -> Self {
        let sequence = build_sequence(&cfg);
        let calibrator = Calibrator::new(cfg.calibration_secs);
        let classifier = DirectionClassifier::new(cfg.angle_enter_deg, cfg.angle_exit_deg);
        Self {
            cfg,
            sequence,
            state: SessionState::new(),
            kinematics: KinematicState::new(),
            calibrator,
            classifier,
            report: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.cfg
    }

    pub fn sequence(&self) -> &[PhaseSpec] {
        &self.sequence
    }

    pub fn current_phase(&self) -> Option<PhaseSpec> {
        if self.state.lifecycle == Lifecycle::Running {
            self.sequence.get(self.state.phase_index).copied()
        } else {
            None
        }
    }

    pub fn direction(&self) -> DirectionState {
        self.classifier.state()
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrator.is_active()
    }

    pub fn records(&self) -> &[RepRecord] {
        &self.state.records
    }

    pub fn report(&self) -> Option<&SessionReport> {
        self.report.as_ref()
    }

    /// Total repetitions in the protocol (both directions).
    pub fn total_reps(&self) -> usize {
        self.cfg.reps_each * 2
    }

    /// Begins the session. Honored only before the first start; anything
    /// else is ignored.
    pub fn start(&mut self) {
        if self.state.lifecycle == Lifecycle::NotStarted {
            self.reset_session();
        }
    }

    /// Restarts a finished session from scratch. Ignored unless complete.
    pub fn restart(&mut self) {
        if self.state.lifecycle == Lifecycle::Complete {
            self.reset_session();
        }
    }

    /// Opens a host-side zero calibration window. Control output is held
    /// neutral until the window completes.
    pub fn begin_calibration(&mut self) {
        self.calibrator.start();
    }

    fn reset_session(&mut self) {
        let zero = self.state.zero_deg;
        self.state = SessionState::new();
        self.state.zero_deg = zero;
        self.state.lifecycle = Lifecycle::Countdown;
        self.state.countdown_left = self.cfg.start_countdown_secs;
        self.state.phase_left = self
            .sequence
            .first()
            .map(|p| p.duration_secs)
            .unwrap_or(0.0);
        self.kinematics.reset();
        self.classifier.force_neutral();
        self.report = None;
    }

    /// Advances the engine by one tick. `raw_angle` is the latest filtered
    /// sensor angle (stale values are fine; the worst case is a stationary
    /// vehicle), `dt` the measured tick duration in seconds.
    pub fn tick(&mut self, raw_angle: f64, dt: f64) {
        if let Some(zero) = self.calibrator.update(raw_angle, dt) {
            self.state.zero_deg = zero;
        }
        let calibrating = self.calibrator.is_active();
        let controllable = self.state.lifecycle == Lifecycle::Running && !calibrating;

        let angle = if controllable {
            raw_angle - self.state.zero_deg
        } else {
            0.0
        };
        self.state.angle_rate = (angle - self.state.prev_angle) / dt.max(1e-3);
        self.state.prev_angle = angle;
        self.state.angle_deg = angle;

        if controllable {
            self.classifier.update(angle);
        } else {
            self.classifier.force_neutral();
        }

        if matches!(
            self.state.lifecycle,
            Lifecycle::Countdown | Lifecycle::Running
        ) {
            self.state.elapsed_secs += dt;
        }

        // The calibration overlay pauses the countdown and the protocol
        // timers; the phase sequence resumes where it left off.
        if self.state.lifecycle == Lifecycle::Countdown && !calibrating {
            self.state.countdown_left -= dt;
            if self.state.countdown_left <= 0.0 {
                self.state.countdown_left = 0.0;
                if self.sequence.is_empty() {
                    self.complete();
                } else {
                    self.state.lifecycle = Lifecycle::Running;
                }
            }
        }

        if controllable {
            self.advance_protocol(angle, dt);
        }

        self.update_rep_metrics(angle, dt, calibrating);

        let drive = map_drive(angle, &self.cfg);
        let motion_enabled = self.state.lifecycle == Lifecycle::Running
            && !calibrating
            && self
                .current_phase()
                .map(|p| p.kind != PhaseKind::Transition)
                .unwrap_or(false);
        self.kinematics.step(drive, dt, motion_enabled, &self.cfg);
    }

    fn advance_protocol(&mut self, angle: f64, dt: f64) {
        let phase = self.sequence[self.state.phase_index];
        match phase.kind {
            PhaseKind::Transition => {
                self.state.settle_total_time += dt;
                if angle.abs() <= self.cfg.settle_tolerance_deg {
                    self.state.settle_ok_time += dt;
                } else {
                    // The settle window must be continuous, not cumulative.
                    self.state.settle_ok_time = 0.0;
                }
                self.state.phase_left -= dt;
                if self.state.settle_ok_time >= self.cfg.settle_secs
                    || self.state.settle_total_time >= self.cfg.settle_max_secs
                {
                    self.state.settle_ok_time = 0.0;
                    self.state.settle_total_time = 0.0;
                    self.advance_phase();
                }
            }
            _ => {
                self.state.phase_left -= dt;
                if self.state.phase_left <= 0.0 {
                    if phase.kind.is_rep() {
                        self.finalize_rep(phase.kind);
                    }
                    self.advance_phase();
                }
            }
        }
    }

    fn update_rep_metrics(&mut self, angle: f64, dt: f64, calibrating: bool) {
        if self.state.lifecycle != Lifecycle::Running || calibrating {
            return;
        }
        let Some(phase) = self.current_phase() else {
            return;
        };
        if !phase.kind.is_rep() {
            return;
        }
        let rep = &mut self.state.rep;
        rep.elapsed_secs += dt;
        rep.extreme_deg = Some(match rep.extreme_deg {
            None => angle,
            Some(e) if phase.kind == PhaseKind::RepFront => e.max(angle),
            Some(e) => e.min(angle),
        });
        if !rep.target_hit {
            let hit = match phase.kind {
                PhaseKind::RepFront => angle >= self.cfg.target_front_deg,
                PhaseKind::RepBack => angle <= self.cfg.target_back_deg,
                _ => false,
            };
            if hit {
                rep.target_hit = true;
                rep.time_to_target = Some(rep.elapsed_secs);
            }
        }
    }

    fn finalize_rep(&mut self, kind: PhaseKind) {
        let extreme = self.state.rep.extreme_deg.unwrap_or(0.0);
        // If the target direction was never entered, the extreme is
        // floored/ceiled at zero rather than recording the small opposite
        // excursion.
        let (direction, extreme_deg) = match kind {
            PhaseKind::RepFront => (RepDirection::Front, extreme.max(0.0)),
            _ => (RepDirection::Back, extreme.min(0.0)),
        };
        self.state.records.push(RepRecord {
            direction,
            extreme_deg,
            time_to_target: self.state.rep.time_to_target,
        });
        self.state.reps_done += 1;
        self.state.rep = RepMetrics::default();
    }

    fn advance_phase(&mut self) {
        self.state.phase_index += 1;
        match self.sequence.get(self.state.phase_index) {
            Some(next) => self.state.phase_left = next.duration_secs,
            None => self.complete(),
        }
    }

    fn complete(&mut self) {
        self.state.lifecycle = Lifecycle::Complete;
        self.report = Some(SessionReport {
            records: self.state.records.clone(),
            total_secs: self.state.elapsed_secs,
            avg_speed_kmh: self.kinematics.avg_speed_kmh(),
        });
    }
}
