use crate::config::SessionConfig;

/// Protocol phase kinds. `RepBack` asks for dorsiflexion ("lift back"),
/// `RepFront` for plantarflexion ("push forward"); `Transition` requires
/// the angle to settle back near zero between repetitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum PhaseKind {
    RepBack,
    RepFront,
    Transition,
    Rest,
}

impl PhaseKind {
    pub fn is_rep(&self) -> bool {
        matches!(self, PhaseKind::RepBack | PhaseKind::RepFront)
    }

    /// On-screen prompt for the phase, matching the exercise instructions.
    pub fn prompt(&self) -> &'static str {
        match self {
            PhaseKind::RepBack => "BACK — lift your foot",
            PhaseKind::RepFront => "FRONT — push your toes down",
            PhaseKind::Transition => "TRANSITION — return to zero",
            PhaseKind::Rest => "REST — relax",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseSpec {
    pub kind: PhaseKind,
    pub duration_secs: f64,
}

/// Builds the deterministic phase sequence: for each of `reps_each`
/// repetitions per direction, one back rep, a transition, one front rep,
/// and another transition. Always exactly `4 * reps_each` entries.
pub fn build_sequence(cfg: &SessionConfig) -> Vec<PhaseSpec> {
    let mut seq = Vec::with_capacity(cfg.reps_each * 4);
    for _ in 0..cfg.reps_each {
        seq.push(PhaseSpec {
            kind: PhaseKind::RepBack,
            duration_secs: cfg.rep_secs,
        });
        seq.push(PhaseSpec {
            kind: PhaseKind::Transition,
            duration_secs: cfg.settle_max_secs,
        });
        seq.push(PhaseSpec {
            kind: PhaseKind::RepFront,
            duration_secs: cfg.rep_secs,
        });
        seq.push(PhaseSpec {
            kind: PhaseKind::Transition,
            duration_secs: cfg.settle_max_secs,
        });
    }
    seq
}
