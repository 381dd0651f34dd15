/// Discrete command state derived from the calibrated angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum DirectionState {
    Neutral,
    Forward,
    Reverse,
}

/// Hysteresis classifier: enters a direction at the enter threshold and
/// only leaves it below the (smaller) exit threshold, so the state cannot
/// chatter when the angle hovers near a boundary.
#[derive(Debug, Clone)]
pub struct DirectionClassifier {
    enter_deg: f64,
    exit_deg: f64,
    state: DirectionState,
}

impl DirectionClassifier {
    pub fn new(enter_deg: f64, exit_deg: f64) -> Self {
        Self {
            enter_deg,
            exit_deg,
            state: DirectionState::Neutral,
        }
    }

    pub fn state(&self) -> DirectionState {
        self.state
    }

    pub fn update(&mut self, angle_deg: f64) -> DirectionState {
        self.state = match self.state {
            DirectionState::Neutral => {
                if angle_deg >= self.enter_deg {
                    DirectionState::Forward
                } else if angle_deg <= -self.enter_deg {
                    DirectionState::Reverse
                } else {
                    DirectionState::Neutral
                }
            }
            DirectionState::Forward => {
                if angle_deg < self.exit_deg {
                    DirectionState::Neutral
                } else {
                    DirectionState::Forward
                }
            }
            DirectionState::Reverse => {
                if angle_deg > -self.exit_deg {
                    DirectionState::Neutral
                } else {
                    DirectionState::Reverse
                }
            }
        };
        self.state
    }

    /// Used while the session is not controllable (pre-start, countdown,
    /// calibrating, complete): the hysteresis rules do not apply.
    pub fn force_neutral(&mut self) {
        self.state = DirectionState::Neutral;
    }
}
