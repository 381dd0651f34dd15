use crate::util::mean;

/// Exponential low-pass filter for the raw angle stream.
///
/// The first sample passes through unchanged so the filter has no
/// start-up transient; afterwards `y = a*x + (1-a)*y`.
#[derive(Debug, Clone)]
pub struct LowPass {
    alpha: f64,
    state: Option<f64>,
}

impl LowPass {
    /// Alpha is clamped to [0.0, 1.0]. Lower alpha = more smoothing.
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            state: None,
        }
    }

    pub fn update(&mut self, x: f64) -> f64 {
        let y = match self.state {
            None => x,
            Some(prev) => self.alpha * x + (1.0 - self.alpha) * prev,
        };
        self.state = Some(y);
        y
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

/// Host-side zero calibration: buffers samples over a fixed window and
/// produces the arithmetic mean as the new zero offset.
///
/// Can be re-triggered at any time; doing so discards the buffer and
/// restarts the timer. While active, angle-dependent control must be
/// held neutral by the caller.
#[derive(Debug, Clone)]
pub struct Calibrator {
    window_secs: f64,
    elapsed: f64,
    samples: Vec<f64>,
    active: bool,
}

impl Calibrator {
    pub fn new(window_secs: f64) -> Self {
        Self {
            window_secs,
            elapsed: 0.0,
            samples: Vec::new(),
            active: false,
        }
    }

    pub fn start(&mut self) {
        self.active = true;
        self.elapsed = 0.0;
        self.samples.clear();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Feed one sample per tick. Returns the computed zero offset on the
    /// tick the window completes, `None` otherwise.
    pub fn update(&mut self, sample: f64, dt: f64) -> Option<f64> {
        if !self.active {
            return None;
        }
        self.samples.push(sample);
        self.elapsed += dt;
        if self.elapsed >= self.window_secs {
            self.active = false;
            // The buffer is never empty here; update() pushed at least once.
            let zero = mean(&self.samples).unwrap_or(0.0);
            self.samples.clear();
            return Some(zero);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_returns_input_exactly() {
        let mut f = LowPass::new(0.25);
        assert_eq!(f.update(17.3), 17.3);

        let mut g = LowPass::new(0.01);
        assert_eq!(g.update(-4.0), -4.0);
    }

    #[test]
    fn constant_input_converges_to_input() {
        let mut f = LowPass::new(0.25);
        f.update(0.0);
        let mut y = 0.0;
        for _ in 0..200 {
            y = f.update(10.0);
        }
        assert!((y - 10.0).abs() < 1e-6);
    }

    #[test]
    fn smoothing_follows_recurrence() {
        let mut f = LowPass::new(0.25);
        f.update(0.0);
        let y = f.update(8.0);
        assert!((y - 2.0).abs() < 1e-12); // 0.25*8 + 0.75*0
        let y2 = f.update(8.0);
        assert!((y2 - 3.5).abs() < 1e-12); // 0.25*8 + 0.75*2
    }

    #[test]
    fn reset_clears_state() {
        let mut f = LowPass::new(0.25);
        f.update(100.0);
        f.reset();
        assert_eq!(f.update(5.0), 5.0);
    }

    #[test]
    fn alpha_is_clamped() {
        let mut f = LowPass::new(7.0);
        f.update(0.0);
        assert_eq!(f.update(3.0), 3.0); // alpha 1.0: pass-through
    }

    #[test]
    fn calibrator_produces_mean_after_window() {
        let mut c = Calibrator::new(1.0);
        c.start();
        assert!(c.is_active());

        // Nine samples inside the window, the tenth completes it.
        for i in 0..9 {
            assert_eq!(c.update(i as f64, 0.1), None);
        }
        let zero = c.update(9.0, 0.1).unwrap();
        assert!((zero - 4.5).abs() < 1e-12);
        assert!(!c.is_active());
    }

    #[test]
    fn calibrator_inactive_ignores_samples() {
        let mut c = Calibrator::new(1.0);
        assert_eq!(c.update(42.0, 0.1), None);
        assert!(!c.is_active());
    }

    #[test]
    fn retrigger_discards_previous_buffer() {
        let mut c = Calibrator::new(0.5);
        c.start();
        c.update(100.0, 0.1);
        c.update(100.0, 0.1);
        c.start(); // restart mid-window
        for _ in 0..4 {
            assert_eq!(c.update(2.0, 0.1), None);
        }
        let zero = c.update(2.0, 0.1).unwrap();
        assert!((zero - 2.0).abs() < 1e-12);
    }
}
