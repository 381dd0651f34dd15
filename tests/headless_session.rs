use dorsi::config::SessionConfig;
use dorsi::session::{Lifecycle, RepDirection, Session};

// Headless protocol run without a TTY or a sensor: a closed-loop driver
// feeds the angle a compliant patient would produce for each phase.

const DT: f64 = 0.125;

fn test_config() -> SessionConfig {
    SessionConfig {
        start_countdown_secs: 0.25,
        reps_each: 2,
        rep_secs: 1.0,
        settle_secs: 0.25,
        settle_max_secs: 0.5,
        rest_secs: 0.25,
        calibration_secs: 0.5,
        ..SessionConfig::default()
    }
}

/// Angle a cooperative patient would hold in the current phase.
fn compliant_angle(session: &Session) -> f64 {
    use dorsi::phase::PhaseKind;
    match session.current_phase().map(|p| p.kind) {
        Some(PhaseKind::RepBack) => -25.0,
        Some(PhaseKind::RepFront) => 25.0,
        _ => 0.0,
    }
}

fn run_to_completion(session: &mut Session, angle_for: impl Fn(&Session) -> f64) -> usize {
    for ticks in 0..400 {
        if session.state.lifecycle == Lifecycle::Complete {
            return ticks;
        }
        let angle = angle_for(session);
        session.tick(angle, DT);
    }
    panic!("session did not complete within the tick budget");
}

#[test]
fn compliant_session_hits_every_target() {
    let mut session = Session::new(test_config());
    session.start();
    run_to_completion(&mut session, compliant_angle);

    let report = session.report().expect("completed session has a report");
    assert_eq!(report.records.len(), 4);

    for (i, rec) in report.records.iter().enumerate() {
        let expected_dir = if i % 2 == 0 {
            RepDirection::Back
        } else {
            RepDirection::Front
        };
        assert_eq!(rec.direction, expected_dir, "record {}", i);
        assert!(
            rec.time_to_target.is_some(),
            "record {} should have hit its target",
            i
        );
    }
    // Back extremes are negative, front extremes positive.
    assert!(report.records[0].extreme_deg <= -20.0);
    assert!(report.records[1].extreme_deg >= 20.0);

    assert!(report.total_secs > 0.0);
    assert!(report.avg_speed_kmh > 0.0);
}

#[test]
fn passive_session_records_misses() {
    // The patient never moves: every rep is logged, no target is hit and
    // the vehicle never accelerates.
    let mut session = Session::new(test_config());
    session.start();
    run_to_completion(&mut session, |_| 0.0);

    let report = session.report().expect("completed session has a report");
    assert_eq!(report.records.len(), 4);
    for rec in &report.records {
        assert_eq!(rec.time_to_target, None);
        assert_eq!(rec.extreme_deg, 0.0);
    }
    assert_eq!(report.avg_speed_kmh, 0.0);
}

#[test]
fn weak_effort_records_extreme_without_target() {
    // Moves, but short of the 20 degree targets.
    let mut session = Session::new(test_config());
    session.start();
    run_to_completion(&mut session, |s| {
        use dorsi::phase::PhaseKind;
        match s.current_phase().map(|p| p.kind) {
            Some(PhaseKind::RepBack) => -10.0,
            Some(PhaseKind::RepFront) => 10.0,
            _ => 0.0,
        }
    });

    let report = session.report().expect("completed session has a report");
    assert_eq!(report.records[0].time_to_target, None);
    assert!((report.records[0].extreme_deg - (-10.0)).abs() < 1e-9);
    assert_eq!(report.records[1].time_to_target, None);
    assert!((report.records[1].extreme_deg - 10.0).abs() < 1e-9);
}

#[test]
fn midsession_calibration_pauses_protocol_and_rezeroes() {
    let mut session = Session::new(test_config());
    session.start();

    // Two countdown ticks, one running tick.
    session.tick(0.0, DT);
    session.tick(0.0, DT);
    session.tick(0.0, DT);
    assert_eq!(session.state.lifecycle, Lifecycle::Running);
    let phase_left_before = session.state.phase_left;

    // Sensor drifted by 5 degrees; recalibrate while holding still.
    session.begin_calibration();
    for _ in 0..3 {
        session.tick(5.0, DT);
        assert!(session.is_calibrating());
        // Protocol timers are frozen under the overlay.
        assert_eq!(session.state.phase_left, phase_left_before);
        assert_eq!(session.state.angle_deg, 0.0);
    }
    // The window completes on the fourth sample and the protocol resumes.
    session.tick(5.0, DT);
    assert!(!session.is_calibrating());
    assert!((session.state.zero_deg - 5.0).abs() < 1e-9);
    assert!(session.state.phase_left < phase_left_before);

    // With the new zero, a raw reading of 5 degrees reads as neutral.
    session.tick(5.0, DT);
    assert_eq!(session.state.angle_deg, 0.0);
}

#[test]
fn restart_runs_a_second_full_session() {
    let mut session = Session::new(test_config());
    session.start();
    run_to_completion(&mut session, compliant_angle);
    assert_eq!(session.records().len(), 4);

    session.restart();
    assert_eq!(session.state.lifecycle, Lifecycle::Countdown);
    assert!(session.records().is_empty());

    run_to_completion(&mut session, compliant_angle);
    let report = session.report().expect("second run has its own report");
    assert_eq!(report.records.len(), 4);
}
