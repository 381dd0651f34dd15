use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
};

use dorsi::{
    classifier::DirectionState,
    config::{ConfigStore, FileConfigStore, SessionConfig},
    kinematics::kmh_from_pxps,
    runtime::{ControlEvent, CrosstermEventSource, DtClock, FixedTicker, Runner},
    sensor::{AngleSource, SerialSensor, DEFAULT_BAUD},
    session::{Lifecycle, RepDirection, Session},
};

/// ankle rehab trainer driven by a wearable tilt sensor
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A guided dorsiflexion/plantarflexion exercise session. A wearable \
inertial sensor streams the ankle angle over a serial link; the angle drives a \
simulated vehicle while the protocol walks through timed repetitions and logs \
per-rep results."
)]
pub struct Cli {
    /// serial port of the sensor (auto-detected when omitted)
    #[clap(short = 'p', long)]
    port: Option<String>,

    /// serial baud rate
    #[clap(short = 'b', long, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// repetitions per direction
    #[clap(short = 'n', long)]
    reps: Option<usize>,

    /// seconds per repetition
    #[clap(long)]
    rep_secs: Option<f64>,

    /// countdown before the session starts, seconds
    #[clap(long)]
    countdown: Option<f64>,

    /// target angle for back (dorsiflexion) reps, degrees
    #[clap(long)]
    target_back: Option<f64>,

    /// target angle for front (plantarflexion) reps, degrees
    #[clap(long)]
    target_front: Option<f64>,
}

impl Cli {
    /// Overlays the flags that were given onto the stored configuration.
    fn apply_to(&self, cfg: &mut SessionConfig) {
        if let Some(n) = self.reps {
            cfg.reps_each = n;
        }
        if let Some(s) = self.rep_secs {
            cfg.rep_secs = s;
        }
        if let Some(s) = self.countdown {
            cfg.start_countdown_secs = s;
        }
        if let Some(deg) = self.target_back {
            cfg.target_back_deg = deg;
        }
        if let Some(deg) = self.target_front {
            cfg.target_front_deg = deg;
        }
    }
}

/// What a key press asks the outer loop to do.
#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Quit,
    /// Forward a zero request to the sensor firmware.
    DeviceZero,
}

#[derive(Debug)]
pub struct App {
    pub session: Session,
    /// Latches once the battery dips below the threshold; advisory only.
    pub low_battery: bool,
}

impl App {
    pub fn new(cfg: SessionConfig) -> Self {
        Self {
            session: Session::new(cfg),
            low_battery: false,
        }
    }

    /// Advances the whole app by one measured tick.
    pub fn on_tick(&mut self, raw_angle: f64, dt: f64) {
        self.session.tick(raw_angle, dt);
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return KeyOutcome::Quit;
        }
        match key.code {
            KeyCode::Esc => KeyOutcome::Quit,
            KeyCode::Char(' ') => {
                self.session.start();
                KeyOutcome::Continue
            }
            KeyCode::Char('r') => {
                self.session.restart();
                KeyOutcome::Continue
            }
            KeyCode::Char('c') => {
                self.session.begin_calibration();
                KeyOutcome::Continue
            }
            KeyCode::Char('z') => KeyOutcome::DeviceZero,
            _ => KeyOutcome::Continue,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = FileConfigStore::new();
    let mut cfg = store.load();
    cli.apply_to(&mut cfg);

    let sensor = SerialSensor::spawn(cli.port.clone(), cli.baud, cfg.filter_alpha);
    let low_battery_volts = cfg.low_battery_volts;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(cfg);
    let result = run_tui(&mut terminal, &mut app, &sensor, low_battery_volts);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    sensor: &SerialSensor,
    low_battery_volts: f64,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::at_60hz());
    let mut clock = DtClock::new();

    terminal.draw(|f| ui(app, f))?;

    loop {
        match runner.step() {
            ControlEvent::Tick => {
                let dt = clock.measure();
                if sensor.low_battery(low_battery_volts) {
                    app.low_battery = true;
                }
                app.on_tick(sensor.latest_angle(), dt);
                terminal.draw(|f| ui(app, f))?;
            }
            ControlEvent::Resize => {
                terminal.draw(|f| ui(app, f))?;
            }
            ControlEvent::Key(key) => {
                match app.handle_key(key) {
                    KeyOutcome::Quit => break,
                    KeyOutcome::DeviceZero => sensor.request_device_zero(),
                    KeyOutcome::Continue => {}
                }
                terminal.draw(|f| ui(app, f))?;
            }
        }
    }

    Ok(())
}

fn banner_text(app: &App) -> String {
    if app.session.is_calibrating() {
        return "CALIBRATING — hold the foot still".to_string();
    }
    match app.session.state.lifecycle {
        Lifecycle::NotStarted => "Press SPACE to begin".to_string(),
        Lifecycle::Countdown => {
            format!("Starting in {:.0}", app.session.state.countdown_left.ceil())
        }
        Lifecycle::Running => match app.session.current_phase() {
            Some(phase) => phase.kind.prompt().to_string(),
            None => String::new(),
        },
        Lifecycle::Complete => "Session complete — (r)estart (esc) quit".to_string(),
    }
}

fn phase_progress(app: &App) -> f64 {
    match app.session.current_phase() {
        Some(phase) if phase.duration_secs > 0.0 => {
            (1.0 - app.session.state.phase_left / phase.duration_secs).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

fn ui(app: &App, f: &mut Frame) {
    if app.session.state.lifecycle == Lifecycle::Complete {
        render_report(app, f);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // banner
            Constraint::Length(3), // phase progress
            Constraint::Min(6),    // hud
            Constraint::Length(3), // key help
        ])
        .split(f.area());

    let banner_style = if app.session.is_calibrating() {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    };
    let banner = Paragraph::new(banner_text(app))
        .block(Block::default().borders(Borders::ALL))
        .style(banner_style)
        .alignment(Alignment::Center);
    f.render_widget(banner, chunks[0]);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Phase"))
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(phase_progress(app));
    f.render_widget(gauge, chunks[1]);

    let cfg = app.session.config();
    let state = &app.session.state;
    let speed_kmh = kmh_from_pxps(app.session.kinematics.speed, cfg.px_per_m);
    let command = match app.session.direction() {
        DirectionState::Forward => "FORWARD",
        DirectionState::Reverse => "REVERSE",
        DirectionState::Neutral => "NEUTRAL",
    };
    let mut hud = vec![
        format!("speed     {:>7.1} km/h", speed_kmh),
        format!(
            "distance  {:>7.1} m",
            app.session.kinematics.distance_m(cfg)
        ),
        format!("command   {:>7}", command),
        format!("angle     {:>7.1}°", state.angle_deg),
        format!("rate      {:>7.1}°/s", state.angle_rate),
        format!(
            "reps      {:>4}/{}",
            state.reps_done,
            app.session.total_reps()
        ),
    ];
    if app.low_battery {
        hud.push("sensor battery low".to_string());
    }
    let hud = Paragraph::new(hud.join("\n"))
        .block(Block::default().borders(Borders::ALL).title("Telemetry"))
        .style(Style::default().fg(Color::White));
    f.render_widget(hud, chunks[2]);

    let help = Paragraph::new("(space) start  (c)alibrate  (z)ero sensor  (esc) quit")
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC))
        .alignment(Alignment::Center);
    f.render_widget(help, chunks[3]);
}

fn render_report(app: &App, f: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(4),    // rep table
            Constraint::Length(4), // summary + keys
        ])
        .split(f.area());

    let title = Paragraph::new("Session complete")
        .block(Block::default().borders(Borders::ALL))
        .style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let header = Row::new(vec![
        Cell::from("#"),
        Cell::from("Direction"),
        Cell::from("Peak (°)"),
        Cell::from("Target hit"),
        Cell::from("Time to target (s)"),
    ])
    .style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = app
        .session
        .records()
        .iter()
        .enumerate()
        .map(|(i, rec)| {
            let dir = match rec.direction {
                RepDirection::Back => "BACK",
                RepDirection::Front => "FRONT",
            };
            let (hit, hit_style) = match rec.time_to_target {
                Some(_) => ("yes", Style::default().fg(Color::Green)),
                None => ("no", Style::default().fg(Color::Red)),
            };
            let ttt = match rec.time_to_target {
                Some(t) => format!("{:.2}", t),
                None => "-".to_string(),
            };
            Row::new(vec![
                Cell::from(format!("{}", i + 1)),
                Cell::from(dir),
                Cell::from(format!("{:.1}", rec.extreme_deg)),
                Cell::from(hit).style(hit_style),
                Cell::from(ttt),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        &[
            Constraint::Length(4),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(20),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title("Repetitions"));
    f.render_widget(table, chunks[1]);

    let summary = match app.session.report() {
        Some(report) => {
            let hits = report
                .records
                .iter()
                .filter(|r| r.time_to_target.is_some())
                .count();
            format!(
                "{}/{} targets hit in {:.1} s, avg speed {:.1} km/h\nfinished {} — (r)estart (esc) quit",
                hits,
                report.records.len(),
                report.total_secs,
                report.avg_speed_kmh,
                chrono::Local::now().format("%Y-%m-%d %H:%M"),
            )
        }
        None => String::new(),
    };
    let footer = Paragraph::new(summary)
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(footer, chunks[2]);
}
