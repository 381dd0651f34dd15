use std::io::{BufRead, BufReader, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::filter::LowPass;

pub const DEFAULT_BAUD: u32 = 115_200;

/// Delay before retrying after a failed open or a read error.
const RECONNECT_BACKOFF: Duration = Duration::from_millis(800);
/// Delay between discovery attempts when no candidate port exists.
const DISCOVERY_BACKOFF: Duration = Duration::from_secs(1);
/// Read timeout; also bounds how quickly a stop request is observed.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// One decoded line of the sensor's wire protocol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    AngleDeg(f64),
    BatteryVolts(f64),
}

/// Parses one line of the wire protocol: `ANG:<float>` updates the angle,
/// `VBAT:<float>` the battery voltage, and a bare float is accepted as an
/// angle. Anything else is discarded.
pub fn parse_line(line: &str) -> Option<Reading> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some(rest) = line.strip_prefix("VBAT:") {
        return rest.trim().parse().ok().map(Reading::BatteryVolts);
    }
    let rest = line.strip_prefix("ANG:").unwrap_or(line);
    rest.trim().parse().ok().map(Reading::AngleDeg)
}

/// Latest published values as provided by a sensor worker. The control
/// loop polls this once per tick; intermediate samples are dropped.
pub trait AngleSource {
    /// Most recent filtered angle, degrees. Stale if the link is down.
    fn latest_angle(&self) -> f64;
    /// Most recent battery reading, if any has arrived.
    fn battery_volts(&self) -> Option<f64>;
}

/// Cross-thread cells for the latest readings. f64 bits in atomics avoid
/// torn reads without a lock; NaN marks "no battery reading yet".
#[derive(Debug)]
struct Shared {
    angle_bits: AtomicU64,
    battery_bits: AtomicU64,
    stop: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            angle_bits: AtomicU64::new(0.0_f64.to_bits()),
            battery_bits: AtomicU64::new(f64::NAN.to_bits()),
            stop: AtomicBool::new(false),
        }
    }
}

enum WorkerCommand {
    DeviceZero,
}

/// Handle to the serial sensor worker thread.
///
/// The worker owns port discovery, connection, line reads and the
/// retry/backoff cycle; it publishes only the latest angle (low-pass
/// filtered) and battery voltage. Dropping the handle requests a stop
/// and joins the thread.
pub struct SerialSensor {
    shared: Arc<Shared>,
    cmd_tx: Sender<WorkerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl SerialSensor {
    /// Spawns the worker. `port` pins a specific device; with `None` the
    /// worker scans available ports, preferring names that look like a
    /// bluetooth serial bridge.
    pub fn spawn(port: Option<String>, baud: u32, filter_alpha: f64) -> Self {
        let shared = Arc::new(Shared::new());
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let worker_shared = Arc::clone(&shared);
        let handle = thread::spawn(move || {
            worker_loop(worker_shared, cmd_rx, port, baud, filter_alpha);
        });
        Self {
            shared,
            cmd_tx,
            handle: Some(handle),
        }
    }

    /// Asks the device firmware to reset its own zero reference. This is
    /// independent of the host-side calibration window.
    pub fn request_device_zero(&self) {
        let _ = self.cmd_tx.send(WorkerCommand::DeviceZero);
    }

    /// True once the battery has reported below the given threshold.
    pub fn low_battery(&self, threshold_volts: f64) -> bool {
        matches!(self.battery_volts(), Some(v) if v < threshold_volts)
    }

    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl AngleSource for SerialSensor {
    fn latest_angle(&self) -> f64 {
        f64::from_bits(self.shared.angle_bits.load(Ordering::Relaxed))
    }

    fn battery_volts(&self) -> Option<f64> {
        let v = f64::from_bits(self.shared.battery_bits.load(Ordering::Relaxed));
        if v.is_nan() {
            None
        } else {
            Some(v)
        }
    }
}

impl Drop for SerialSensor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Picks a candidate port: the pinned one if given, otherwise the first
/// port whose name or description suggests a bluetooth/serial bridge,
/// otherwise any port at all.
fn find_port(pinned: Option<&str>) -> Option<String> {
    if let Some(p) = pinned {
        return Some(p.to_string());
    }
    let ports = serialport::available_ports().ok()?;
    for info in &ports {
        let mut desc = info.port_name.to_lowercase();
        if let serialport::SerialPortType::UsbPort(usb) = &info.port_type {
            if let Some(product) = &usb.product {
                desc.push(' ');
                desc.push_str(&product.to_lowercase());
            }
        }
        if desc.contains("bluetooth") || desc.contains("serial") || desc.contains("imu") {
            return Some(info.port_name.clone());
        }
    }
    ports.first().map(|info| info.port_name.clone())
}

/// Connection retry machine: Disconnected -> Connecting -> Connected,
/// falling back to Disconnected (with backoff) on any failure. Errors
/// never escape the worker; the control loop just keeps seeing the last
/// published values.
fn worker_loop(
    shared: Arc<Shared>,
    cmd_rx: Receiver<WorkerCommand>,
    pinned_port: Option<String>,
    baud: u32,
    filter_alpha: f64,
) {
    let mut filter = LowPass::new(filter_alpha);

    while !shared.stop.load(Ordering::Relaxed) {
        // Connecting
        let Some(name) = find_port(pinned_port.as_deref()) else {
            thread::sleep(DISCOVERY_BACKOFF);
            continue;
        };
        let port = match serialport::new(&name, baud)
            .timeout(READ_TIMEOUT)
            .open()
        {
            Ok(p) => p,
            Err(_) => {
                thread::sleep(RECONNECT_BACKOFF);
                continue;
            }
        };

        // Connected: read lines until stop or failure.
        let mut reader = BufReader::new(port);
        let mut line = String::new();
        loop {
            if shared.stop.load(Ordering::Relaxed) {
                return;
            }
            match cmd_rx.try_recv() {
                Ok(WorkerCommand::DeviceZero) => {
                    if reader.get_mut().write_all(b"z").is_err() {
                        break;
                    }
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => return,
            }

            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => match parse_line(&line) {
                    Some(Reading::AngleDeg(deg)) => {
                        let filtered = filter.update(deg);
                        shared
                            .angle_bits
                            .store(filtered.to_bits(), Ordering::Relaxed);
                    }
                    Some(Reading::BatteryVolts(v)) => {
                        shared.battery_bits.store(v.to_bits(), Ordering::Relaxed);
                    }
                    None => {}
                },
                // Timeouts are routine on a quiet link; anything else
                // drops the connection and re-enters discovery.
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(_) => break,
            }
        }
        // Disconnected: the port closes on drop.
        thread::sleep(RECONNECT_BACKOFF);
    }
}

/// Fixed-value source for tests and headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticAngleSource {
    pub angle_deg: f64,
    pub battery: Option<f64>,
}

impl AngleSource for StaticAngleSource {
    fn latest_angle(&self) -> f64 {
        self.angle_deg
    }

    fn battery_volts(&self) -> Option<f64> {
        self.battery
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_angle() {
        assert_eq!(parse_line("ANG:12.5"), Some(Reading::AngleDeg(12.5)));
        assert_eq!(parse_line("ANG:-3.75"), Some(Reading::AngleDeg(-3.75)));
    }

    #[test]
    fn parses_bare_float_as_angle() {
        assert_eq!(parse_line("7.25"), Some(Reading::AngleDeg(7.25)));
        assert_eq!(parse_line("-2"), Some(Reading::AngleDeg(-2.0)));
    }

    #[test]
    fn parses_battery_line() {
        assert_eq!(parse_line("VBAT:3.81"), Some(Reading::BatteryVolts(3.81)));
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        assert_eq!(parse_line("  ANG:1.5\r\n"), Some(Reading::AngleDeg(1.5)));
        assert_eq!(parse_line("VBAT: 3.7 "), Some(Reading::BatteryVolts(3.7)));
    }

    #[test]
    fn discards_malformed_lines() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("hello"), None);
        assert_eq!(parse_line("ANG:abc"), None);
        assert_eq!(parse_line("VBAT:"), None);
        assert_eq!(parse_line("ANG:"), None);
    }

    #[test]
    fn shared_cells_roundtrip_f64() {
        let shared = Shared::new();
        shared.angle_bits.store((-17.5_f64).to_bits(), Ordering::Relaxed);
        assert_eq!(
            f64::from_bits(shared.angle_bits.load(Ordering::Relaxed)),
            -17.5
        );
        // NaN marks an absent battery reading.
        assert!(f64::from_bits(shared.battery_bits.load(Ordering::Relaxed)).is_nan());
    }

    #[test]
    fn static_source_reports_fixed_values() {
        let src = StaticAngleSource {
            angle_deg: 4.0,
            battery: Some(3.4),
        };
        assert_eq!(src.latest_angle(), 4.0);
        assert_eq!(src.battery_volts(), Some(3.4));
    }
}
