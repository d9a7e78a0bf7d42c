// src/device/runner.rs
//! Drives a [`DeviceStateMachine`] against real time and a line channel

use crate::config::DeviceSettings;
use crate::device::state_machine::{DeviceStateMachine, Tick};
use crate::hal::{
    loopback_pair, AnalogSource, DeviceEndpoint, HalError, KeyPattern, Link, SensorHandle,
    SimulatedHallSensors, SimulatorConfig, Transport,
};
use crate::protocol::status;
use crate::utils::{MonotonicTimeProvider, TimeProvider};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Line I/O as the device sees it
pub trait DeviceIo {
    /// Non-blocking check for one received line
    fn poll_line(&mut self) -> Result<Option<String>, HalError>;

    /// Send one line to the host
    fn emit(&mut self, line: &str) -> Result<(), HalError>;
}

impl DeviceIo for DeviceEndpoint {
    fn poll_line(&mut self) -> Result<Option<String>, HalError> {
        self.try_recv_command()
    }

    fn emit(&mut self, line: &str) -> Result<(), HalError> {
        self.send_line(line)
    }
}

/// Run the device loop until `shutdown` is set or the I/O fails.
///
/// Prints the boot banner first. A closed link ends the loop with `Ok`,
/// like a controller whose host went away.
pub fn run_device<S, C, I>(
    mut machine: DeviceStateMachine<S, C>,
    io: &mut I,
    shutdown: &AtomicBool,
) -> Result<(), HalError>
where
    S: AnalogSource,
    C: TimeProvider,
    I: DeviceIo + ?Sized,
{
    match drive(&mut machine, io, shutdown) {
        Err(HalError::Closed) => {
            info!("host link closed, device loop exiting");
            Ok(())
        }
        other => other,
    }
}

fn drive<S, C, I>(
    machine: &mut DeviceStateMachine<S, C>,
    io: &mut I,
    shutdown: &AtomicBool,
) -> Result<(), HalError>
where
    S: AnalogSource,
    C: TimeProvider,
    I: DeviceIo + ?Sized,
{
    io.emit(machine.banner())?;
    while !shutdown.load(Ordering::Relaxed) {
        let input = io.poll_line()?;
        let Tick { lines, sleep } = machine.tick(input.as_deref());
        for line in &lines {
            io.emit(line)?;
        }
        thread::sleep(sleep);
    }
    Ok(())
}

/// Presses keys when the device asks for them, and plays a pattern otherwise
///
/// Stands in for the operator so a simulated device can calibrate and
/// measure without a person at the keyboard.
pub struct AutoOperator<I> {
    inner: I,
    sensors: SensorHandle,
    pattern: KeyPattern,
    calibrating: bool,
    started: Instant,
}

impl<I: DeviceIo> AutoOperator<I> {
    pub fn new(inner: I, sensors: SensorHandle, pattern: KeyPattern) -> Self {
        Self {
            inner,
            sensors,
            pattern,
            calibrating: false,
            started: Instant::now(),
        }
    }

    pub fn into_inner(self) -> I {
        self.inner
    }

    fn react(&mut self, line: &str) {
        if line == status::CALIBRATION_STARTED {
            self.calibrating = true;
            self.sensors.release_all();
        } else if line == status::CALIBRATION_COMPLETE {
            self.calibrating = false;
        } else if let Some(channel) = pressed_channel(line) {
            self.sensors.release_all();
            self.sensors.press(channel, 1.0);
        } else if line.ends_with("values saved!") {
            self.sensors.release_all();
        }
    }
}

/// Zero-based channel named in a press prompt (`Press K2 ...` gives 1)
fn pressed_channel(line: &str) -> Option<usize> {
    let label = line.strip_prefix("Press K")?;
    let digits: String = label.chars().take_while(char::is_ascii_digit).collect();
    digits.parse::<usize>().ok()?.checked_sub(1)
}

impl<I: DeviceIo> DeviceIo for AutoOperator<I> {
    fn poll_line(&mut self) -> Result<Option<String>, HalError> {
        if !self.calibrating {
            let t_ms = self.started.elapsed().as_millis() as u64;
            self.sensors.apply(&self.pattern, t_ms);
        }
        self.inner.poll_line()
    }

    fn emit(&mut self, line: &str) -> Result<(), HalError> {
        self.react(line);
        self.inner.emit(line)
    }
}

/// Transport whose `open` boots a simulated device on its own thread
///
/// The device thread exits once the host drops the link.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    settings: DeviceSettings,
    simulator: SimulatorConfig,
    pattern: KeyPattern,
    read_timeout: Duration,
}

impl SimulatedTransport {
    pub fn new(settings: DeviceSettings, pattern: KeyPattern, read_timeout: Duration) -> Self {
        let simulator = SimulatorConfig {
            channel_count: settings.channel_count,
            ..SimulatorConfig::default()
        };
        Self {
            settings,
            simulator,
            pattern,
            read_timeout,
        }
    }

    pub fn with_simulator(mut self, simulator: SimulatorConfig) -> Self {
        self.simulator = simulator;
        self
    }
}

impl Transport for SimulatedTransport {
    fn open(&self, port: &str, _baud_rate: u32) -> Result<Link, HalError> {
        let (mut link, endpoint) = loopback_pair(self.read_timeout);
        link.description = format!("simulated device ({})", port);

        let sensors = SimulatedHallSensors::new(self.simulator.clone());
        let handle = sensors.handle();
        let machine = DeviceStateMachine::new(sensors, MonotonicTimeProvider::new(), &self.settings);
        let pattern = self.pattern;

        thread::Builder::new()
            .name("hallkey-sim-device".to_string())
            .spawn(move || {
                let mut io = AutoOperator::new(endpoint, handle, pattern);
                let shutdown = AtomicBool::new(false);
                if let Err(e) = run_device(machine, &mut io, &shutdown) {
                    warn!(error = %e, "simulated device stopped");
                }
                debug!("simulated device thread finished");
            })
            .map_err(|e| HalError::OpenFailed {
                port: port.to_string(),
                reason: e.to_string(),
            })?;

        info!(port, "simulated device attached");
        Ok(link)
    }
}
