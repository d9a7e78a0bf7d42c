//! hallkey-device-sim: the device firmware loop on stdin/stdout
//!
//! Commands are read from stdin and telemetry/status lines are written to
//! stdout, exactly as the board would over USB serial. Logs go to stderr.
//! Calibration prompts are answered automatically by a simulated operator.

use clap::{Parser, ValueEnum};
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use hallkey_core::config::ConfigLoader;
use hallkey_core::device::{run_device, AutoOperator, DeviceIo, DeviceStateMachine};
use hallkey_core::hal::{HalError, KeyPattern, SimulatedHallSensors, SimulatorConfig};
use hallkey_core::utils::MonotonicTimeProvider;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::thread;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Pattern {
    Idle,
    Sine,
    Sequential,
}

#[derive(Parser, Debug)]
#[command(name = "hallkey-device-sim")]
#[command(about = "Simulated Hall-effect key board on stdin/stdout", long_about = None)]
struct Cli {
    /// Number of keys
    #[arg(long)]
    channels: Option<usize>,

    /// Key movement while not calibrating
    #[arg(long, value_enum, default_value = "sine")]
    pattern: Pattern,

    /// Period (sine) or hold time (sequential) in milliseconds
    #[arg(long, default_value_t = 1000)]
    pattern_ms: u32,

    /// Peak-to-peak sensor noise in raw counts
    #[arg(long, default_value_t = 40.0)]
    noise: f32,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Push each input line to `tx`; stops at end of input, a read error, or a closed receiver
fn forward_commands<R: BufRead>(input: R, tx: &Sender<String>) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        if tx.send(line).is_err() {
            break;
        }
    }
}

/// Line I/O over the process's stdin and stdout
struct StdioIo {
    input: Receiver<String>,
    output: std::io::Stdout,
}

impl StdioIo {
    fn spawn() -> std::io::Result<Self> {
        let (tx, rx) = channel::unbounded();
        thread::Builder::new().name("stdin".to_string()).spawn(move || {
            forward_commands(std::io::stdin().lock(), &tx);
        })?;
        Ok(Self {
            input: rx,
            output: std::io::stdout(),
        })
    }
}

impl DeviceIo for StdioIo {
    fn poll_line(&mut self) -> Result<Option<String>, HalError> {
        match self.input.try_recv() {
            Ok(line) => Ok(Some(line)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(HalError::Closed),
        }
    }

    fn emit(&mut self, line: &str) -> Result<(), HalError> {
        let mut out = self.output.lock();
        writeln!(out, "{}", line)
            .and_then(|_| out.flush())
            .map_err(|e| HalError::Write(e.to_string()))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_paths(vec![path.clone()]),
        None => ConfigLoader::new(),
    };
    let mut settings = loader.load_system_config()?.device;
    if let Some(channels) = cli.channels {
        settings.channel_count = channels;
    }

    let pattern = match cli.pattern {
        Pattern::Idle => KeyPattern::Idle,
        Pattern::Sine => KeyPattern::Sinusoidal { period_ms: cli.pattern_ms },
        Pattern::Sequential => KeyPattern::Sequential { hold_ms: cli.pattern_ms },
    };

    let sensors = SimulatedHallSensors::new(SimulatorConfig {
        channel_count: settings.channel_count,
        noise_amplitude: cli.noise,
        ..SimulatorConfig::default()
    });
    let handle = sensors.handle();
    let machine = DeviceStateMachine::new(sensors, MonotonicTimeProvider::new(), &settings);

    let mut io = AutoOperator::new(StdioIo::spawn()?, handle, pattern);
    run_device(machine, &mut io, &AtomicBool::new(false))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_reach_poll_line_in_order() {
        let (tx, rx) = channel::unbounded();
        forward_commands(std::io::Cursor::new("CAL\nSTART\n"), &tx);
        drop(tx);

        let mut io = StdioIo {
            input: rx,
            output: std::io::stdout(),
        };
        assert_eq!(io.poll_line().unwrap(), Some("CAL".to_string()));
        assert_eq!(io.poll_line().unwrap(), Some("START".to_string()));
        assert!(matches!(io.poll_line(), Err(HalError::Closed)));
    }
}
