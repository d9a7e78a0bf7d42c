//! hallkey-host: interactive acquisition host
//!
//! Connects to a key-sensor board (or a simulated one), then reads commands
//! from stdin while the dispatcher runs:
//!
//! ```text
//! cal | start | stop | status | user <n> | new-user | connect | quit
//! ```

use clap::Parser;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use hallkey_core::acquisition::{AcquisitionHost, HostOptions, TracingConsole};
use hallkey_core::config::{ConfigLoader, SystemConfig};
use hallkey_core::device::SimulatedTransport;
use hallkey_core::hal::{list_ports, KeyPattern, SerialTransport, Transport};
use hallkey_core::storage::FsSessionDirectory;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "hallkey-host")]
#[command(about = "Record Hall-effect key travel from a sensor board", long_about = None)]
struct Cli {
    /// Serial port of the sensor board
    #[arg(long)]
    port: Option<String>,

    /// Baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Extra TOML config file, applied after the default search paths
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root directory for recordings
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// User to record under
    #[arg(long)]
    user: Option<u32>,

    /// Use a simulated board instead of a serial port
    #[arg(long)]
    simulate: bool,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

#[derive(Debug, PartialEq)]
enum Input {
    Calibrate,
    Start,
    Stop,
    Status,
    User(u32),
    NewUser,
    Connect,
    Quit,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    match verb.as_str() {
        "cal" => Ok(Input::Calibrate),
        "start" => Ok(Input::Start),
        "stop" => Ok(Input::Stop),
        "status" => Ok(Input::Status),
        "new-user" => Ok(Input::NewUser),
        "connect" => Ok(Input::Connect),
        "quit" | "exit" => Ok(Input::Quit),
        "user" => words
            .next()
            .and_then(|n| n.parse().ok())
            .map(Input::User)
            .ok_or_else(|| "usage: user <n>".to_string()),
        other => Err(format!("unknown command '{}'", other)),
    }
}

/// Forward lines until input ends, a read fails or the receiver is gone
fn forward_lines<R: BufRead>(input: R, tx: &Sender<String>) -> usize {
    let mut forwarded = 0;
    for line in input.lines() {
        let Ok(line) = line else { break };
        if tx.send(line).is_err() {
            break;
        }
        forwarded += 1;
    }
    forwarded
}

fn spawn_stdin() -> std::io::Result<Receiver<String>> {
    let (tx, rx) = channel::unbounded();
    thread::Builder::new().name("hallkey-stdin".to_string()).spawn(move || {
        forward_lines(std::io::stdin().lock(), &tx);
    })?;
    Ok(rx)
}

fn load_config(cli: &Cli) -> Result<SystemConfig, Box<dyn std::error::Error>> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        let mut paths = loader.config_paths().to_vec();
        paths.push(path.clone());
        loader = ConfigLoader::with_paths(paths);
    }
    let mut config = loader.load_system_config()?;

    if let Some(port) = &cli.port {
        config.serial.port_name = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.to_string_lossy().into_owned();
    }
    Ok(config)
}

fn print_status(host: &AcquisitionHost) {
    let permitted = host.permitted();
    println!(
        "state: {} | user: {} | link: {} | allowed: cal={} start={} stop={}",
        host.connection(),
        host.state().selected_user(),
        host.link_description().unwrap_or("-"),
        permitted.calibrate,
        permitted.start,
        permitted.stop,
    );
    if let Some(samples) = host.samples_recorded() {
        println!("recording: {} samples so far", samples);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.list_ports {
        for port in list_ports()? {
            println!("{}", port.display_name());
        }
        return Ok(());
    }

    let config = load_config(&cli)?;
    if let Err(problems) = config.validate_consistency() {
        for problem in &problems {
            error!("{}", problem);
        }
        return Err("invalid configuration".into());
    }

    let transport: Box<dyn Transport> = if cli.simulate {
        Box::new(SimulatedTransport::new(
            config.device.clone(),
            KeyPattern::Sinusoidal { period_ms: 1200 },
            config.serial.read_timeout(),
        ))
    } else {
        Box::new(SerialTransport::new(config.serial.read_timeout()))
    };

    let directory = FsSessionDirectory::new(&config.storage.data_dir);
    let users = directory.list_users()?;
    info!(?users, root = %directory.root().display(), "known users");

    let mut host = AcquisitionHost::new(HostOptions::from(&config), Arc::new(TracingConsole));
    host.select_user(cli.user.or(users.first().copied()).unwrap_or(1))?;

    let port = if cli.simulate { "sim0" } else { config.serial.port_name.as_str() };
    if let Err(e) = host.connect(transport.as_ref(), port, config.serial.baud_rate) {
        warn!(error = %e, "not connected; use 'connect' to retry");
    }

    let input = spawn_stdin()?;
    let period = config.host.dispatch_period();

    loop {
        host.tick();

        let line = match input.try_recv() {
            Ok(line) => line,
            Err(TryRecvError::Empty) => {
                thread::sleep(period);
                continue;
            }
            Err(TryRecvError::Disconnected) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let result = match parse_input(&line) {
            Ok(Input::Quit) => break,
            Ok(Input::Calibrate) => host.calibrate(),
            Ok(Input::Start) => host.start_recording(&directory).map(|path| {
                println!("recording to {}", path.display());
            }),
            Ok(Input::Stop) => host.stop_recording().map(|stopped| {
                if !stopped {
                    println!("not recording");
                }
            }),
            Ok(Input::Status) => {
                print_status(&host);
                Ok(())
            }
            Ok(Input::User(user)) => host.select_user(user),
            Ok(Input::NewUser) => directory
                .create_user()
                .and_then(|user| host.select_user(user)),
            Ok(Input::Connect) => host.connect(transport.as_ref(), port, config.serial.baud_rate),
            Err(message) => {
                println!("{}", message);
                Ok(())
            }
        };
        if let Err(e) = result {
            println!("error: {}", e);
        }
    }

    host.stop_recording()?;
    host.disconnect()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("cal"), Ok(Input::Calibrate));
        assert_eq!(parse_input(" START "), Ok(Input::Start));
        assert_eq!(parse_input("user 3"), Ok(Input::User(3)));
        assert!(parse_input("user x").is_err());
        assert_eq!(parse_input("new-user"), Ok(Input::NewUser));
        assert!(parse_input("dance").is_err());
    }

    #[test]
    fn test_forward_lines_until_input_ends() {
        let (tx, rx) = channel::unbounded();
        let forwarded = forward_lines(std::io::Cursor::new("cal\nstart\n\nstop\n"), &tx);
        assert_eq!(forwarded, 4);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), ["cal", "start", "", "stop"]);
    }

    #[test]
    fn test_forward_lines_stops_when_receiver_dropped() {
        let (tx, rx) = channel::unbounded();
        drop(rx);
        assert_eq!(forward_lines(std::io::Cursor::new("cal\nstart\n"), &tx), 0);
    }
}
