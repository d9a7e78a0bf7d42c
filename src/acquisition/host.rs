// src/acquisition/host.rs
//! Host acquisition controller
//!
//! Owns the link, the reader thread, the line queue and the active
//! recording. Only the thread calling [`AcquisitionHost::tick`] (or a
//! control action) ever touches the connection state or the recording; the
//! reader thread only ever pushes onto the queue.

use crate::acquisition::console::{ConsoleSink, LogCategory};
use crate::acquisition::queue::{line_queue, LinkEvent, QueueConsumer};
use crate::acquisition::reader::{spawn_reader, ReaderHandle};
use crate::acquisition::state::{ConnectionState, ControlAction, HostConnectionState, PermittedActions};
use crate::config::{OverflowPolicy, SystemConfig};
use crate::error::{AcqError, AcqResult};
use crate::hal::{LinkWriter, Transport};
use crate::protocol::{classify, Command, Message, StatusKind};
use crate::storage::{RecordingSession, SessionDirectory, SessionSummary};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const READER_STOP_POLL_MS: u64 = 1;

/// Host pipeline tuning
#[derive(Debug, Clone, PartialEq)]
pub struct HostOptions {
    pub dispatch_period: Duration,
    pub queue_capacity: usize,
    pub overflow_policy: OverflowPolicy,
    /// Channels named in the recording header
    pub channel_count: usize,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self::from(&SystemConfig::default())
    }
}

impl From<&SystemConfig> for HostOptions {
    fn from(config: &SystemConfig) -> Self {
        Self {
            dispatch_period: config.host.dispatch_period(),
            queue_capacity: config.host.queue_capacity,
            overflow_policy: config.host.overflow_policy,
            channel_count: config.device.channel_count,
        }
    }
}

/// What one dispatcher pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Lines taken off the queue
    pub lines: usize,
    pub telemetry: usize,
    /// Telemetry lines written to the active recording
    pub recorded: usize,
    pub statuses: usize,
    /// The link was lost during this pass
    pub link_lost: bool,
    /// Lines discarded by the overflow policy since connect
    pub dropped_total: u64,
}

struct ActiveLink {
    writer: Box<dyn LinkWriter>,
    reader: ReaderHandle,
    consumer: QueueConsumer,
    description: String,
}

pub struct AcquisitionHost {
    options: HostOptions,
    state: HostConnectionState,
    link: Option<ActiveLink>,
    recording: Option<RecordingSession>,
    console: Arc<dyn ConsoleSink>,
    last_summary: Option<SessionSummary>,
}

impl AcquisitionHost {
    pub fn new(options: HostOptions, console: Arc<dyn ConsoleSink>) -> Self {
        Self {
            options,
            state: HostConnectionState::default(),
            link: None,
            recording: None,
            console,
            last_summary: None,
        }
    }

    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    pub fn state(&self) -> &HostConnectionState {
        &self.state
    }

    pub fn connection(&self) -> ConnectionState {
        self.state.connection()
    }

    pub fn permitted(&self) -> PermittedActions {
        self.state.permitted()
    }

    pub fn link_description(&self) -> Option<&str> {
        self.link.as_ref().map(|l| l.description.as_str())
    }

    /// Lines waiting for the next dispatcher pass
    pub fn queued_lines(&self) -> usize {
        self.link.as_ref().map_or(0, |l| l.consumer.len())
    }

    /// Samples written to the active recording so far
    pub fn samples_recorded(&self) -> Option<u64> {
        self.recording.as_ref().map(RecordingSession::samples_written)
    }

    pub fn recording_path(&self) -> Option<PathBuf> {
        self.recording.as_ref().map(|r| r.path().to_path_buf())
    }

    /// Summary of the most recently closed recording
    pub fn last_summary(&self) -> Option<&SessionSummary> {
        self.last_summary.as_ref()
    }

    pub fn select_user(&mut self, user: u32) -> AcqResult<()> {
        self.state.select_user(user)?;
        self.console.log(&format!("Selected user {}", user), LogCategory::Notice);
        Ok(())
    }

    /// Open a link and start the reader thread
    pub fn connect(&mut self, transport: &dyn Transport, port: &str, baud_rate: u32) -> AcqResult<()> {
        self.state.check(ControlAction::Connect)?;

        let link = match transport.open(port, baud_rate) {
            Ok(link) => link,
            Err(e) => {
                warn!(port, error = %e, "connect failed");
                self.console.log(&format!("Connection to {} failed: {}", port, e), LogCategory::Notice);
                return Err(e.into());
            }
        };

        let (producer, consumer) = line_queue(self.options.queue_capacity, self.options.overflow_policy);
        let reader = spawn_reader(link.reader, producer)?;

        info!(link = %link.description, "connected");
        self.console
            .log(&format!("Connected to {}", link.description), LogCategory::Notice);

        self.link = Some(ActiveLink {
            writer: link.writer,
            reader,
            consumer,
            description: link.description,
        });
        self.state.on_connected();
        Ok(())
    }

    /// Ask the device to calibrate. The phase follows the device's prompts.
    pub fn calibrate(&mut self) -> AcqResult<()> {
        self.state.check(ControlAction::Calibrate)?;
        self.send_command(Command::Calibrate)
    }

    /// Open a new attempt for the selected user and start measuring.
    ///
    /// If the recording file cannot be created nothing is sent and the state
    /// is unchanged.
    pub fn start_recording(&mut self, directory: &dyn SessionDirectory) -> AcqResult<PathBuf> {
        self.state.check(ControlAction::StartRecording)?;

        let session = directory
            .open_attempt(self.state.selected_user())
            .and_then(|slot| RecordingSession::create(&slot, self.options.channel_count));
        let session = match session {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "could not open recording");
                self.console.log(&format!("Could not start recording: {}", e), LogCategory::Notice);
                return Err(e);
            }
        };

        let path = session.path().to_path_buf();
        self.recording = Some(session);
        self.state.begin_recording()?;
        self.send_command(Command::Start)?;

        self.console
            .log(&format!("Recording to {}", path.display()), LogCategory::Notice);
        Ok(path)
    }

    /// Stop the active recording.
    ///
    /// Returns `Ok(false)` and sends nothing when not recording. Lines
    /// already queued are written before the file is closed.
    pub fn stop_recording(&mut self) -> AcqResult<bool> {
        if !self.state.is_recording() {
            return Ok(false);
        }

        self.dispatch();
        if !self.state.is_recording() {
            // The drain itself ended the recording (link lost or write failure)
            return Ok(true);
        }

        self.state.end_recording();
        let session = self.recording.take();
        let sent = self.send_command(Command::Stop);
        if let Some(session) = session {
            self.finish_session(session);
        }
        sent.map(|()| true)
    }

    /// Close the link. Lines already queued are processed first.
    pub fn disconnect(&mut self) -> AcqResult<()> {
        if self.link.is_none() {
            return Ok(());
        }
        self.dispatch();
        self.teardown("Disconnected");
        Ok(())
    }

    /// One dispatcher pass
    pub fn tick(&mut self) -> DispatchReport {
        self.dispatch()
    }

    /// Tick every dispatch period until `done` holds or `timeout` passes.
    /// Returns whether `done` was reached.
    pub fn run_until<F>(&mut self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut(&Self) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            self.dispatch();
            if done(self) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(self.options.dispatch_period);
        }
    }

    /// Write one command. A failed write tears the connection down.
    pub fn send_command(&mut self, command: Command) -> AcqResult<()> {
        let Some(link) = self.link.as_mut() else {
            return Err(AcqError::InvalidState {
                action: "send command",
                state: self.state.connection().to_string(),
            });
        };

        match link.writer.write_line(command.as_wire()) {
            Ok(()) => {
                debug!(%command, "command sent");
                self.console.log(command.as_wire(), LogCategory::Tx);
                Ok(())
            }
            Err(e) => {
                warn!(%command, error = %e, "command write failed");
                self.teardown(&format!("Connection lost while sending {}: {}", command, e));
                Err(e.into())
            }
        }
    }

    fn dispatch(&mut self) -> DispatchReport {
        let mut report = DispatchReport::default();
        let Some(link) = self.link.as_ref() else {
            return report;
        };

        let events = link.consumer.drain_pending();
        report.dropped_total = link.consumer.dropped_count();

        for event in events {
            match event {
                LinkEvent::Line(line) => {
                    report.lines += 1;
                    self.handle_line(&line, &mut report);
                }
                LinkEvent::Closed(reason) => {
                    report.link_lost = true;
                    self.teardown(&format!("Connection lost: {}", reason));
                    return report;
                }
            }
        }

        if let Some(session) = self.recording.as_mut() {
            if let Err(e) = session.flush() {
                self.abort_recording(e);
            }
        }
        report
    }

    fn handle_line(&mut self, line: &str, report: &mut DispatchReport) {
        match classify(line) {
            Message::Empty => {}
            Message::Telemetry(telemetry) => {
                report.telemetry += 1;
                self.console.log(line, LogCategory::Data);
                if !self.state.is_recording() {
                    return;
                }
                let result = match self.recording.as_mut() {
                    Some(session) => session.append(&telemetry),
                    None => return,
                };
                match result {
                    Ok(()) => report.recorded += 1,
                    Err(e) => self.abort_recording(e),
                }
            }
            Message::Status { kind, text } => {
                report.statuses += 1;
                let category = match kind {
                    StatusKind::CalibrationPrompt => LogCategory::Instruction,
                    _ => LogCategory::Rx,
                };
                self.console.log(&text, category);
                if self.state.on_status(kind) {
                    info!(state = %self.state.connection(), "phase changed by device status");
                    if kind == StatusKind::CalibrationComplete {
                        self.console.log("Calibration complete", LogCategory::Notice);
                    }
                }
            }
        }
    }

    /// A recording write failed: stop measuring and keep the connection
    fn abort_recording(&mut self, cause: AcqError) {
        error!(error = %cause, "recording aborted");
        self.console
            .log(&format!("Recording stopped after write error: {}", cause), LogCategory::Notice);

        self.state.end_recording();
        if let Some(session) = self.recording.take() {
            self.finish_session(session);
        }
        // A failed STOP already tore the link down; nothing more to do
        let _ = self.send_command(Command::Stop);
    }

    fn finish_session(&mut self, session: RecordingSession) {
        match session.close() {
            Ok(summary) => {
                self.console.log(
                    &format!(
                        "Saved {} samples to {}",
                        summary.metadata.samples_written,
                        summary.path.display()
                    ),
                    LogCategory::Notice,
                );
                self.last_summary = Some(summary);
            }
            Err(e) => {
                error!(error = %e, "closing recording failed");
                self.console
                    .log(&format!("Could not close recording: {}", e), LogCategory::Notice);
            }
        }
    }

    /// Stop the reader, dispatch what it already read, close any recording,
    /// then drop the link
    fn teardown(&mut self, notice: &str) {
        if let Some(link) = self.link.take() {
            let ActiveLink {
                writer,
                reader,
                consumer,
                description,
            } = link;

            let mut report = DispatchReport::default();
            for event in stop_reader(reader, &consumer, &description) {
                if let LinkEvent::Line(line) = event {
                    report.lines += 1;
                    self.handle_line(&line, &mut report);
                }
            }
            if report.lines > 0 {
                debug!(lines = report.lines, recorded = report.recorded, "dispatched lines left at teardown");
            }

            drop(consumer);
            drop(writer);
            info!(link = %description, "link closed");
        }

        if let Some(session) = self.recording.take() {
            self.finish_session(session);
        }

        self.state.on_disconnected();
        self.console.log(notice, LogCategory::Notice);
    }
}

/// Signal the reader and wait for it, collecting everything it queued.
///
/// The queue is drained while waiting so a reader blocked on a full queue
/// can hand over its last line.
fn stop_reader(reader: ReaderHandle, consumer: &QueueConsumer, description: &str) -> Vec<LinkEvent> {
    reader.shutdown();
    let mut events = Vec::new();
    while !reader.is_finished() {
        events.extend(consumer.drain_pending());
        thread::sleep(Duration::from_millis(READER_STOP_POLL_MS));
    }
    events.extend(consumer.drain_pending());

    if reader.join().is_none() {
        warn!(link = %description, "reader thread panicked");
    }
    events
}

impl Drop for AcquisitionHost {
    fn drop(&mut self) {
        if self.link.is_some() || self.recording.is_some() {
            self.teardown("Host shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::console::MemoryConsole;
    use crate::acquisition::state::SessionPhase;
    use crate::hal::{DeviceEndpoint, HalError, Link, LinkReader, LoopbackTransport};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use crate::storage::FsSessionDirectory;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(2);

    fn options() -> HostOptions {
        HostOptions {
            dispatch_period: Duration::from_millis(1),
            ..HostOptions::default()
        }
    }

    fn connected() -> (AcquisitionHost, DeviceEndpoint, MemoryConsole) {
        let console = MemoryConsole::new();
        let mut host = AcquisitionHost::new(options(), Arc::new(console.clone()));
        let (transport, endpoint) = LoopbackTransport::new(Duration::from_millis(5));
        host.connect(&transport, "loop0", 115_200).unwrap();
        (host, endpoint, console)
    }

    #[test]
    fn test_connect_sets_idle_phase() {
        let (host, _endpoint, console) = connected();
        assert_eq!(host.connection(), ConnectionState::Connected(SessionPhase::Idle));
        assert_eq!(host.link_description(), Some("loopback"));
        assert!(console.contains(LogCategory::Notice, "Connected to loopback"));
    }

    #[test]
    fn test_failed_connect_stays_disconnected() {
        let console = MemoryConsole::new();
        let mut host = AcquisitionHost::new(options(), Arc::new(console.clone()));
        let (transport, _endpoint) = LoopbackTransport::new(Duration::from_millis(5));
        transport.open("loop0", 115_200).unwrap();

        let err = host.connect(&transport, "loop0", 115_200).unwrap_err();
        assert!(err.is_transport());
        assert_eq!(host.connection(), ConnectionState::Disconnected);
        assert!(console.contains(LogCategory::Notice, "failed"));
    }

    #[test]
    fn test_calibrate_waits_for_prompt() {
        let (mut host, endpoint, console) = connected();
        host.calibrate().unwrap();
        assert_eq!(endpoint.drain_commands(), vec!["CAL"]);
        assert_eq!(host.state().phase(), Some(SessionPhase::Idle));

        endpoint.send_line("--- CALIBRATION STARTED ---").unwrap();
        assert!(host.run_until(WAIT, |h| h.state().is_calibrating()));
        assert!(!host.permitted().start);
        assert!(host.calibrate().is_err());

        assert!(!console.contains(LogCategory::Notice, "Calibration complete"));

        endpoint.send_line("--- CALIBRATION COMPLETE ---").unwrap();
        assert!(host.run_until(WAIT, |h| h.state().phase() == Some(SessionPhase::Idle)));
        assert!(console.contains(LogCategory::Instruction, "STARTED"));
        assert!(console.contains(LogCategory::Rx, "--- CALIBRATION COMPLETE ---"));
        assert_eq!(
            console
                .texts(LogCategory::Notice)
                .iter()
                .filter(|t| *t == "Calibration complete")
                .count(),
            1
        );
    }

    #[test]
    fn test_completion_outside_calibration_raises_no_notice() {
        let (mut host, endpoint, console) = connected();
        endpoint.send_line("--- CALIBRATION COMPLETE ---").unwrap();
        assert!(host.run_until(WAIT, |_| console.contains(LogCategory::Rx, "COMPLETE")));
        assert!(!console.contains(LogCategory::Notice, "Calibration complete"));
    }

    #[test]
    fn test_stop_when_not_recording_sends_nothing() {
        let (mut host, endpoint, _console) = connected();
        assert!(!host.stop_recording().unwrap());
        assert!(endpoint.drain_commands().is_empty());
        assert_eq!(host.state().phase(), Some(SessionPhase::Idle));
    }

    #[test]
    fn test_recording_round_trip() {
        let tmp = TempDir::new().unwrap();
        let directory = FsSessionDirectory::new(tmp.path());
        let (mut host, endpoint, _console) = connected();

        let path = host.start_recording(&directory).unwrap();
        assert_eq!(endpoint.drain_commands(), vec!["START"]);
        assert!(host.state().is_recording());

        for line in ["Measurement started", "0,0.0000,0.0000,0.0000", "5000,0.5000,0.0000,0.0000"] {
            endpoint.send_line(line).unwrap();
        }
        assert!(host.run_until(WAIT, |h| h.samples_recorded() == Some(2)));

        assert!(host.stop_recording().unwrap());
        assert_eq!(endpoint.drain_commands(), vec!["STOP"]);
        assert_eq!(host.state().phase(), Some(SessionPhase::Idle));

        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert_eq!(host.last_summary().unwrap().metadata.samples_written, 2);
    }

    #[test]
    fn test_write_failure_tears_down() {
        let (mut host, endpoint, console) = connected();
        drop(endpoint);

        let err = host.calibrate().unwrap_err();
        assert!(err.is_transport());
        assert_eq!(host.connection(), ConnectionState::Disconnected);
        assert!(console.contains(LogCategory::Notice, "Connection lost"));
    }

    /// Link that yields a fresh telemetry line on every read once armed
    struct StreamingReader {
        armed: Arc<AtomicBool>,
        produced: Arc<AtomicU64>,
    }

    impl LinkReader for StreamingReader {
        fn read_line(&mut self) -> Result<Option<String>, HalError> {
            if !self.armed.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
                return Ok(None);
            }
            let n = self.produced.fetch_add(1, Ordering::SeqCst);
            Ok(Some(format!("{},0.5000,0.5000,0.5000", n * 5000)))
        }
    }

    struct NullWriter;

    impl LinkWriter for NullWriter {
        fn write_line(&mut self, _line: &str) -> Result<(), HalError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct StreamingTransport {
        armed: Arc<AtomicBool>,
        produced: Arc<AtomicU64>,
    }

    impl Transport for StreamingTransport {
        fn open(&self, _port: &str, _baud_rate: u32) -> Result<Link, HalError> {
            Ok(Link {
                reader: Box::new(StreamingReader {
                    armed: Arc::clone(&self.armed),
                    produced: Arc::clone(&self.produced),
                }),
                writer: Box::new(NullWriter),
                description: "stream".to_string(),
            })
        }
    }

    #[test]
    fn test_disconnect_records_every_line_already_read() {
        let tmp = TempDir::new().unwrap();
        let directory = FsSessionDirectory::new(tmp.path());
        let transport = StreamingTransport::default();
        let mut host = AcquisitionHost::new(options(), Arc::new(MemoryConsole::new()));
        host.connect(&transport, "stream0", 115_200).unwrap();

        host.start_recording(&directory).unwrap();
        transport.armed.store(true, Ordering::SeqCst);
        assert!(host.run_until(WAIT, |h| h.samples_recorded().unwrap_or(0) >= 500));
        host.disconnect().unwrap();

        let read = transport.produced.load(Ordering::SeqCst);
        let summary = host.last_summary().unwrap();
        assert_eq!(summary.metadata.samples_written, read);

        let contents = std::fs::read_to_string(&summary.path).unwrap();
        assert_eq!(contents.lines().count() as u64, read + 1);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (mut host, _endpoint, _console) = connected();
        host.disconnect().unwrap();
        assert_eq!(host.connection(), ConnectionState::Disconnected);
        host.disconnect().unwrap();
        assert!(host.tick() == DispatchReport::default());
    }
}
