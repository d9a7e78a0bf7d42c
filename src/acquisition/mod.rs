// src/acquisition/mod.rs
//! Host-side ingestion: reader thread, line queue, dispatcher and the
//! connection state it drives

pub mod console;
pub mod host;
pub mod queue;
pub mod reader;
pub mod state;

pub use console::{ConsoleSink, LogCategory, MemoryConsole, TracingConsole};
pub use host::{AcquisitionHost, DispatchReport, HostOptions};
pub use queue::{line_queue, LinkEvent, QueueConsumer, QueueError, QueueProducer};
pub use reader::{spawn_reader, ReaderExit, ReaderHandle};
pub use state::{ConnectionState, ControlAction, HostConnectionState, PermittedActions, SessionPhase};
