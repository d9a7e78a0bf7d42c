// src/acquisition/reader.rs
//! Reader thread: pulls lines off the link and feeds the queue

use crate::acquisition::queue::{LinkEvent, QueueError, QueueProducer};
use crate::hal::{HalError, LinkReader};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Why the reader thread ended
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderExit {
    /// Shutdown was requested
    Shutdown,
    /// The link failed; a `Closed` event was queued
    LinkClosed(HalError),
    /// The dispatcher side went away
    QueueClosed,
}

/// Owner's handle on a running reader thread
#[derive(Debug)]
pub struct ReaderHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<ReaderExit>>,
}

impl ReaderHandle {
    /// Ask the reader to stop at its next timeout
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |j| j.is_finished())
    }

    /// Signal shutdown and wait for the thread.
    ///
    /// Returns `None` if the thread panicked.
    pub fn join(mut self) -> Option<ReaderExit> {
        self.shutdown();
        self.join.take().and_then(|j| j.join().ok())
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the reader thread for one link
pub fn spawn_reader(reader: Box<dyn LinkReader>, producer: QueueProducer) -> io::Result<ReaderHandle> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);

    let join = thread::Builder::new()
        .name("hallkey-reader".to_string())
        .spawn(move || read_loop(reader, producer, &flag))?;

    Ok(ReaderHandle {
        shutdown,
        join: Some(join),
    })
}

fn read_loop(mut reader: Box<dyn LinkReader>, producer: QueueProducer, shutdown: &AtomicBool) -> ReaderExit {
    debug!("reader thread started");
    let exit = loop {
        if shutdown.load(Ordering::Relaxed) {
            break ReaderExit::Shutdown;
        }

        match reader.read_line() {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                trace!(%line, "line received");
                match producer.push(LinkEvent::Line(line), shutdown) {
                    Ok(()) => {}
                    Err(QueueError::Shutdown) => break ReaderExit::Shutdown,
                    Err(QueueError::Disconnected) => break ReaderExit::QueueClosed,
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "link read failed, reader exiting");
                // Best effort: the dispatcher may already be gone
                let _ = producer.push(LinkEvent::Closed(e.to_string()), shutdown);
                break ReaderExit::LinkClosed(e);
            }
        }
    };
    debug!(?exit, "reader thread finished");
    exit
}
