// src/acquisition/queue.rs
//! Bounded line queue between the reader thread and the dispatcher

use crate::config::constants::host::BLOCKED_PUSH_RETRY_MS;
use crate::config::OverflowPolicy;
use crossbeam::channel::{self, Receiver, SendTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// What the reader hands to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// One received line, terminator stripped
    Line(String),
    /// The link failed; no further events follow
    Closed(String),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue consumer dropped")]
    Disconnected,
    #[error("shutdown requested while queue was full")]
    Shutdown,
}

#[derive(Debug, Default)]
struct QueueCounters {
    pushed: AtomicU64,
    dropped: AtomicU64,
    // Set when the consumer is dropped; the evictor keeps the channel open
    consumer_gone: AtomicBool,
}

/// Producer half, owned by the reader thread
#[derive(Debug, Clone)]
pub struct QueueProducer {
    tx: Sender<LinkEvent>,
    // Only held under drop-oldest, to evict from the head
    evictor: Option<Receiver<LinkEvent>>,
    policy: OverflowPolicy,
    counters: Arc<QueueCounters>,
}

/// Consumer half, owned by the dispatcher
#[derive(Debug)]
pub struct QueueConsumer {
    rx: Receiver<LinkEvent>,
    counters: Arc<QueueCounters>,
}

/// Create a bounded queue with the given overflow policy
pub fn line_queue(capacity: usize, policy: OverflowPolicy) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = channel::bounded(capacity.max(1));
    let counters = Arc::new(QueueCounters::default());
    let evictor = match policy {
        OverflowPolicy::DropOldest => Some(rx.clone()),
        OverflowPolicy::Block => None,
    };
    let producer = QueueProducer {
        tx,
        evictor,
        policy,
        counters: Arc::clone(&counters),
    };
    (producer, QueueConsumer { rx, counters })
}

impl QueueProducer {
    /// Enqueue one event.
    ///
    /// Under [`OverflowPolicy::Block`] a full queue makes this wait, checking
    /// `shutdown` between retries. Under [`OverflowPolicy::DropOldest`] the
    /// head of the queue is discarded and counted instead.
    pub fn push(&self, event: LinkEvent, shutdown: &AtomicBool) -> Result<(), QueueError> {
        match self.policy {
            OverflowPolicy::Block => self.push_blocking(event, shutdown)?,
            OverflowPolicy::DropOldest => self.push_evicting(event)?,
        }
        self.counters.pushed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn push_blocking(&self, mut event: LinkEvent, shutdown: &AtomicBool) -> Result<(), QueueError> {
        let retry = Duration::from_millis(BLOCKED_PUSH_RETRY_MS);
        loop {
            match self.tx.send_timeout(event, retry) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Disconnected(_)) => return Err(QueueError::Disconnected),
                Err(SendTimeoutError::Timeout(back)) => {
                    if shutdown.load(Ordering::Relaxed) {
                        return Err(QueueError::Shutdown);
                    }
                    event = back;
                }
            }
        }
    }

    fn push_evicting(&self, mut event: LinkEvent) -> Result<(), QueueError> {
        if self.counters.consumer_gone.load(Ordering::Acquire) {
            return Err(QueueError::Disconnected);
        }
        loop {
            match self.tx.try_send(event) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Disconnected(_)) => return Err(QueueError::Disconnected),
                Err(TrySendError::Full(back)) => {
                    let evicted = self.evictor.as_ref().map(|rx| rx.try_recv().is_ok());
                    if evicted == Some(true) {
                        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    event = back;
                }
            }
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}

impl QueueConsumer {
    /// Take every event queued at the moment of the call, in order.
    ///
    /// Events pushed while draining wait for the next call, so one pass
    /// cannot be starved by a fast producer.
    pub fn drain_pending(&self) -> Vec<LinkEvent> {
        let pending = self.rx.len();
        let mut events = Vec::with_capacity(pending);
        for _ in 0..pending {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(_) => break,
            }
        }
        events
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Events discarded by the drop-oldest policy since creation
    pub fn dropped_count(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    /// Events accepted since creation
    pub fn pushed_count(&self) -> u64 {
        self.counters.pushed.load(Ordering::Relaxed)
    }
}

impl Drop for QueueConsumer {
    fn drop(&mut self) {
        self.counters.consumer_gone.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> LinkEvent {
        LinkEvent::Line(format!("{},0.0000", n))
    }

    #[test]
    fn test_drain_preserves_order() {
        let (producer, consumer) = line_queue(16, OverflowPolicy::Block);
        let shutdown = AtomicBool::new(false);
        for n in 0..10 {
            producer.push(line(n), &shutdown).unwrap();
        }

        let events = consumer.drain_pending();
        assert_eq!(events, (0..10).map(line).collect::<Vec<_>>());
        assert!(consumer.is_empty());
        assert_eq!(consumer.pushed_count(), 10);
    }

    #[test]
    fn test_drop_oldest_evicts_head_and_counts() {
        let (producer, consumer) = line_queue(4, OverflowPolicy::DropOldest);
        let shutdown = AtomicBool::new(false);
        for n in 0..6 {
            producer.push(line(n), &shutdown).unwrap();
        }

        assert_eq!(consumer.dropped_count(), 2);
        assert_eq!(consumer.drain_pending(), (2..6).map(line).collect::<Vec<_>>());
    }

    #[test]
    fn test_blocking_push_gives_up_on_shutdown() {
        let (producer, _consumer) = line_queue(1, OverflowPolicy::Block);
        let shutdown = AtomicBool::new(false);
        producer.push(line(0), &shutdown).unwrap();

        shutdown.store(true, Ordering::Relaxed);
        assert_eq!(producer.push(line(1), &shutdown), Err(QueueError::Shutdown));
    }

    #[test]
    fn test_blocking_push_waits_for_consumer() {
        let (producer, consumer) = line_queue(1, OverflowPolicy::Block);
        let shutdown = Arc::new(AtomicBool::new(false));
        producer.push(line(0), &shutdown).unwrap();

        let flag = Arc::clone(&shutdown);
        let worker = std::thread::spawn(move || producer.push(line(1), &flag));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(consumer.drain_pending(), vec![line(0)]);

        assert_eq!(worker.join().unwrap(), Ok(()));
        assert_eq!(consumer.drain_pending(), vec![line(1)]);
        assert_eq!(consumer.dropped_count(), 0);
    }

    #[test]
    fn test_push_fails_after_consumer_dropped() {
        let (producer, consumer) = line_queue(4, OverflowPolicy::Block);
        drop(consumer);
        let shutdown = AtomicBool::new(false);
        assert_eq!(producer.push(line(0), &shutdown), Err(QueueError::Disconnected));
    }

    #[test]
    fn test_evicting_push_fails_after_consumer_dropped() {
        let (producer, consumer) = line_queue(2, OverflowPolicy::DropOldest);
        let shutdown = AtomicBool::new(false);
        producer.push(line(0), &shutdown).unwrap();
        drop(consumer);

        assert_eq!(producer.push(line(1), &shutdown), Err(QueueError::Disconnected));
        assert_eq!(producer.push(line(2), &shutdown), Err(QueueError::Disconnected));
    }
}
