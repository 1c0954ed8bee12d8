//! Block event monitor.
//!
//! Raw block notifications cross into the notifier through a channel. A pool
//! of dispatcher threads pulls from the channel and calls
//! [`EventCoordinator::on_block_event`], so events for different programs are
//! processed concurrently, exactly as a platform callback would deliver them.
//!
//! ```text
//! EventSender ──┐
//! EventSender ──┼──► mpsc ──► fwnotify-monitor-0 ──┐
//! EventSender ──┘       └───► fwnotify-monitor-N ──┴──► EventCoordinator
//! ```

use crate::services::EventCoordinator;
use crate::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Default number of dispatcher threads.
pub const DEFAULT_MONITOR_WORKERS: usize = 4;

#[derive(Debug)]
enum Message {
    Event(String),
    Stop,
}

/// Handle for delivering raw block events.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<Message>,
}

impl EventSender {
    /// Delivers a raw block event path.
    ///
    /// Returns false once the monitor has stopped.
    pub fn deliver(&self, raw_path: impl Into<String>) -> bool {
        self.tx.send(Message::Event(raw_path.into())).is_ok()
    }
}

/// Pool of dispatcher threads feeding the coordinator.
#[derive(Debug)]
pub struct BlockMonitor {
    tx: Sender<Message>,
    workers: Vec<JoinHandle<()>>,
    processed: Arc<AtomicUsize>,
}

impl BlockMonitor {
    /// Starts `workers` dispatcher threads (at least one).
    ///
    /// # Errors
    ///
    /// Returns an error if a thread cannot be spawned. Threads already
    /// started are stopped first.
    pub fn start(
        coordinator: Arc<EventCoordinator>,
        workers: usize,
    ) -> Result<(EventSender, Self)> {
        let (tx, rx) = mpsc::channel();
        let rx = Arc::new(Mutex::new(rx));
        let mut monitor = Self {
            tx: tx.clone(),
            workers: Vec::with_capacity(workers.max(1)),
            processed: Arc::new(AtomicUsize::new(0)),
        };

        for index in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let coordinator = Arc::clone(&coordinator);
            let processed = Arc::clone(&monitor.processed);
            let spawned = thread::Builder::new()
                .name(format!("fwnotify-monitor-{index}"))
                .spawn(move || dispatch(&rx, &coordinator, &processed));

            match spawned {
                Ok(handle) => monitor.workers.push(handle),
                Err(e) => {
                    monitor.stop();
                    return Err(Error::operation("spawn_monitor_thread", e));
                },
            }
        }

        tracing::info!(workers = monitor.workers.len(), "Block monitor started");
        Ok((EventSender { tx }, monitor))
    }

    /// Returns the number of events handed to the coordinator so far.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    /// Returns the number of dispatcher threads.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Stops the dispatchers and waits for them.
    ///
    /// Events delivered before this call are processed; no event is
    /// processed after it returns.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        for _ in 0..self.workers.len() {
            // A send only fails once every dispatcher has already exited.
            let _ = self.tx.send(Message::Stop);
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Monitor dispatcher panicked");
            }
        }
        tracing::info!(processed = self.processed(), "Block monitor stopped");
    }
}

impl Drop for BlockMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn dispatch(rx: &Mutex<Receiver<Message>>, coordinator: &EventCoordinator, processed: &AtomicUsize) {
    loop {
        let message = {
            let rx = rx.lock().unwrap_or_else(PoisonError::into_inner);
            rx.recv()
        };
        match message {
            Ok(Message::Event(raw_path)) => {
                coordinator.on_block_event(&raw_path);
                processed.fetch_add(1, Ordering::SeqCst);
            },
            Ok(Message::Stop) | Err(_) => break,
        }
    }
}
