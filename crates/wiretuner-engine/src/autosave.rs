//! Auto-save debouncer
//!
//! Events are already durable when `append` returns; auto-save only closes
//! the idle window and records how far durability has been confirmed. It
//! never creates snapshots and never touches metadata.

#![allow(clippy::result_large_err)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use wiretuner_core::errors::{ExError, ExErrorKind};
use wiretuner_core_types::Sequence;
use wiretuner_store::errors::{lock_poisoned, Result};

enum Message {
    Recorded(Sequence),
    Flush(Sender<Sequence>),
    Shutdown,
}

#[derive(Debug, Default)]
struct Shared {
    recorded: AtomicU64,
    confirmed: AtomicU64,
    windows_closed: AtomicU64,
}

/// Point-in-time view of the debouncer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveStatus {
    /// Newest sequence reported to the debouncer
    pub last_recorded: Sequence,
    /// Newest sequence whose idle window has closed
    pub last_confirmed: Sequence,
    pub windows_closed: u64,
}

impl AutosaveStatus {
    pub fn pending(&self) -> bool {
        self.last_recorded > self.last_confirmed
    }
}

pub struct Autosave {
    sender: Mutex<Sender<Message>>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Autosave {
    /// Start the debouncer with the given idle window
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the worker thread cannot be started.
    pub fn start(idle: Duration, head: Sequence) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let shared = Arc::new(Shared::default());
        shared.recorded.store(head, Ordering::Release);
        shared.confirmed.store(head, Ordering::Release);

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("wiretuner-autosave".to_string())
            .spawn(move || run(receiver, idle, &worker_shared))
            .map_err(|e| {
                ExError::new(ExErrorKind::Internal)
                    .with_op("autosave")
                    .with_message(format!("Cannot start auto-save worker: {}", e))
            })?;

        Ok(Self {
            sender: Mutex::new(sender),
            shared,
            worker: Some(worker),
        })
    }

    /// Restart the idle window after an append
    pub fn notify(&self, sequence: Sequence) {
        self.shared.recorded.fetch_max(sequence, Ordering::AcqRel);
        if let Ok(sender) = self.sender.lock() {
            let _ = sender.send(Message::Recorded(sequence));
        }
    }

    /// Close any open window now, returning the confirmed sequence
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the worker has stopped.
    pub fn flush(&self) -> Result<Sequence> {
        let (ack, confirmed) = mpsc::channel();
        self.sender
            .lock()
            .map_err(|_| lock_poisoned("autosave"))?
            .send(Message::Flush(ack))
            .map_err(|_| worker_stopped())?;
        confirmed.recv().map_err(|_| worker_stopped())
    }

    pub fn status(&self) -> AutosaveStatus {
        AutosaveStatus {
            last_recorded: self.shared.recorded.load(Ordering::Acquire),
            last_confirmed: self.shared.confirmed.load(Ordering::Acquire),
            windows_closed: self.shared.windows_closed.load(Ordering::Acquire),
        }
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        if let Ok(sender) = self.sender.lock() {
            let _ = sender.send(Message::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_stopped() -> ExError {
    ExError::new(ExErrorKind::Internal)
        .with_op("autosave")
        .with_message("Auto-save worker has stopped")
}

fn run(receiver: mpsc::Receiver<Message>, idle: Duration, shared: &Shared) {
    let mut pending: Option<Sequence> = None;

    loop {
        let message = match pending {
            Some(_) => receiver.recv_timeout(idle),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match message {
            Ok(Message::Recorded(sequence)) => {
                pending = Some(pending.map_or(sequence, |p| p.max(sequence)));
            }
            Ok(Message::Flush(ack)) => {
                if let Some(sequence) = pending.take() {
                    confirm(shared, sequence);
                }
                let _ = ack.send(shared.confirmed.load(Ordering::Acquire));
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(sequence) = pending.take() {
                    confirm(shared, sequence);
                }
            }
            Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(sequence) = pending.take() {
                    confirm(shared, sequence);
                }
                break;
            }
        }
    }
}

fn confirm(shared: &Shared, sequence: Sequence) {
    shared.confirmed.fetch_max(sequence, Ordering::AcqRel);
    shared.windows_closed.fetch_add(1, Ordering::AcqRel);
    tracing::debug!(sequence = sequence, "Auto-save window closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_burst_closes_one_window() {
        let autosave = Autosave::start(Duration::from_millis(30), 0).unwrap();
        for sequence in 1..=5 {
            autosave.notify(sequence);
        }
        assert!(autosave.status().pending());

        let deadline = Instant::now() + Duration::from_secs(5);
        while autosave.status().pending() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        let status = autosave.status();
        assert_eq!(status.last_confirmed, 5);
        assert_eq!(status.windows_closed, 1);
    }

    #[test]
    fn test_flush_confirms_immediately() {
        let autosave = Autosave::start(Duration::from_secs(60), 0).unwrap();
        autosave.notify(7);
        assert_eq!(autosave.flush().unwrap(), 7);
        assert!(!autosave.status().pending());
    }

    #[test]
    fn test_flush_without_pending_is_noop() {
        let autosave = Autosave::start(Duration::from_secs(60), 3).unwrap();
        assert_eq!(autosave.flush().unwrap(), 3);
        assert_eq!(autosave.status().windows_closed, 0);
    }
}
