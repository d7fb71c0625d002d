//! Background save queue.
//!
//! One thread owns the [`Database`] and writes snapshots one at a time. When
//! several snapshots are queued only the newest is written. Outcomes come back
//! through [`SnapshotWriter::poll`], which never blocks.

use std::sync::mpsc;
use std::thread::JoinHandle;
use tracing::{error, info};

use crate::database::Database;
use crate::models::StateSnapshot;

enum Command {
    Save(Box<StateSnapshot>),
    Shutdown,
}

/// Result of one save attempt reported back to the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Failed(String),
}

pub struct SnapshotWriter {
    tx: mpsc::Sender<Command>,
    rx: mpsc::Receiver<SaveOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl SnapshotWriter {
    /// Move the database onto a dedicated writer thread
    pub fn start(db: Database) -> Self {
        let (tx, cmd_rx) = mpsc::channel();
        let (outcome_tx, rx) = mpsc::channel();

        let handle = std::thread::spawn(move || run(db, cmd_rx, outcome_tx));

        SnapshotWriter {
            tx,
            rx,
            handle: Some(handle),
        }
    }

    /// Queue a snapshot. Returns false when the writer thread is gone.
    pub fn submit(&self, snapshot: StateSnapshot) -> bool {
        self.tx.send(Command::Save(Box::new(snapshot))).is_ok()
    }

    /// Non-blocking poll for finished saves.
    /// Returns all queued outcomes (may be empty).
    pub fn poll(&self) -> Vec<SaveOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(outcome) = self.rx.try_recv() {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Flush anything still queued and wait for the thread to finish.
    /// Returns the outcomes not yet polled, including the final flush.
    pub fn shutdown(mut self) -> Vec<SaveOutcome> {
        self.stop();
        self.poll()
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.tx.send(Command::Shutdown);
            if handle.join().is_err() {
                error!("snapshot writer thread panicked");
            }
        }
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(mut db: Database, rx: mpsc::Receiver<Command>, outcomes: mpsc::Sender<SaveOutcome>) {
    while let Ok(first) = rx.recv() {
        let mut latest = None;
        let mut shutdown = false;
        for command in std::iter::once(first).chain(rx.try_iter()) {
            match command {
                Command::Save(snapshot) => latest = Some(snapshot),
                Command::Shutdown => shutdown = true,
            }
        }

        if let Some(snapshot) = latest {
            let outcome = match db.save_snapshot(&snapshot) {
                Ok(()) => SaveOutcome::Saved,
                Err(e) => {
                    error!(error = %e, "failed to save snapshot");
                    SaveOutcome::Failed(e.to_string())
                }
            };
            let _ = outcomes.send(outcome);
        }

        if shutdown {
            break;
        }
    }
    info!("snapshot writer stopped");
}
