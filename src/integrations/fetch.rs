//! Background fetches.
//!
//! Each refresh runs on its own short-lived thread so the UI never waits on
//! the network. Results come back through [`Fetcher::poll`], which never
//! blocks.

use chrono::NaiveDate;
use std::sync::{Arc, mpsc};
use tracing::warn;

use super::github::{GitHubClient, GitHubData};
use super::toggl::{TimeEntry, TogglClient};
use super::{Disconnected, Transport};

pub type SharedTransport = Arc<dyn Transport + Send + Sync>;

/// A finished fetch. Errors are already rendered for display.
#[derive(Debug)]
pub enum FetchResult {
    GitHub(Result<GitHubData, String>),
    Toggl(Result<Vec<TimeEntry>, String>),
}

pub struct Fetcher {
    github: SharedTransport,
    toggl: SharedTransport,
    tx: mpsc::Sender<FetchResult>,
    rx: mpsc::Receiver<FetchResult>,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new(Arc::new(Disconnected), Arc::new(Disconnected))
    }
}

impl Fetcher {
    pub fn new(github: SharedTransport, toggl: SharedTransport) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            github,
            toggl,
            tx,
            rx,
        }
    }

    pub fn fetch_github(&self, allowed_repos: Vec<String>) {
        let transport = Arc::clone(&self.github);
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let client = GitHubClient::new(transport.as_ref(), allowed_repos);
            let result = client.fetch_all().map_err(|e| {
                warn!(error = %e, "github refresh failed");
                e.to_string()
            });
            let _ = tx.send(FetchResult::GitHub(result));
        });
    }

    /// Entries from `start` through `end`, hidden projects dropped
    pub fn fetch_toggl(&self, start: NaiveDate, end: NaiveDate, hidden_project_ids: Vec<i64>) {
        let transport = Arc::clone(&self.toggl);
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let mut client = TogglClient::new(transport.as_ref());
            let result = client
                .time_entries(start, end, &hidden_project_ids)
                .map_err(|e| {
                    warn!(error = %e, "toggl refresh failed");
                    e.to_string()
                });
            let _ = tx.send(FetchResult::Toggl(result));
        });
    }

    /// Finished fetches since the last poll (may be empty)
    pub fn poll(&self) -> Vec<FetchResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.rx.try_recv() {
            results.push(result);
        }
        results
    }

    /// Block until the next fetch finishes or `timeout` passes
    pub fn wait(&self, timeout: std::time::Duration) -> Option<FetchResult> {
        self.rx.recv_timeout(timeout).ok()
    }
}
