use std::{collections::VecDeque, fmt};

use chrono::Local;
use tokio::sync::{broadcast, Mutex};

use crate::ClientEvent;

const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Local wall-clock time, formatted when the entry was appended.
    pub timestamp: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp, self.message)
    }
}

/// Append-only operational log for the session, newest entry first.
///
/// Purely observational: nothing in the client reads it back to make a decision.
pub struct EventLog {
    entries: Mutex<VecDeque<LogEntry>>,
    events: broadcast::Sender<ClientEvent>,
}

impl EventLog {
    pub fn new(events: broadcast::Sender<ClientEvent>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            events,
        }
    }

    pub async fn append(&self, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            message: message.into(),
        };
        {
            let mut entries = self.entries.lock().await;
            entries.push_front(entry.clone());
        }
        let _ = self.events.send(ClientEvent::Logged(entry.clone()));
        entry
    }

    pub async fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/event_log_tests.rs"]
mod tests;
