//! Bounded in-memory record of the changes the daemon has observed.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use confwatch_core::WatchKey;
use confwatch_engine::ChangeEvent;

#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub key: WatchKey,
    pub fingerprint: String,
    pub content: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl From<&ChangeEvent> for JournalEntry {
    fn from(event: &ChangeEvent) -> Self {
        Self {
            key: event.key.clone(),
            fingerprint: event.fingerprint.to_string(),
            content: event.snapshot.content().map(str::to_string),
            observed_at: event.observed_at,
        }
    }
}

/// Oldest entries are dropped once `capacity` is reached.
#[derive(Debug)]
pub struct ChangeJournal {
    capacity: usize,
    entries: Mutex<VecDeque<JournalEntry>>,
    total: Mutex<u64>,
}

impl ChangeJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
            total: Mutex::new(0),
        }
    }

    pub fn record(&self, event: &ChangeEvent) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(JournalEntry::from(event));
        *self.total.lock() += 1;
    }

    /// Up to `limit` most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<JournalEntry> {
        self.entries.lock().iter().rev().take(limit).cloned().collect()
    }

    /// Changes recorded since start, including evicted ones.
    pub fn total(&self) -> u64 {
        *self.total.lock()
    }
}
