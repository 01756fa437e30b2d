use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::MediaId;

/// Maximum number of events retained in the ring buffer.
const SCAN_LOG_CAPACITY: usize = 500;

/// A typed event from one reconciliation pass.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ScanEvent {
    Parsed {
        path: String,
        title: Option<String>,
        episode: Option<u32>,
    },
    ParseFailed {
        path: String,
    },
    Matched {
        path: String,
        media_id: MediaId,
        rule: String,
    },
    Unmatched {
        path: String,
        rule: String,
    },
    Ambiguous {
        path: String,
        candidates: Vec<MediaId>,
    },
    SearchFailed {
        query: String,
        message: String,
    },
    Hydrated {
        path: String,
        media_id: MediaId,
        episode: u32,
    },
    HydrationFailed {
        media_id: MediaId,
        message: String,
    },
}

/// A timestamped event entry.
pub type ScanLogEntry = (DateTime<Utc>, ScanEvent);

/// Bounded ring buffer of scan events.
#[derive(Debug)]
pub struct ScanLog {
    entries: VecDeque<ScanLogEntry>,
    stats: ScanStats,
}

impl Default for ScanLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(SCAN_LOG_CAPACITY),
            stats: ScanStats::default(),
        }
    }

    /// Push a new event, evicting the oldest if at capacity.
    pub fn push(&mut self, event: ScanEvent) {
        self.stats.record(&event);
        if self.entries.len() >= SCAN_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back((Utc::now(), event));
    }

    /// Return a snapshot of all entries (newest last).
    pub fn snapshot(&self) -> Vec<ScanLogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Events that mention `path`, oldest first.
    pub fn events_for(&self, path: &str) -> Vec<ScanLogEntry> {
        self.entries
            .iter()
            .filter(|(_, event)| event.path() == Some(path))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> ScanStats {
        self.stats.clone()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = ScanStats::default();
    }
}

impl ScanEvent {
    fn path(&self) -> Option<&str> {
        match self {
            Self::Parsed { path, .. }
            | Self::ParseFailed { path }
            | Self::Matched { path, .. }
            | Self::Unmatched { path, .. }
            | Self::Ambiguous { path, .. }
            | Self::Hydrated { path, .. } => Some(path),
            Self::SearchFailed { .. } | Self::HydrationFailed { .. } => None,
        }
    }
}

/// Thread-safe handle to the scan log.
pub type SharedScanLog = Arc<Mutex<ScanLog>>;

/// Create a new shared scan log.
pub fn shared_scan_log() -> SharedScanLog {
    Arc::new(Mutex::new(ScanLog::new()))
}

/// Append to a shared log, tolerating a poisoned lock.
pub fn record(log: &SharedScanLog, event: ScanEvent) {
    match log.lock() {
        Ok(mut guard) => guard.push(event),
        Err(poisoned) => poisoned.into_inner().push(event),
    }
}

/// Per-outcome counters, reset with the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub parsed: u64,
    pub parse_failures: u64,
    pub matched: u64,
    pub unmatched: u64,
    pub ambiguous: u64,
    pub search_failures: u64,
    pub hydrated: u64,
    pub hydration_failures: u64,
}

impl ScanStats {
    fn record(&mut self, event: &ScanEvent) {
        let counter = match event {
            ScanEvent::Parsed { .. } => &mut self.parsed,
            ScanEvent::ParseFailed { .. } => &mut self.parse_failures,
            ScanEvent::Matched { .. } => &mut self.matched,
            ScanEvent::Unmatched { .. } => &mut self.unmatched,
            ScanEvent::Ambiguous { .. } => &mut self.ambiguous,
            ScanEvent::SearchFailed { .. } => &mut self.search_failures,
            ScanEvent::Hydrated { .. } => &mut self.hydrated,
            ScanEvent::HydrationFailed { .. } => &mut self.hydration_failures,
        };
        *counter += 1;
    }
}
