use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::resolver;

/// How long a progress entry stays around after its request was created.
const ENTRY_TTL_HOURS: i64 = 24;

/// Latest known state of one pipeline run, as exposed to polling clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub percent: u8,
    pub step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressSnapshot {
    pub fn new(percent: u8, step: &str) -> Self {
        Self {
            percent: percent.min(100),
            step: step.to_string(),
            title: None,
            video_id: None,
            url: None,
            error: None,
        }
    }

    /// State reported for request ids nobody has written yet.
    pub fn not_started() -> Self {
        Self::new(0, "not started")
    }
}

/// Store for per-request pipeline progress.
///
/// An abstraction rather than a bare map so a single-process store can be
/// swapped for a shared external one when running multiple instances.
/// Implementations are last-write-wins per request id; stages of one
/// request only ever move its percentage forward.
pub trait ProgressStore: Send + Sync {
    /// Overwrite the entry for `request_id` with the latest snapshot.
    fn update(&self, request_id: &str, snapshot: ProgressSnapshot);

    /// Latest snapshot, or the "not started" default for unknown ids.
    fn get(&self, request_id: &str) -> ProgressSnapshot;

    /// Drop entries whose request id is older than the retention window.
    fn sweep(&self);
}

/// In-memory, process-wide progress store. Entries do not survive restart.
pub struct MemoryProgressStore {
    entries: Mutex<HashMap<String, ProgressSnapshot>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn update(&self, request_id: &str, snapshot: ProgressSnapshot) {
        tracing::debug!(
            "Progress {}: {}% ({})",
            request_id,
            snapshot.percent,
            snapshot.step
        );
        {
            let mut entries = self.entries.lock().unwrap();
            entries.insert(request_id.to_string(), snapshot);
        }
        self.sweep();
    }

    fn get(&self, request_id: &str) -> ProgressSnapshot {
        let entries = self.entries.lock().unwrap();
        entries
            .get(request_id)
            .cloned()
            .unwrap_or_else(ProgressSnapshot::not_started)
    }

    fn sweep(&self) {
        let cutoff =
            (chrono::Utc::now() - chrono::Duration::hours(ENTRY_TTL_HOURS)).timestamp_millis();
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|request_id, _| {
            match resolver::request_timestamp_millis(request_id) {
                Some(millis) => millis >= cutoff,
                // Ids without an embedded timestamp are kept; they cannot be
                // aged and clients may still be polling them.
                None => true,
            }
        });
    }
}

/// Convenience for stage code: write percent + step for a request.
pub fn report(store: &dyn ProgressStore, request_id: &str, percent: u8, step: &str) {
    store.update(request_id, ProgressSnapshot::new(percent, step));
}
