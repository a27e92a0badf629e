//! Storage module for the persistent query history
//!
//! The whole history lives in memory, most recent first, and is mirrored to
//! a JSON file that is rewritten after every mutation. Persistence failures
//! are logged and never surface to callers.
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub query: String,
    pub connection_id: String,
    pub connection_name: String,
    #[serde(with = "iso_millis")]
    pub executed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoryEntry {
    pub fn new(
        query: &str,
        connection_id: &str,
        connection_name: &str,
        success: bool,
        execution_time: Option<u64>,
        error: Option<String>,
    ) -> Self {
        // Millisecond precision so the entry equals its persisted form
        let now = Utc::now().trunc_subsecs(3);
        let suffix = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("{}{}", now.timestamp_millis(), &suffix[..9]),
            query: query.trim().to_string(),
            connection_id: connection_id.to_string(),
            connection_name: connection_name.to_string(),
            executed_at: now,
            execution_time,
            success,
            error,
        }
    }
}

/// `executedAt` as ISO-8601 with millisecond precision and a `Z` suffix
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Aggregate counts over a set of history entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_queries: usize,
    pub successful_queries: usize,
    pub failed_queries: usize,
    /// Rounded mean over entries that recorded a time, 0 when none did
    pub average_execution_time: u64,
}

/// File-backed query history, shared by every console in the process
pub struct QueryHistory {
    path: PathBuf,
    max_entries: usize,
    entries: Mutex<Vec<HistoryEntry>>,
}

impl QueryHistory {
    /// Opens the history at `path`, loading whatever is there.
    ///
    /// A missing file is an empty history. An unreadable or corrupt file is
    /// logged and also treated as empty.
    pub fn open(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        let path = path.into();
        let entries = Self::load(&path);
        debug!("Loaded {} history entries from {:?}", entries.len(), path);
        Self {
            path,
            max_entries: max_entries.max(1),
            entries: Mutex::new(entries),
        }
    }

    fn load(path: &Path) -> Vec<HistoryEntry> {
        if !path.exists() {
            return Vec::new();
        }
        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|data| serde_json::from_str(&data).map_err(|e| e.to_string()));
        match parsed {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to load query history from {:?}: {}", path, e);
                Vec::new()
            }
        }
    }

    fn save(&self, entries: &[HistoryEntry]) {
        let result = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or(Ok(()), fs::create_dir_all)
            .map_err(|e| e.to_string())
            .and_then(|_| serde_json::to_string_pretty(entries).map_err(|e| e.to_string()))
            .and_then(|json| fs::write(&self.path, json).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!("Failed to save query history to {:?}: {}", self.path, e);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HistoryEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Records one executed query as the newest entry and persists.
    ///
    /// Entries beyond the configured cap are evicted oldest first.
    pub fn add_query(
        &self,
        query: &str,
        connection_id: &str,
        connection_name: &str,
        success: bool,
        execution_time: Option<u64>,
        error: Option<String>,
    ) {
        let entry = HistoryEntry::new(
            query,
            connection_id,
            connection_name,
            success,
            execution_time,
            error,
        );
        let mut entries = self.lock();
        entries.insert(0, entry);
        entries.truncate(self.max_entries);
        self.save(&entries);
    }

    /// Up to `limit` entries, newest first, optionally for one connection
    pub fn get_history(&self, connection_id: Option<&str>, limit: usize) -> Vec<HistoryEntry> {
        self.lock()
            .iter()
            .filter(|e| matches_connection(e, connection_id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Distinct successful query texts among the `limit` most recent entries,
    /// in first-seen order
    pub fn get_recent_queries(&self, connection_id: Option<&str>, limit: usize) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for entry in self.get_history(connection_id, limit) {
            if entry.success && !entry.query.is_empty() && !seen.contains(&entry.query) {
                seen.push(entry.query);
            }
        }
        seen
    }

    /// Case-insensitive substring search over query text
    pub fn search_history(
        &self,
        term: &str,
        connection_id: Option<&str>,
        limit: usize,
    ) -> Vec<HistoryEntry> {
        let needle = term.to_lowercase();
        self.lock()
            .iter()
            .filter(|e| matches_connection(e, connection_id))
            .filter(|e| e.query.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Removes one connection's entries, or everything when `connection_id` is `None`
    pub fn clear_history(&self, connection_id: Option<&str>) {
        let mut entries = self.lock();
        match connection_id {
            Some(id) => entries.retain(|e| e.connection_id != id),
            None => entries.clear(),
        }
        self.save(&entries);
    }

    pub fn get_stats(&self, connection_id: Option<&str>) -> HistoryStats {
        let entries = self.lock();
        let mut stats = HistoryStats::default();
        let mut time_total: u64 = 0;
        let mut timed: u64 = 0;

        for entry in entries.iter().filter(|e| matches_connection(e, connection_id)) {
            stats.total_queries += 1;
            if entry.success {
                stats.successful_queries += 1;
            }
            if let Some(t) = entry.execution_time {
                time_total += t;
                timed += 1;
            }
        }
        stats.failed_queries = stats.total_queries - stats.successful_queries;
        if timed > 0 {
            stats.average_execution_time = (time_total as f64 / timed as f64).round() as u64;
        }
        stats
    }
}

fn matches_connection(entry: &HistoryEntry, connection_id: Option<&str>) -> bool {
    connection_id.map_or(true, |id| entry.connection_id == id)
}
