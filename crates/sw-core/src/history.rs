//! Bounded command history persisted as a JSON array.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::epoch_secs;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("history encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Seconds since the epoch.
    pub ts: u64,
    pub query: String,
    pub command: String,
    pub explanation: String,
    pub success: bool,
    pub provider: String,
}

impl HistoryEntry {
    pub fn new(
        query: impl Into<String>,
        command: impl Into<String>,
        explanation: impl Into<String>,
        success: bool,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            ts: epoch_secs(),
            query: query.into(),
            command: command.into(),
            explanation: explanation.into(),
            success,
            provider: provider.into(),
        }
    }
}

#[derive(Debug)]
pub struct HistoryStore {
    /// `None` keeps entries in memory only.
    path: Option<PathBuf>,
    max_entries: usize,
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    /// Load from `path`. A missing file is an empty history; a corrupt
    /// one is logged and treated as empty.
    pub fn load(path: &Path, max_entries: usize) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str::<Vec<HistoryEntry>>(&text).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "corrupt history file, starting empty");
                Vec::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable history file, starting empty");
                Vec::new()
            }
        };

        let mut store = Self {
            path: Some(path.to_path_buf()),
            max_entries,
            entries,
        };
        store.truncate();
        store
    }

    /// History that is never written to disk.
    pub fn in_memory(max_entries: usize) -> Self {
        Self {
            path: None,
            max_entries,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append, drop the oldest entries beyond the limit, then save.
    pub fn add_entry(&mut self, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.entries.push(entry);
        self.truncate();
        self.save()
    }

    /// The newest `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[HistoryEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Commands of the newest `n` entries, oldest first.
    pub fn recent_commands(&self, n: usize) -> Vec<String> {
        self.recent(n).iter().map(|e| e.command.clone()).collect()
    }

    /// Case-insensitive substring search over queries and commands.
    pub fn search(&self, text: &str) -> Vec<&HistoryEntry> {
        let needle = text.to_lowercase();
        self.entries
            .iter()
            .filter(|e| {
                e.query.to_lowercase().contains(&needle)
                    || e.command.to_lowercase().contains(&needle)
            })
            .collect()
    }

    fn truncate(&mut self) {
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
    }

    fn save(&self) -> Result<(), HistoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, json)?;
        Ok(())
    }
}
