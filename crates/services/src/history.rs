//! Research history persisted as a small JSON file, newest first.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use shared::research::HistoryEntry;
use std::fs;
use std::path::{Path, PathBuf};

/// How many finished runs are kept
pub const HISTORY_LIMIT: usize = 10;

/// Receives one entry per completed run.
pub trait HistoryStore: Send + Sync {
    fn record(&self, entry: HistoryEntry) -> Result<()>;

    /// Stored entries, newest first.
    fn entries(&self) -> Result<Vec<HistoryEntry>>;
}

pub struct JsonHistoryStore {
    path: PathBuf,
    limit: usize,
    // Serializes read-modify-write cycles within the process.
    lock: Mutex<()>,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            limit: HISTORY_LIMIT,
            lock: Mutex::new(()),
        }
    }

    /// Store under the platform data directory.
    pub fn open_default() -> Self {
        Self::new(default_history_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unreadable history file is kept before a fresh one is written.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "history.json".into());
        name.push(".bak");
        self.path.with_file_name(name)
    }

    fn load(&self) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading history {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing history {}", self.path.display()))
    }
}

impl HistoryStore for JsonHistoryStore {
    fn record(&self, entry: HistoryEntry) -> Result<()> {
        let _guard = self.lock.lock();
        let mut entries = match self.load() {
            Ok(entries) => entries,
            Err(e) => {
                let backup = self.backup_path();
                fs::rename(&self.path, &backup).with_context(|| {
                    format!("moving unreadable history to {}", backup.display())
                })?;
                tracing::warn!(error = %e, backup = %backup.display(), "unreadable history moved aside");
                Vec::new()
            }
        };
        entries.insert(0, entry);
        entries.truncate(self.limit);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&entries)?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing history {}", self.path.display()))?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<HistoryEntry>> {
        let _guard = self.lock.lock();
        self.load()
    }
}

pub fn default_history_path() -> PathBuf {
    directories::ProjectDirs::from("com.local", "Deep Search", "DeepSearch")
        .map(|p| p.data_dir().join("history.json"))
        .unwrap_or_else(|| PathBuf::from("./history.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_newest_first_and_bounded() {
        let dir = tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("nested").join("history.json"));
        assert!(store.entries().unwrap().is_empty());

        for i in 0..12 {
            store
                .record(HistoryEntry::new(format!("question {}", i), "answer [1]", Vec::new()))
                .unwrap();
        }

        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), HISTORY_LIMIT);
        assert_eq!(entries[0].question, "question 11");
        assert_eq!(entries[9].question, "question 2");
        assert_eq!(entries[0].answer, "answer [1]");
    }

    #[test]
    fn test_corrupt_file_is_kept_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not a list").unwrap();

        let store = JsonHistoryStore::new(&path);
        assert!(store.entries().is_err());
        store
            .record(HistoryEntry::new("q", "a", Vec::new()))
            .unwrap();
        assert_eq!(store.entries().unwrap().len(), 1);

        let backup = store.backup_path();
        assert_eq!(backup, dir.path().join("history.json.bak"));
        assert_eq!(fs::read_to_string(backup).unwrap(), "{ not a list");
    }
}
