//! Run history persistence -- a bounded, ordered JSON log of completed runs.
//!
//! The whole log is a single JSON array. Every append is a read-modify-write
//! of the full document, written to a temporary sibling and renamed over the
//! old log, so readers see either the previous or the new version.

pub mod schema;

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use self::schema::{RunOverview, RunResult};

/// Retention cap for the history log.
pub const DEFAULT_MAX_ENTRIES: usize = 50;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read history {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write history {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode history: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable store of completed runs.
pub trait HistoryRepository: Send + Sync {
    /// The most recent `limit` runs, oldest first.
    fn load(&self, limit: usize) -> Result<Vec<RunResult>, HistoryError>;

    /// Append a run, evicting the oldest entries beyond the retention cap.
    fn append(&self, record: &RunResult) -> Result<(), HistoryError>;
}

/// What was found on disk.
enum LogState {
    Missing,
    Corrupt(serde_json::Error),
    Loaded(Vec<RunResult>),
}

/// History kept as a pretty-printed JSON array in one file.
#[derive(Debug, Clone)]
pub struct JsonHistoryStore {
    path: PathBuf,
    max_entries: usize,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_log(&self) -> Result<LogState, HistoryError> {
        let content = match std::fs::read(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LogState::Missing),
            Err(source) => {
                return Err(HistoryError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(LogState::Loaded(Vec::new()));
        }

        // Invalid UTF-8 surfaces here as a parse error, not an io error.
        match serde_json::from_slice(&content) {
            Ok(history) => Ok(LogState::Loaded(history)),
            Err(e) => Ok(LogState::Corrupt(e)),
        }
    }

    /// Move an unreadable or unparseable log aside instead of overwriting it.
    fn quarantine(&self) -> Option<PathBuf> {
        let stamp = chrono::Utc::now().timestamp();
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "history.json".into());
        name.push(format!(".corrupt-{}", stamp));
        let target = self.path.with_file_name(name);

        match std::fs::rename(&self.path, &target) {
            Ok(()) => Some(target),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not quarantine corrupt history");
                None
            }
        }
    }

    fn write_log(&self, history: &[RunResult]) -> Result<(), HistoryError> {
        let write_err = |source: std::io::Error| HistoryError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(write_err)?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, history)?;
            writer.flush().map_err(write_err)?;
        }
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

impl HistoryRepository for JsonHistoryStore {
    fn load(&self, limit: usize) -> Result<Vec<RunResult>, HistoryError> {
        let mut history = match self.read_log() {
            Ok(LogState::Missing) => Vec::new(),
            Ok(LogState::Corrupt(e)) => {
                warn!(path = %self.path.display(), error = %e, "history is corrupt, treating as empty");
                Vec::new()
            }
            Ok(LogState::Loaded(history)) => history,
            Err(e) => {
                warn!(error = %e, "history unreadable, treating as empty");
                Vec::new()
            }
        };
        let start = history.len().saturating_sub(limit);
        Ok(history.split_off(start))
    }

    fn append(&self, record: &RunResult) -> Result<(), HistoryError> {
        let mut history = match self.read_log() {
            Ok(LogState::Loaded(history)) => history,
            Ok(LogState::Missing) => Vec::new(),
            Ok(LogState::Corrupt(e)) => {
                let moved_to = self.quarantine();
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    quarantined = ?moved_to,
                    "history is corrupt, starting a fresh log"
                );
                Vec::new()
            }
            Err(e) => match self.quarantine() {
                Some(moved_to) => {
                    warn!(error = %e, quarantined = %moved_to.display(), "history unreadable, starting a fresh log");
                    Vec::new()
                }
                // Never overwrite a log that could be neither read nor moved.
                None => return Err(e),
            },
        };

        history.push(record.clone());
        if history.len() > self.max_entries {
            let excess = history.len() - self.max_entries;
            history.drain(..excess);
            debug!(evicted = excess, "history trimmed to cap");
        }

        self.write_log(&history)?;
        info!(path = %self.path.display(), entries = history.len(), "Saved run to history");
        Ok(())
    }
}

/// Volatile history, for tests and embedding.
#[derive(Debug)]
pub struct MemoryHistory {
    entries: Mutex<Vec<RunResult>>,
    max_entries: usize,
}

impl MemoryHistory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RunResult>> {
        // A panic mid-push cannot leave the Vec itself inconsistent.
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl HistoryRepository for MemoryHistory {
    fn load(&self, limit: usize) -> Result<Vec<RunResult>, HistoryError> {
        let entries = self.lock();
        let start = entries.len().saturating_sub(limit);
        Ok(entries[start..].to_vec())
    }

    fn append(&self, record: &RunResult) -> Result<(), HistoryError> {
        let mut entries = self.lock();
        entries.push(record.clone());
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
        }
        Ok(())
    }
}
