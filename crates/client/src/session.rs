//! Persisted job id.
//!
//! The active job id survives restarts under the [`SESSION_KEY`] key so a
//! job can be picked up again after the process exits. Only the id is
//! stored; everything else is re-fetched from the backend.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};

use panel_core::types::JobId;

/// Key under which the active job id is stored.
pub const SESSION_KEY: &str = "panel_one_job_id";

/// Key-value storage for the active job id.
pub trait SessionStore: Send + Sync {
    /// Return the stored job id, if any.
    fn load(&self) -> Result<Option<JobId>, SessionError>;

    /// Store `job_id`, replacing any previous value.
    fn save(&self, job_id: &str) -> Result<(), SessionError>;

    /// Remove the stored job id. Removing a missing id is not an error.
    fn clear(&self) -> Result<(), SessionError>;
}

/// Errors from a session store.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Session file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// A JSON object on disk, e.g. `{"panel_one_job_id":"abc123"}`.
///
/// Other keys in the object are preserved whatever their type.
///
/// Writes go through a temporary file and a rename so a crash never
/// leaves a half-written session behind.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Map<String, Value>, SessionError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Map::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_entries(&self, entries: &Map<String, Value>) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<JobId>, SessionError> {
        let mut entries = self.read_entries()?;
        match entries.remove(SESSION_KEY) {
            Some(Value::String(id)) if !id.is_empty() => Ok(Some(id)),
            Some(Value::String(_)) | Some(Value::Null) | None => Ok(None),
            Some(other) => {
                tracing::warn!(value = %other, "Ignoring non-string session job id");
                Ok(None)
            }
        }
    }

    fn save(&self, job_id: &str) -> Result<(), SessionError> {
        let mut entries = self.read_entries()?;
        entries.insert(SESSION_KEY.to_string(), Value::String(job_id.to_string()));
        self.write_entries(&entries)
    }

    fn clear(&self) -> Result<(), SessionError> {
        let mut entries = self.read_entries()?;
        if entries.remove(SESSION_KEY).is_none() {
            return Ok(());
        }
        if entries.is_empty() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        } else {
            self.write_entries(&entries)
        }
    }
}

/// In-process store for tests and embedding.
#[derive(Default)]
pub struct MemorySessionStore {
    job_id: Mutex<Option<JobId>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `job_id`, as after a previous run.
    pub fn with_job_id(job_id: impl Into<JobId>) -> Self {
        Self {
            job_id: Mutex::new(Some(job_id.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<JobId>> {
        self.job_id.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<JobId>, SessionError> {
        Ok(self.slot().clone())
    }

    fn save(&self, job_id: &str) -> Result<(), SessionError> {
        *self.slot() = Some(job_id.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.slot() = None;
        Ok(())
    }
}
