//! Session persistence
//!
//! [`SessionStore`] is the load/save seam behind the registry. Stores do no
//! locking of their own beyond keeping their map consistent; serialising
//! work on one session is the registry's job.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use parking_lot::RwLock;
use tempfile::NamedTempFile;

use crate::error::{RemixError, Result};
use crate::session::state::SessionState;

/// Keyed storage for [`SessionState`]
pub trait SessionStore: Send + Sync {
    fn load(&self, session_id: &str) -> Result<Option<SessionState>>;
    fn save(&self, session_id: &str, state: &SessionState) -> Result<()>;
    /// Remove a session; removing an unknown session is not an error.
    fn remove(&self, session_id: &str) -> Result<()>;
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, session_id: &str) -> Result<Option<SessionState>> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    fn save(&self, session_id: &str, state: &SessionState) -> Result<()> {
        self.sessions
            .write()
            .insert(session_id.to_string(), state.clone());
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<()> {
        self.sessions.write().remove(session_id);
        Ok(())
    }
}

// ============================================================================
// JSON files
// ============================================================================

/// One pretty-printed `<session_id>.json` per session
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        Ok(self.dir.join(format!("{}.json", session_id)))
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self, session_id: &str) -> Result<Option<SessionState>> {
        let path = self.session_path(session_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, session_id: &str, state: &SessionState) -> Result<()> {
        let path = self.session_path(session_id)?;
        let content = serde_json::to_string_pretty(state)?;

        // Write next to the target and rename so readers never see a partial file
        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(content.as_bytes())?;
        file.persist(&path).map_err(|e| RemixError::Io(e.error))?;

        debug!("Saved session {} to {}", session_id, path.display());
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<()> {
        let path = self.session_path(session_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Session ids become file names, so only a conservative character set is allowed
fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RemixError::InvalidParameter {
            param: "session_id".to_string(),
            value: session_id.to_string(),
            expected: "non-empty ASCII letters, digits, '-' or '_'".to_string(),
        })
    }
}
