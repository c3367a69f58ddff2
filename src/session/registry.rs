//! Per-session mutual exclusion
//!
//! Every read-modify-write of a session runs under that session's own
//! lock. The registry map is locked only long enough to find or create the
//! per-key lock, so unrelated sessions never wait on each other.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::error::Result;
use crate::remix::InstructionSet;
use crate::session::state::SessionState;
use crate::session::store::SessionStore;

pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Run `f` under the session's lock, then drop the per-key lock if no
    /// other caller is holding or waiting on it
    fn locked<T>(&self, session_id: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.lock_for(session_id);
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);

        let mut locks = self.locks.lock();
        if locks
            .get(session_id)
            .map_or(false, |lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(session_id);
        }
        result
    }

    /// Run `f` on the session's state while holding its lock.
    ///
    /// The state is saved only if `f` succeeds; an unknown session starts
    /// from [`SessionState::default`].
    pub fn with_session<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut SessionState) -> Result<T>,
    ) -> Result<T> {
        self.locked(session_id, || {
            let mut state = self.store.load(session_id)?.unwrap_or_default();
            let before = state.clone();
            let value = f(&mut state)?;
            if state != before {
                state.touch();
                self.store.save(session_id, &state)?;
            }
            Ok(value)
        })
    }

    /// Read the session's state under its lock
    pub fn snapshot(&self, session_id: &str) -> Result<Option<SessionState>> {
        self.locked(session_id, || self.store.load(session_id))
    }

    /// Bind a mix to the session, starting a fresh instruction history
    pub fn attach_mix(&self, session_id: &str, mix_path: &Path) -> Result<()> {
        self.with_session(session_id, |state| {
            *state = SessionState::with_mix(mix_path);
            Ok(())
        })
    }

    pub fn get_mix_path(&self, session_id: &str) -> Result<Option<PathBuf>> {
        Ok(self.snapshot(session_id)?.and_then(|state| state.mix_path))
    }

    pub fn get_last_instructions(&self, session_id: &str) -> Result<Option<InstructionSet>> {
        Ok(self
            .snapshot(session_id)?
            .and_then(|state| state.last_instructions))
    }

    pub fn set_last_instructions(&self, session_id: &str, instructions: InstructionSet) -> Result<()> {
        self.with_session(session_id, |state| {
            state.last_instructions = Some(instructions);
            Ok(())
        })
    }

    /// Forget everything about the session
    pub fn reset_session(&self, session_id: &str) -> Result<()> {
        self.locked(session_id, || self.store.remove(session_id))?;
        debug!("Reset session {}", session_id);
        Ok(())
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().len()
    }
}
