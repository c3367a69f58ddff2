//! Per-session state
//!
//! A session binds one mix to the instruction set of its last applied
//! remix. With no instructions the session is uninitialized and feedback
//! has nothing to adjust.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::remix::InstructionSet;

/// Which kind of request last ran against the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionTask {
    Remix,
    Separation,
}

/// Persisted state of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// The session's mix; never modified once attached.
    #[serde(default)]
    pub mix_path: Option<PathBuf>,
    /// Instruction set of the last applied remix.
    #[serde(default)]
    pub last_instructions: Option<InstructionSet>,
    #[serde(default)]
    pub active_task: Option<SessionTask>,
    pub updated_at: DateTime<Utc>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            mix_path: None,
            last_instructions: None,
            active_task: None,
            updated_at: Utc::now(),
        }
    }
}

impl SessionState {
    pub fn with_mix(path: &Path) -> Self {
        Self {
            mix_path: Some(path.to_path_buf()),
            ..Self::default()
        }
    }

    /// True once a remix has been applied
    pub fn is_active(&self) -> bool {
        self.last_instructions.is_some()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
