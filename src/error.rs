//! Error handling for Stemcraft
//!
//! Every error carries a stable code and a user-facing message. Stage-local
//! errors are recoverable and end up as [`RemixIssue`](crate::remix::RemixIssue)
//! records; mix-level and shape-level errors abort the request.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Stemcraft operations
pub type Result<T> = std::result::Result<T, RemixError>;

/// Main error type for Stemcraft operations
#[derive(Error, Debug)]
pub enum RemixError {
    // Session Errors
    #[error("No audio attached to session {session_id}")]
    MissingMix { session_id: String },

    #[error("Nothing to adjust yet for session {session_id}")]
    NoBaseline { session_id: String },

    // Stem Errors
    #[error("Unsupported stem: {stem}")]
    UnsupportedStem { stem: String },

    #[error("Shape mismatch: {reason}")]
    ShapeMismatch { reason: String },

    #[error("Separation failed: {reason}")]
    Separation { reason: String },

    // Stage Errors
    #[error("Incomplete {stage} parameters for {stem}: missing {missing}")]
    IncompleteParameter {
        stem: String,
        stage: &'static str,
        missing: String,
    },

    #[error("External stage '{stage}' failed: {reason}")]
    ExternalStage { stage: &'static str, reason: String },

    #[error("Pitch shift failed: {reason}")]
    PitchShift { reason: String },

    #[error("DSP overflow: stage '{stage}' produced invalid audio (NaN/Inf)")]
    DspOverflow { stage: &'static str },

    #[error("Invalid parameter {param}={value}, expected {expected}")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    // File Errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio { reason: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // Runtime Errors
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RemixError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            RemixError::MissingMix { .. } => "MISSING_MIX",
            RemixError::NoBaseline { .. } => "NO_BASELINE",
            RemixError::UnsupportedStem { .. } => "UNSUPPORTED_STEM",
            RemixError::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            RemixError::Separation { .. } => "SEPARATION_ERROR",
            RemixError::IncompleteParameter { .. } => "INCOMPLETE_PARAMETER",
            RemixError::ExternalStage { .. } => "EXTERNAL_STAGE_ERROR",
            RemixError::PitchShift { .. } => "PITCH_SHIFT_ERROR",
            RemixError::DspOverflow { .. } => "DSP_OVERFLOW",
            RemixError::InvalidParameter { .. } => "INVALID_PARAMETER",
            RemixError::FileNotFound { .. } => "FILE_NOT_FOUND",
            RemixError::InvalidAudio { .. } => "INVALID_AUDIO",
            RemixError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            RemixError::Timeout { .. } => "TIMEOUT",
            RemixError::Config { .. } => "CONFIG_ERROR",
            RemixError::Io(_) => "IO_ERROR",
            RemixError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recovered locally instead of aborting a remix
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RemixError::UnsupportedStem { .. }
                | RemixError::IncompleteParameter { .. }
                | RemixError::ExternalStage { .. }
                | RemixError::PitchShift { .. }
                | RemixError::DspOverflow { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RemixError::MissingMix { .. } => vec![
                "Upload a track before asking for a remix",
                "Check that the uploaded file still exists",
            ],
            RemixError::NoBaseline { .. } => vec![
                "Describe an initial remix first, e.g. 'make the vocals louder'",
            ],
            RemixError::UnsupportedStem { .. } => vec![
                "Supported stems: vocals, drums, bass, other",
            ],
            RemixError::IncompleteParameter { .. } => vec![
                "EQ needs frequency, width and gain_db",
                "Low/high-pass filters need a cutoff; band-pass needs low_cutoff and high_cutoff",
            ],
            RemixError::ExternalStage { .. } => vec![
                "Check that sox is installed and on PATH",
                "Switch the stage backend to 'native'",
            ],
            RemixError::PitchShift { .. } => vec![
                "Try a smaller pitch shift (at most two octaves)",
            ],
            RemixError::Timeout { .. } => vec![
                "Try a shorter track",
                "Target fewer stems in one request",
            ],
            _ => vec![],
        }
    }

    /// Get a user-friendly message for this error
    pub fn friendly_message(&self) -> String {
        match self {
            RemixError::MissingMix { .. } => {
                "I don't have a track for this session yet. Upload one and tell me what to change."
                    .to_string()
            }
            RemixError::NoBaseline { .. } => {
                "There's no remix to adjust yet. Tell me what you'd like changed first, \
                 for example 'make the vocals louder'."
                    .to_string()
            }
            RemixError::UnsupportedStem { stem } => {
                format!("I can't isolate '{}' from this track, so I left it alone.", stem)
            }
            RemixError::IncompleteParameter { stem, stage, missing } => {
                format!(
                    "I skipped the {} on {} because {} wasn't specified.",
                    stage, stem, missing
                )
            }
            RemixError::ExternalStage { stage, .. } => {
                format!("The {} step didn't work this time, so that edit wasn't applied.", stage)
            }
            RemixError::PitchShift { .. } => {
                "The pitch shift failed, so I left that stem out of the remix.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = RemixError::MissingMix {
            session_id: "s1".to_string(),
        };
        assert_eq!(err.error_code(), "MISSING_MIX");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_stage_errors_are_recoverable() {
        let err = RemixError::ExternalStage {
            stage: "reverb",
            reason: "exit status 1".to_string(),
        };
        assert!(err.is_recoverable());
        assert!(!err.recovery_suggestions().is_empty());

        let err = RemixError::IncompleteParameter {
            stem: "vocals".to_string(),
            stage: "eq",
            missing: "width".to_string(),
        };
        assert!(err.is_recoverable());
        assert!(err.friendly_message().contains("width"));
    }

    #[test]
    fn test_no_baseline_asks_for_instruction() {
        let err = RemixError::NoBaseline {
            session_id: "s1".to_string(),
        };
        assert_eq!(err.error_code(), "NO_BASELINE");
        assert!(err.friendly_message().contains("first"));
    }
}
