//! Render results and the issues recovered along the way

use std::path::PathBuf;

use serde::Serialize;

use crate::dsp::StageFailure;
use crate::engine::AudioBuffer;
use crate::error::RemixError;
use crate::remix::compositor::RenderStatus;
use crate::remix::instructions::InstructionSet;

/// A recovered error: the edit it belongs to did not make it into the output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemixIssue {
    /// `None` for mix-wide stages such as the global reverb
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stem: Option<String>,
    pub stage: String,
    pub code: String,
    pub message: String,
}

impl RemixIssue {
    pub fn from_error(stem: Option<&str>, stage: &str, error: &RemixError) -> Self {
        Self {
            stem: stem.map(str::to_string),
            stage: stage.to_string(),
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }

    pub fn from_failure(stem: Option<&str>, failure: &StageFailure) -> Self {
        Self::from_error(stem, failure.stage, &failure.error)
    }
}

/// A rendered remix
#[derive(Debug, Clone, Serialize)]
pub struct RemixArtifact {
    #[serde(skip)]
    pub buffer: AudioBuffer,
    pub file_name: String,
    /// Where the WAV was written, if an output directory is configured
    pub path: Option<PathBuf>,
    pub status: RenderStatus,
    pub tags: Vec<String>,
    pub issues: Vec<RemixIssue>,
    /// The clamped instruction set that was rendered
    pub instructions: InstructionSet,
}

impl RemixArtifact {
    pub fn is_applied(&self) -> bool {
        self.status == RenderStatus::Applied
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RenderOutcome {
    Rendered(RemixArtifact),
    /// The instructions touch no stem and add no global reverb
    NothingToRemix,
}

impl RenderOutcome {
    pub fn artifact(&self) -> Option<&RemixArtifact> {
        match self {
            Self::Rendered(artifact) => Some(artifact),
            Self::NothingToRemix => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FeedbackOutcome {
    Remixed {
        outcome: RenderOutcome,
        summary: String,
    },
    /// The delta produced no detectable change; nothing was rendered
    NoChange { message: String },
}

/// One stem written out by a separation request
#[derive(Debug, Clone, Serialize)]
pub struct ExportedStem {
    pub stem: String,
    pub file_name: String,
    pub path: Option<PathBuf>,
    #[serde(skip)]
    pub buffer: AudioBuffer,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeparationReport {
    pub stems: Vec<ExportedStem>,
    pub issues: Vec<RemixIssue>,
}
