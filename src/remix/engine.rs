//! Remix engine
//!
//! Ties separation, remainder reconstruction, the per-stem chains and the
//! compositor together, and runs session requests under the session's
//! lock.
//!
//! ```text
//! mix ──separate──▶ targets ──chain (parallel)──▶ processed ─┐
//!  │                   │                                      ├─▶ Σ ─▶ global reverb ─▶ clip
//!  └──── mix − Σ targets = remainder ─────────────────────────┘
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::{EngineConfig, DEFAULT_STEMS};
use crate::dsp::{backend_for, sweep_stale_scratch, ChainOutput, StageBackend, StemChain};
use crate::engine::{export_audio, import_audio, normalize, AudioBuffer, ExportFormat};
use crate::error::{RemixError, Result};
use crate::remix::compositor::{compose, finish, RenderStatus};
use crate::remix::instructions::InstructionSet;
use crate::remix::naming::{output_file_name, output_tags, random_suffix, stem_file_name};
use crate::remix::remainder::reconstruct_remainder;
use crate::remix::report::{
    ExportedStem, FeedbackOutcome, RemixArtifact, RemixIssue, RenderOutcome, SeparationReport,
};
use crate::remix::separation::Separator;
use crate::session::{
    apply_delta, describe_changes, FeedbackDelta, FeedbackResult, SessionRegistry, SessionState,
    SessionStore, SessionTask,
};

const NO_CHANGE_MESSAGE: &str =
    "I couldn't detect any changes to make. Try being more specific about what to adjust.";

pub struct RemixEngine {
    config: EngineConfig,
    backend: Arc<dyn StageBackend>,
    chain: StemChain,
    separator: Arc<dyn Separator>,
    sessions: SessionRegistry,
}

impl RemixEngine {
    /// Build an engine and sweep scratch files left behind by earlier runs
    pub fn new(
        config: EngineConfig,
        separator: Arc<dyn Separator>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        config.validate()?;
        let backend = backend_for(&config);
        let chain = StemChain::new(Arc::clone(&backend), config.sample_rate);

        let max_age = config.stage_timeout() * 2;
        if let Err(e) = sweep_stale_scratch(&config.scratch_dir(), max_age) {
            warn!("Scratch sweep failed: {}", e);
        }

        info!(
            "Remix engine ready (separator: {}, stages: {:?})",
            separator.name(),
            config.stage_backend
        );

        Ok(Self {
            config,
            backend,
            chain,
            separator,
            sessions: SessionRegistry::new(store),
        })
    }

    /// Replace the stage backend
    pub fn with_backend(mut self, backend: Arc<dyn StageBackend>) -> Self {
        self.chain = StemChain::new(Arc::clone(&backend), self.config.sample_rate);
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render `instructions` against the mix at `mix_path`.
    ///
    /// Stage-level problems are recovered and listed in the artifact's
    /// issues; only mix-level, separation and shape errors abort.
    pub fn render_remix(&self, mix_path: &Path, instructions: &InstructionSet) -> Result<RenderOutcome> {
        let mut instructions = instructions.clone();
        instructions.clamp_ranges();

        let targets = instructions.targeted_stems();
        let global_reverb = instructions.global_reverb_amount();
        if targets.is_empty() && global_reverb <= 0.0 {
            info!("Nothing to remix in {}", mix_path.display());
            return Ok(RenderOutcome::NothingToRemix);
        }

        let mix = import_audio(mix_path)?;
        let mut issues = Vec::new();

        if targets.is_empty() {
            let mut failures = Vec::new();
            let buffer = finish(mix, global_reverb, self.backend.as_ref(), &mut failures);
            let status = if failures.is_empty() {
                RenderStatus::Applied
            } else {
                RenderStatus::NoEditsApplied
            };
            issues.extend(failures.iter().map(|f| RemixIssue::from_failure(None, f)));
            return self.deliver(buffer, status, instructions, issues);
        }

        let mut requested = Vec::with_capacity(targets.len());
        for stem in targets {
            if self.config.is_known_stem(&stem) {
                requested.push(stem);
            } else {
                warn!("Ignoring unsupported stem '{}'", stem);
                issues.push(unsupported(stem));
            }
        }

        let separated = self.separate_with_retry(mix_path, requested, &mut issues)?;
        let stem_buffers: Vec<&AudioBuffer> = separated.iter().map(|(_, buffer)| buffer).collect();
        let remainder = reconstruct_remainder(&mix, &stem_buffers)?;

        let chain = &self.chain;
        let results: Vec<(&str, Result<ChainOutput>)> = separated
            .par_iter()
            .map(|(stem, buffer)| {
                let params = instructions.for_stem(stem);
                (stem.as_str(), chain.run(stem, buffer.clone(), &params))
            })
            .collect();

        let mut processed = Vec::with_capacity(results.len());
        for (stem, result) in results {
            match result {
                Ok(output) => {
                    issues.extend(
                        output
                            .failures
                            .iter()
                            .map(|f| RemixIssue::from_failure(Some(stem), f)),
                    );
                    processed.push(output.buffer);
                }
                Err(error) => {
                    warn!("Dropping {} from the mix: {}", stem, error);
                    issues.push(RemixIssue::from_error(Some(stem), "pitch", &error));
                }
            }
        }

        let composition = compose(&mix, &remainder, &processed, global_reverb, self.backend.as_ref());
        issues.extend(
            composition
                .failures
                .iter()
                .map(|f| RemixIssue::from_failure(None, f)),
        );
        self.deliver(composition.buffer, composition.status, instructions, issues)
    }

    /// Ask the separator for `stems`, dropping any it rejects as unsupported
    /// and retrying with the rest. Returns normalized buffers in stem order.
    fn separate_with_retry(
        &self,
        mix_path: &Path,
        mut stems: Vec<String>,
        issues: &mut Vec<RemixIssue>,
    ) -> Result<Vec<(String, AudioBuffer)>> {
        let mut raw = loop {
            if stems.is_empty() {
                break HashMap::new();
            }
            debug!("Separating {:?} with {}", stems, self.separator.name());
            match self.separator.separate(mix_path, &stems) {
                Ok(raw) => break raw,
                Err(RemixError::UnsupportedStem { stem }) if stems.contains(&stem) => {
                    warn!(
                        "{} separator does not support '{}', continuing without it",
                        self.separator.name(),
                        stem
                    );
                    stems.retain(|s| *s != stem);
                    issues.push(unsupported(stem));
                }
                Err(e @ RemixError::Separation { .. }) => return Err(e),
                Err(e) => {
                    return Err(RemixError::Separation {
                        reason: format!("{} separator failed: {}", self.separator.name(), e),
                    })
                }
            }
        };

        let mut separated = Vec::with_capacity(stems.len());
        for stem in stems {
            match raw.remove(&stem) {
                Some(waveform) => {
                    let buffer = normalize(waveform)?;
                    separated.push((stem, buffer));
                }
                None => {
                    warn!("Separator returned no audio for '{}'", stem);
                    let error = RemixError::Separation {
                        reason: format!("no audio returned for stem '{}'", stem),
                    };
                    issues.push(RemixIssue::from_error(Some(&stem), "separation", &error));
                }
            }
        }
        Ok(separated)
    }

    fn deliver(
        &self,
        buffer: AudioBuffer,
        status: RenderStatus,
        instructions: InstructionSet,
        issues: Vec<RemixIssue>,
    ) -> Result<RenderOutcome> {
        let file_name = output_file_name(&instructions);
        let path = self.write_output(&buffer, &file_name)?;
        let tags = output_tags(&instructions)
            .into_iter()
            .map(String::from)
            .collect();

        info!(
            "Rendered {} ({:.2}s, {:?}, {} issues)",
            file_name,
            buffer.duration_secs(),
            status,
            issues.len()
        );

        Ok(RenderOutcome::Rendered(RemixArtifact {
            buffer,
            file_name,
            path,
            status,
            tags,
            issues,
            instructions,
        }))
    }

    fn write_output(&self, buffer: &AudioBuffer, file_name: &str) -> Result<Option<PathBuf>> {
        match &self.config.output_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                let path = dir.join(file_name);
                export_audio(buffer, &path, ExportFormat::new(self.config.output_bit_depth))?;
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    pub fn attach_mix(&self, session_id: &str, mix_path: &Path) -> Result<()> {
        if !mix_path.is_file() {
            return Err(RemixError::FileNotFound {
                path: mix_path.to_path_buf(),
            });
        }
        self.sessions.attach_mix(session_id, mix_path)?;
        info!("Attached {} to session {}", mix_path.display(), session_id);
        Ok(())
    }

    pub fn get_mix_path(&self, session_id: &str) -> Result<Option<PathBuf>> {
        self.sessions.get_mix_path(session_id)
    }

    pub fn get_last_instructions(&self, session_id: &str) -> Result<Option<InstructionSet>> {
        self.sessions.get_last_instructions(session_id)
    }

    pub fn set_last_instructions(&self, session_id: &str, instructions: InstructionSet) -> Result<()> {
        self.sessions.set_last_instructions(session_id, instructions)
    }

    pub fn reset_session(&self, session_id: &str) -> Result<()> {
        self.sessions.reset_session(session_id)
    }

    pub fn session_state(&self, session_id: &str) -> Result<Option<SessionState>> {
        self.sessions.snapshot(session_id)
    }

    /// Render against the session's mix; an applied render becomes the
    /// session's baseline for feedback.
    pub fn remix_session(&self, session_id: &str, instructions: &InstructionSet) -> Result<RenderOutcome> {
        self.sessions.with_session(session_id, |state| {
            let mix_path = session_mix(session_id, state)?;
            let outcome = self.render_remix(&mix_path, instructions)?;

            if let RenderOutcome::Rendered(artifact) = &outcome {
                if artifact.is_applied() {
                    state.last_instructions = Some(artifact.instructions.clone());
                    state.active_task = Some(SessionTask::Remix);
                }
            }
            Ok(outcome)
        })
    }

    /// Adjust the session's last instructions and re-render.
    ///
    /// # Errors
    /// `NoBaseline` before the first applied remix; `MissingMix` if the
    /// session has no mix.
    pub fn apply_feedback(&self, session_id: &str, delta: &FeedbackDelta) -> Result<FeedbackOutcome> {
        self.sessions.with_session(session_id, |state| {
            let last = state
                .last_instructions
                .clone()
                .ok_or_else(|| RemixError::NoBaseline {
                    session_id: session_id.to_string(),
                })?;
            let mix_path = session_mix(session_id, state)?;

            let next = match apply_delta(&last, delta) {
                FeedbackResult::Changed(next) => next,
                FeedbackResult::NoChange => {
                    info!("Feedback for session {} changed nothing", session_id);
                    return Ok(FeedbackOutcome::NoChange {
                        message: NO_CHANGE_MESSAGE.to_string(),
                    });
                }
            };

            let summary = describe_changes(&last, &next);
            let outcome = self.render_remix(&mix_path, &next)?;
            state.last_instructions = Some(next);
            state.active_task = Some(SessionTask::Remix);
            Ok(FeedbackOutcome::Remixed { outcome, summary })
        })
    }

    /// Export normalized stems of the session's mix.
    ///
    /// An empty request means every default stem. Unsupported names are
    /// reported and skipped.
    pub fn separate_stems(&self, session_id: &str, stems: &[String]) -> Result<SeparationReport> {
        self.sessions.with_session(session_id, |state| {
            let mix_path = session_mix(session_id, state)?;

            let wanted: Vec<String> = if stems.is_empty() {
                DEFAULT_STEMS.iter().map(|s| s.to_string()).collect()
            } else {
                stems.to_vec()
            };

            let mut report = SeparationReport::default();
            let mut requested = Vec::with_capacity(wanted.len());
            for stem in wanted {
                if self.config.is_known_stem(&stem) {
                    if !requested.contains(&stem) {
                        requested.push(stem);
                    }
                } else {
                    warn!("Ignoring unsupported stem '{}'", stem);
                    report.issues.push(unsupported(stem));
                }
            }

            let separated = self.separate_with_retry(&mix_path, requested, &mut report.issues)?;
            let suffix = random_suffix();
            for (stem, buffer) in separated {
                let file_name = stem_file_name(&mix_path, &stem, &suffix);
                let path = self.write_output(&buffer, &file_name)?;
                report.stems.push(ExportedStem {
                    stem,
                    file_name,
                    path,
                    buffer,
                });
            }

            state.active_task = Some(SessionTask::Separation);
            info!(
                "Separated {} stems for session {}",
                report.stems.len(),
                session_id
            );
            Ok(report)
        })
    }
}

fn session_mix(session_id: &str, state: &SessionState) -> Result<PathBuf> {
    state.mix_path.clone().ok_or_else(|| RemixError::MissingMix {
        session_id: session_id.to_string(),
    })
}

fn unsupported(stem: String) -> RemixIssue {
    RemixIssue::from_error(
        Some(&stem),
        "separation",
        &RemixError::UnsupportedStem { stem: stem.clone() },
    )
}
