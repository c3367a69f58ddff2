//! Per-stem effect chain
//!
//! Applies gain → reverb → pitch shift → EQ → filter → compression to one
//! stem. Stages whose parameters are at their defaults are skipped
//! entirely. Reverb, EQ, filter and compression failures are recovered by
//! passing their input through; a pitch-shift failure drops the stem.

use std::sync::Arc;

use log::{debug, warn};

use crate::dsp::gain::{Gain, UNITY_VOLUME};
use crate::dsp::pitch::PitchShifter;
use crate::dsp::stage::{run_guarded, EffectStage, StageBackend, StageFailure};
use crate::engine::AudioBuffer;
use crate::error::Result;
use crate::remix::StemInstructions;

/// Processed stem plus the stages that fell back to pass-through
#[derive(Debug)]
pub struct ChainOutput {
    pub buffer: AudioBuffer,
    pub failures: Vec<StageFailure>,
}

/// Runs the canonical chain; holds no per-stem state and can be shared
/// across worker threads.
#[derive(Clone)]
pub struct StemChain {
    backend: Arc<dyn StageBackend>,
    sample_rate: u32,
}

impl StemChain {
    pub fn new(backend: Arc<dyn StageBackend>, sample_rate: u32) -> Self {
        Self {
            backend,
            sample_rate,
        }
    }

    /// Process one stem.
    ///
    /// # Errors
    /// Only a failed pitch shift is returned as an error.
    pub fn run(&self, stem: &str, input: AudioBuffer, params: &StemInstructions) -> Result<ChainOutput> {
        let mut failures = Vec::new();
        let mut buffer = input;

        if params.volume != UNITY_VOLUME {
            buffer = Gain::new(params.volume).apply(&buffer)?;
        }

        if params.reverb > 0.0 {
            let stage = self.backend.reverb(params.reverb);
            buffer = run_guarded(stage.as_ref(), buffer, &mut failures);
        } else {
            debug!("{}: reverb skipped", stem);
        }

        if params.pitch_semitones != 0 {
            buffer = PitchShifter::new(params.pitch_semitones, self.sample_rate).apply(&buffer)?;
        }

        if let Some(eq) = &params.eq {
            match eq.resolve(stem) {
                Ok(band) => {
                    let stage = self.backend.peaking_eq(band);
                    buffer = run_guarded(stage.as_ref(), buffer, &mut failures);
                }
                Err(error) => {
                    warn!("{}: eq skipped: {}", stem, error);
                    failures.push(StageFailure { stage: "eq", error });
                }
            }
        }

        if let Some(filter) = &params.filter {
            match filter.resolve(stem) {
                Ok(plan) => {
                    let stage = self.backend.pass_filter(plan);
                    buffer = run_guarded(stage.as_ref(), buffer, &mut failures);
                }
                Err(error) => {
                    warn!("{}: filter skipped: {}", stem, error);
                    failures.push(StageFailure {
                        stage: "filter",
                        error,
                    });
                }
            }
        }

        if let Some(level) = params.compression {
            let stage = self.backend.compressor(level.params());
            buffer = run_guarded(stage.as_ref(), buffer, &mut failures);
        }

        Ok(ChainOutput { buffer, failures })
    }
}
