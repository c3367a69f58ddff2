//! Effect stages
//!
//! An [`EffectStage`] is one fallible buffer-to-buffer transform. The
//! reverb, EQ, filter and compression stages are built per request by a
//! [`StageBackend`] and run through [`run_guarded`], which turns any
//! failure into a pass-through of the stage input.

use log::warn;

use crate::dsp::compressor::CompressorParams;
use crate::dsp::filter::FilterPlan;
use crate::dsp::eq::PeakingBand;
use crate::engine::{ensure_stereo, AudioBuffer};
use crate::error::{RemixError, Result};

/// A single buffer-to-buffer processing step
pub trait EffectStage: Send + Sync {
    /// Short stage name used in logs and issue reports
    fn name(&self) -> &'static str;

    /// Process `input` into a new buffer. Must not mutate shared state.
    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer>;
}

/// Builds the guarded stages of the per-stem chain
pub trait StageBackend: Send + Sync {
    fn reverb(&self, intensity: f32) -> Box<dyn EffectStage>;
    fn peaking_eq(&self, band: PeakingBand) -> Box<dyn EffectStage>;
    fn pass_filter(&self, plan: FilterPlan) -> Box<dyn EffectStage>;
    fn compressor(&self, params: CompressorParams) -> Box<dyn EffectStage>;
}

/// A stage failure that was recovered by passing the input through
#[derive(Debug)]
pub struct StageFailure {
    pub stage: &'static str,
    pub error: RemixError,
}

/// Run `stage`, returning its input unchanged if it fails.
///
/// Output containing NaN or infinity counts as a failure. Successful output
/// is brought back to the canonical stereo layout.
pub fn run_guarded(
    stage: &dyn EffectStage,
    input: AudioBuffer,
    failures: &mut Vec<StageFailure>,
) -> AudioBuffer {
    let result = stage.apply(&input).and_then(|output| {
        if !output.is_finite() {
            return Err(RemixError::DspOverflow { stage: stage.name() });
        }
        ensure_stereo(output)
    });

    match result {
        Ok(output) => output,
        Err(error) => {
            warn!("{} stage failed, keeping its input: {}", stage.name(), error);
            failures.push(StageFailure {
                stage: stage.name(),
                error,
            });
            input
        }
    }
}
