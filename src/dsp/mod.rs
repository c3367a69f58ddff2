//! DSP stages
//!
//! The per-stem effect chain and the stage implementations behind it.
//! Reverb, EQ, filter and compression come from a [`StageBackend`]: either
//! in-process ([`NativeBackend`]) or through `sox` ([`SoxBackend`]).

mod biquad;
mod chain;
mod compressor;
mod eq;
mod external;
mod filter;
mod gain;
mod pitch;
mod reverb;
mod stage;

use std::sync::Arc;

pub use biquad::{BiquadCoeffs, BiquadKind};
pub use chain::{ChainOutput, StemChain};
pub use compressor::{Compressor, CompressorParams};
pub use eq::{PeakingBand, PeakingEq};
pub use external::{sweep_stale_scratch, ScratchFile, SoxBackend, SoxRunner, SCRATCH_PREFIX};
pub use filter::{FilterPlan, PassFilter};
pub use gain::Gain;
pub use pitch::{PitchShifter, MAX_SEMITONES};
pub use reverb::{EchoParams, EchoReverb};
pub use stage::{run_guarded, EffectStage, StageBackend, StageFailure};

use crate::config::{EngineConfig, StageBackendKind};

/// In-process implementations of every guarded stage
#[derive(Debug, Clone, Copy)]
pub struct NativeBackend {
    sample_rate: u32,
}

impl NativeBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl StageBackend for NativeBackend {
    fn reverb(&self, intensity: f32) -> Box<dyn EffectStage> {
        Box::new(EchoReverb::new(intensity, self.sample_rate))
    }

    fn peaking_eq(&self, band: PeakingBand) -> Box<dyn EffectStage> {
        Box::new(PeakingEq::new(band, self.sample_rate))
    }

    fn pass_filter(&self, plan: FilterPlan) -> Box<dyn EffectStage> {
        Box::new(PassFilter::new(plan, self.sample_rate))
    }

    fn compressor(&self, params: CompressorParams) -> Box<dyn EffectStage> {
        Box::new(Compressor::new(params, self.sample_rate))
    }
}

/// Backend selected by the configuration
pub fn backend_for(config: &EngineConfig) -> Arc<dyn StageBackend> {
    match config.stage_backend {
        StageBackendKind::Native => Arc::new(NativeBackend::new(config.sample_rate)),
        StageBackendKind::Sox => Arc::new(SoxBackend::new(SoxRunner::from_config(config))),
    }
}
