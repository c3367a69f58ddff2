//! Echo/decay reverb
//!
//! Intensity in [0, 1] maps to a feedback comb whose delay time and decay
//! both grow with intensity. The output has the same length as the input;
//! the tail past the end of the buffer is discarded.

use crate::dsp::stage::EffectStage;
use crate::engine::AudioBuffer;
use crate::error::Result;

// ============================================================================
// Intensity Mapping
// ============================================================================

/// Delay at the lowest non-zero intensity
const MIN_DELAY_MS: f32 = 40.0;

/// Additional delay at full intensity
const DELAY_SPAN_MS: f32 = 60.0;

/// Feedback at the lowest non-zero intensity
const MIN_DECAY: f32 = 0.2;

/// Additional feedback at full intensity
const DECAY_SPAN: f32 = 0.5;

/// Echo parameters derived from a reverb intensity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoParams {
    pub delay_ms: f32,
    pub decay: f32,
}

impl EchoParams {
    /// Map an intensity to echo parameters; out-of-range input is clamped
    pub fn from_intensity(intensity: f32) -> Self {
        let r = if intensity.is_finite() {
            intensity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            delay_ms: MIN_DELAY_MS + DELAY_SPAN_MS * r,
            decay: MIN_DECAY + DECAY_SPAN * r,
        }
    }

    fn delay_samples(&self, sample_rate: u32) -> usize {
        ((self.delay_ms / 1000.0) * sample_rate as f32).round().max(1.0) as usize
    }
}

// ============================================================================
// Echo Reverb
// ============================================================================

/// In-process echo reverb: y[n] = x[n] + decay * y[n - delay]
#[derive(Debug, Clone)]
pub struct EchoReverb {
    params: EchoParams,
    sample_rate: u32,
}

impl EchoReverb {
    pub fn new(intensity: f32, sample_rate: u32) -> Self {
        Self {
            params: EchoParams::from_intensity(intensity),
            sample_rate,
        }
    }

    pub fn params(&self) -> EchoParams {
        self.params
    }
}

impl EffectStage for EchoReverb {
    fn name(&self) -> &'static str {
        "reverb"
    }

    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let delay = self.params.delay_samples(self.sample_rate);
        let decay = self.params.decay;
        let mut output = input.clone();

        for channel in output.samples.iter_mut() {
            for n in delay..channel.len() {
                channel[n] += decay * channel[n - delay];
            }
        }

        Ok(output)
    }
}
