//! Compressor stage
//!
//! Feed-forward, stereo-linked, hard-knee compressor with peak detection
//! and one-pole attack/release smoothing of the gain reduction.

use serde::{Deserialize, Serialize};

use crate::dsp::stage::EffectStage;
use crate::engine::{db_to_linear, linear_to_db, AudioBuffer};
use crate::error::Result;

const DEFAULT_ATTACK_MS: f32 = 10.0;
const DEFAULT_RELEASE_MS: f32 = 100.0;

/// Compressor parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorParams {
    /// Threshold level in dB (-60 to 0 dB)
    pub threshold_db: f32,
    /// Compression ratio (1.0 to 20.0, representing 1:1 to 20:1)
    pub ratio: f32,
    /// Attack time in milliseconds (0.1 to 100 ms)
    pub attack_ms: f32,
    /// Release time in milliseconds (10 to 1000 ms)
    pub release_ms: f32,
}

impl CompressorParams {
    /// Threshold and ratio with the default attack and release times
    pub fn new(threshold_db: f32, ratio: f32) -> Self {
        let mut params = Self {
            threshold_db,
            ratio,
            attack_ms: DEFAULT_ATTACK_MS,
            release_ms: DEFAULT_RELEASE_MS,
        };
        params.clamp();
        params
    }

    /// Clamp parameters to valid ranges
    pub fn clamp(&mut self) {
        self.threshold_db = self.threshold_db.clamp(-60.0, 0.0);
        self.ratio = self.ratio.clamp(1.0, 20.0);
        self.attack_ms = self.attack_ms.clamp(0.1, 100.0);
        self.release_ms = self.release_ms.clamp(10.0, 1000.0);
    }

    /// Output level at 0 dBFS input, used by the subprocess transfer curve
    pub fn output_at_full_scale_db(&self) -> f32 {
        self.threshold_db * (1.0 - 1.0 / self.ratio)
    }
}

/// In-process compressor
#[derive(Debug, Clone)]
pub struct Compressor {
    params: CompressorParams,
    attack_coeff: f32,
    release_coeff: f32,
}

impl Compressor {
    pub fn new(params: CompressorParams, sample_rate: u32) -> Self {
        let (attack_coeff, release_coeff) = smoothing_coefficients(&params, sample_rate as f32);
        Self {
            params,
            attack_coeff,
            release_coeff,
        }
    }

    pub fn params(&self) -> &CompressorParams {
        &self.params
    }

    /// Gain reduction in dB (zero or negative) for an input level in dB
    fn compute_gain_reduction_db(&self, input_db: f32) -> f32 {
        let threshold = self.params.threshold_db;
        if input_db <= threshold {
            0.0
        } else {
            // output = threshold + (input - threshold) / ratio
            (threshold + (input_db - threshold) / self.params.ratio) - input_db
        }
    }
}

/// One-pole coefficients: coeff = exp(-1 / time_in_samples)
fn smoothing_coefficients(params: &CompressorParams, sample_rate: f32) -> (f32, f32) {
    let coeff = |ms: f32| {
        let samples = ms / 1000.0 * sample_rate;
        if samples > 0.0 {
            (-1.0 / samples).exp()
        } else {
            0.0
        }
    };
    (coeff(params.attack_ms), coeff(params.release_ms))
}

impl EffectStage for Compressor {
    fn name(&self) -> &'static str {
        "compression"
    }

    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let mut output = input.clone();
        let num_channels = output.channels();
        let mut current_gr = 1.0_f32;

        for frame in 0..output.len() {
            // Linked detection: loudest channel drives both
            let level = output
                .samples
                .iter()
                .map(|ch| ch[frame].abs())
                .fold(0.0_f32, f32::max);

            let target_gr = db_to_linear(self.compute_gain_reduction_db(linear_to_db(level)));

            current_gr = if target_gr < current_gr {
                self.attack_coeff * current_gr + (1.0 - self.attack_coeff) * target_gr
            } else {
                self.release_coeff * current_gr + (1.0 - self.release_coeff) * target_gr
            };

            for ch in 0..num_channels {
                output.samples[ch][frame] *= current_gr;
            }
        }

        Ok(output)
    }
}
