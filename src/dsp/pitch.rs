//! Pitch shifting
//!
//! Length-preserving delay-line shifter: two read taps sweep a short
//! modulated delay half a window apart and are crossfaded with triangular
//! weights that always sum to one. The read position advances at
//! `2^(semitones / 12)` samples per input sample.
//!
//! Unlike the guarded stages, a pitch-shift failure is reported to the
//! caller and the stem is dropped from the mix.

use crate::dsp::stage::EffectStage;
use crate::engine::AudioBuffer;
use crate::error::{RemixError, Result};

/// Largest supported shift in either direction
pub const MAX_SEMITONES: i32 = 24;

/// Crossfade window length
const WINDOW_MS: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchShifter {
    semitones: i32,
    sample_rate: u32,
}

impl PitchShifter {
    pub fn new(semitones: i32, sample_rate: u32) -> Self {
        Self {
            semitones,
            sample_rate,
        }
    }

    /// Playback-rate ratio for the configured shift
    pub fn ratio(&self) -> f64 {
        2.0_f64.powf(self.semitones as f64 / 12.0)
    }

    fn shift_channel(&self, input: &[f32], window: f64) -> Vec<f32> {
        let step = (1.0 - self.ratio()) / window;
        let mut phase = 0.0_f64;
        let mut output = Vec::with_capacity(input.len());

        for n in 0..input.len() {
            let phase_b = (phase + 0.5).rem_euclid(1.0);
            let tap_a = read_delayed(input, n, phase * window);
            let tap_b = read_delayed(input, n, phase_b * window);
            let weight_a = triangle(phase);
            let weight_b = triangle(phase_b);

            output.push((tap_a * weight_a + tap_b * weight_b) as f32);
            phase = (phase + step).rem_euclid(1.0);
        }

        output
    }
}

/// Triangular window over one phase cycle, peaking at 0.5
fn triangle(phase: f64) -> f64 {
    1.0 - (2.0 * phase - 1.0).abs()
}

/// Linear-interpolated read `delay` samples behind `n`; silence before the start
fn read_delayed(input: &[f32], n: usize, delay: f64) -> f64 {
    let pos = n as f64 - delay;
    if pos < 0.0 {
        return 0.0;
    }
    let idx = pos.floor() as usize;
    let frac = pos - idx as f64;
    let a = input.get(idx).copied().unwrap_or(0.0) as f64;
    let b = input.get(idx + 1).copied().unwrap_or(a as f32) as f64;
    // Never read ahead of the write position
    if idx + 1 > n {
        return a;
    }
    a + (b - a) * frac
}

impl EffectStage for PitchShifter {
    fn name(&self) -> &'static str {
        "pitch"
    }

    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        if self.semitones.unsigned_abs() > MAX_SEMITONES.unsigned_abs() {
            return Err(RemixError::PitchShift {
                reason: format!(
                    "{} semitones is outside ±{}",
                    self.semitones, MAX_SEMITONES
                ),
            });
        }
        if self.semitones == 0 {
            return Ok(input.clone());
        }

        let window = (WINDOW_MS / 1000.0 * self.sample_rate as f32) as f64;
        if window < 2.0 {
            return Err(RemixError::PitchShift {
                reason: format!("sample rate {} too low for shifting", self.sample_rate),
            });
        }

        let samples: Vec<Vec<f32>> = input
            .samples
            .iter()
            .map(|ch| self.shift_channel(ch, window))
            .collect();
        let output = AudioBuffer::from_channels(samples, input.sample_rate)?;

        if !output.is_finite() {
            return Err(RemixError::PitchShift {
                reason: "shifted audio contains NaN or infinite samples".to_string(),
            });
        }
        Ok(output)
    }
}
