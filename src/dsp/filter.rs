//! Pass filters
//!
//! Low-pass, high-pass, and band-pass built as a high-pass at the lower
//! cutoff followed by a low-pass at the upper cutoff.

use crate::dsp::biquad::{filter_in_place, BiquadCoeffs, BiquadKind, BUTTERWORTH_Q};
use crate::dsp::stage::EffectStage;
use crate::engine::AudioBuffer;
use crate::error::{RemixError, Result};

/// Fully specified filter with every cutoff resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterPlan {
    Lowpass { cutoff: f32 },
    Highpass { cutoff: f32 },
    Bandpass { low_cutoff: f32, high_cutoff: f32 },
}

impl FilterPlan {
    /// Biquad sections in application order
    pub fn sections(&self) -> Vec<(BiquadKind, f32)> {
        match *self {
            FilterPlan::Lowpass { cutoff } => vec![(BiquadKind::LowPass, cutoff)],
            FilterPlan::Highpass { cutoff } => vec![(BiquadKind::HighPass, cutoff)],
            FilterPlan::Bandpass {
                low_cutoff,
                high_cutoff,
            } => vec![
                (BiquadKind::HighPass, low_cutoff),
                (BiquadKind::LowPass, high_cutoff),
            ],
        }
    }
}

/// In-process Butterworth-style pass filter
#[derive(Debug, Clone)]
pub struct PassFilter {
    plan: FilterPlan,
    sample_rate: u32,
}

impl PassFilter {
    pub fn new(plan: FilterPlan, sample_rate: u32) -> Self {
        Self { plan, sample_rate }
    }
}

impl EffectStage for PassFilter {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let mut output = input.clone();
        for (kind, cutoff) in self.plan.sections() {
            if !cutoff.is_finite() || cutoff <= 0.0 {
                return Err(RemixError::InvalidParameter {
                    param: "cutoff".to_string(),
                    value: cutoff.to_string(),
                    expected: "a positive frequency in Hz".to_string(),
                });
            }
            let coeffs =
                BiquadCoeffs::calculate(kind, self.sample_rate as f64, cutoff as f64, 0.0, BUTTERWORTH_Q);
            filter_in_place(&mut output, &coeffs);
        }
        Ok(output)
    }
}
