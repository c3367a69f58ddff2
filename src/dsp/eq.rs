//! Peaking equalizer stage
//!
//! One constant-Q bell boost/cut at a center frequency.

use serde::{Deserialize, Serialize};

use crate::dsp::biquad::{filter_in_place, BiquadCoeffs, BiquadKind};
use crate::dsp::stage::EffectStage;
use crate::engine::AudioBuffer;
use crate::error::{RemixError, Result};

/// Fully specified peaking band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakingBand {
    /// Center frequency in Hz
    pub frequency: f32,
    /// Width as Q (0.1 to 10.0 after clamping)
    pub q: f32,
    pub gain_db: f32,
}

impl PeakingBand {
    pub fn validate(&self) -> Result<()> {
        for (param, value) in [
            ("frequency", self.frequency),
            ("width", self.q),
            ("gain_db", self.gain_db),
        ] {
            if !value.is_finite() {
                return Err(RemixError::InvalidParameter {
                    param: param.to_string(),
                    value: value.to_string(),
                    expected: "a finite number".to_string(),
                });
            }
        }
        if self.frequency <= 0.0 || self.q <= 0.0 {
            return Err(RemixError::InvalidParameter {
                param: "frequency/width".to_string(),
                value: format!("{}/{}", self.frequency, self.q),
                expected: "positive values".to_string(),
            });
        }
        Ok(())
    }
}

/// In-process peaking EQ
#[derive(Debug, Clone)]
pub struct PeakingEq {
    band: PeakingBand,
    sample_rate: u32,
}

impl PeakingEq {
    pub fn new(band: PeakingBand, sample_rate: u32) -> Self {
        Self { band, sample_rate }
    }
}

impl EffectStage for PeakingEq {
    fn name(&self) -> &'static str {
        "eq"
    }

    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        self.band.validate()?;
        let coeffs = BiquadCoeffs::calculate(
            BiquadKind::Peak,
            self.sample_rate as f64,
            self.band.frequency as f64,
            self.band.gain_db as f64,
            self.band.q as f64,
        );
        let mut output = input.clone();
        filter_in_place(&mut output, &coeffs);
        Ok(output)
    }
}
