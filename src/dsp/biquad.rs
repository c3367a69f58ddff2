//! Biquad filter primitives
//!
//! RBJ Audio EQ Cookbook coefficients shared by the peaking EQ and the
//! low/high-pass filter stages.

use std::f64::consts::PI;

use crate::engine::AudioBuffer;

/// Q giving a maximally flat (Butterworth) pass band
pub const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Response shape of a biquad section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiquadKind {
    /// Bell curve boost/cut
    Peak,
    /// Remove above frequency
    LowPass,
    /// Remove below frequency
    HighPass,
}

/// Biquad filter coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (a0 + a1*z^-1 + a2*z^-2)
/// Normalized: all coefficients divided by a0
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// Calculate biquad coefficients using Audio EQ Cookbook formulas
    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    pub fn calculate(kind: BiquadKind, sample_rate: f64, frequency: f64, gain_db: f64, q: f64) -> Self {
        // Clamp frequency to valid range (below Nyquist)
        let freq = frequency.clamp(20.0, sample_rate / 2.0 - 1.0);
        let q = q.clamp(0.1, 10.0);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);

        let (b0, b1, b2, a0, a1, a2) = match kind {
            BiquadKind::Peak => {
                let a = 10.0_f64.powf(gain_db / 40.0);
                (
                    1.0 + alpha * a,
                    -2.0 * cos_w0,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_w0,
                    1.0 - alpha / a,
                )
            }
            BiquadKind::LowPass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            BiquadKind::HighPass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
        };

        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Unity gain, no filtering: numerator and denominator cancel
    pub fn is_bypass(&self) -> bool {
        (self.b0 - 1.0).abs() < 1e-10
            && (self.b1 - self.a1).abs() < 1e-10
            && (self.b2 - self.a2).abs() < 1e-10
    }
}

/// Filter state for one channel
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    /// Direct Form I
    fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// Run one biquad section over every channel of `buffer` in place.
///
/// Each channel starts from silent state.
pub fn filter_in_place(buffer: &mut AudioBuffer, coeffs: &BiquadCoeffs) {
    if coeffs.is_bypass() {
        return;
    }
    for channel in buffer.samples.iter_mut() {
        let mut state = BiquadState::default();
        for sample in channel.iter_mut() {
            *sample = state.process(*sample as f64, coeffs) as f32;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Stereo sine at the working rate
    pub(crate) fn sine_buffer(frequency: f64, duration_secs: f64) -> AudioBuffer {
        let sample_rate = 44100.0;
        let num_samples = (sample_rate * duration_secs) as usize;
        let mut buffer = AudioBuffer::filled(num_samples, 0.0);
        for channel in buffer.samples.iter_mut() {
            for (i, sample) in channel.iter_mut().enumerate() {
                let t = i as f64 / sample_rate;
                *sample = (0.5 * (2.0 * PI * frequency * t).sin()) as f32;
            }
        }
        buffer
    }

    #[test]
    fn test_zero_gain_peak_is_bypass() {
        let coeffs = BiquadCoeffs::calculate(BiquadKind::Peak, 44100.0, 1000.0, 0.0, 1.0);
        assert!(coeffs.is_bypass());

        let boost = BiquadCoeffs::calculate(BiquadKind::Peak, 44100.0, 1000.0, 6.0, 1.0);
        assert!(!boost.is_bypass());
        let lowpass = BiquadCoeffs::calculate(BiquadKind::LowPass, 44100.0, 1000.0, 0.0, BUTTERWORTH_Q);
        assert!(!lowpass.is_bypass());
    }

    #[test]
    fn test_frequency_clamped_below_nyquist() {
        let clamped = BiquadCoeffs::calculate(BiquadKind::LowPass, 44100.0, 90000.0, 0.0, 0.7);
        let edge = BiquadCoeffs::calculate(BiquadKind::LowPass, 44100.0, 22049.0, 0.0, 0.7);
        assert_eq!(clamped, edge);
    }

    #[test]
    fn test_filter_keeps_length_and_channels() {
        let mut buffer = sine_buffer(440.0, 0.05);
        let len = buffer.len();
        let coeffs = BiquadCoeffs::calculate(BiquadKind::HighPass, 44100.0, 200.0, 0.0, BUTTERWORTH_Q);
        filter_in_place(&mut buffer, &coeffs);
        assert_eq!(buffer.len(), len);
        assert_eq!(buffer.channels(), 2);
        assert!(buffer.is_finite());
    }
}
