//! Waveform normalization
//!
//! Every buffer entering the remix pipeline (the mix, separated stems and
//! the output of subprocess stages) passes through here and comes out as
//! a 2×N buffer at the working sample rate.

use serde::{Deserialize, Serialize};

use crate::engine::buffer::{AudioBuffer, CANONICAL_CHANNELS, WORKING_SAMPLE_RATE};
use crate::error::{RemixError, Result};

/// A waveform of arbitrary rank as handed over by a collaborator.
///
/// `data` is row-major over `shape`. Accepted shapes are `[N]`, `[C, N]`
/// and `[B, C, N]` with `B == 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWaveform {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_sample_rate() -> u32 {
    WORKING_SAMPLE_RATE
}

impl RawWaveform {
    /// Wrap a channel-major buffer as a rank-2 waveform
    pub fn from_buffer(buffer: &AudioBuffer) -> Self {
        Self {
            shape: vec![buffer.channels(), buffer.len()],
            data: buffer.samples.iter().flatten().copied().collect(),
            sample_rate: buffer.sample_rate,
        }
    }

    /// Wrap a buffer with a leading batch dimension of one
    pub fn batched(buffer: &AudioBuffer) -> Self {
        let mut raw = Self::from_buffer(buffer);
        raw.shape.insert(0, 1);
        raw
    }
}

/// Coerce a raw waveform into a canonical stereo buffer.
///
/// A single batch dimension is squeezed away; a mono channel is duplicated;
/// any other channel count is a [`RemixError::ShapeMismatch`]. The result is
/// resampled to the working rate when needed.
pub fn normalize(raw: RawWaveform) -> Result<AudioBuffer> {
    let expected: usize = raw.shape.iter().product();
    if expected != raw.data.len() {
        return Err(RemixError::ShapeMismatch {
            reason: format!(
                "shape {:?} describes {} samples, got {}",
                raw.shape,
                expected,
                raw.data.len()
            ),
        });
    }

    let (channels, frames) = match raw.shape.as_slice() {
        [n] => (1, *n),
        [c, n] => (*c, *n),
        [1, c, n] => (*c, *n),
        [b, _, _] => {
            return Err(RemixError::ShapeMismatch {
                reason: format!("batch of {} waveforms, expected exactly one", b),
            })
        }
        other => {
            return Err(RemixError::ShapeMismatch {
                reason: format!("unsupported waveform rank {}", other.len()),
            })
        }
    };

    let samples: Vec<Vec<f32>> = if frames == 0 {
        vec![Vec::new(); channels]
    } else {
        raw.data.chunks_exact(frames).map(|ch| ch.to_vec()).collect()
    };
    let buffer = AudioBuffer::from_channels(samples, raw.sample_rate)?;
    ensure_stereo(buffer)
}

/// Bring an already channel-major buffer to 2 channels at the working rate.
pub fn ensure_stereo(mut buffer: AudioBuffer) -> Result<AudioBuffer> {
    match buffer.channels() {
        1 => {
            let mono = buffer.samples[0].clone();
            buffer.samples.push(mono);
        }
        CANONICAL_CHANNELS => {}
        n => {
            return Err(RemixError::ShapeMismatch {
                reason: format!("{}-channel audio (only mono/stereo supported)", n),
            })
        }
    }

    if buffer.sample_rate != WORKING_SAMPLE_RATE && buffer.sample_rate > 0 {
        buffer.samples = resample_channels(&buffer.samples, buffer.sample_rate, WORKING_SAMPLE_RATE);
        buffer.sample_rate = WORKING_SAMPLE_RATE;
    }

    Ok(buffer)
}

/// Resample all channels with linear interpolation
pub(crate) fn resample_channels(channels: &[Vec<f32>], from_rate: u32, to_rate: u32) -> Vec<Vec<f32>> {
    channels
        .iter()
        .map(|ch| resample_linear(ch, from_rate, to_rate))
        .collect()
}

fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(last)];
            let b = samples[(idx + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(shape: Vec<usize>, data: Vec<f32>) -> RawWaveform {
        RawWaveform {
            shape,
            data,
            sample_rate: WORKING_SAMPLE_RATE,
        }
    }

    #[test]
    fn test_mono_is_duplicated() {
        let buffer = normalize(raw(vec![1, 4], vec![0.1, 0.2, 0.3, 0.4])).unwrap();
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.samples[0], buffer.samples[1]);
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_rank_one_is_mono() {
        let buffer = normalize(raw(vec![3], vec![0.1, 0.2, 0.3])).unwrap();
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.samples[1], vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_stereo_passes_through() {
        let buffer = normalize(raw(vec![2, 2], vec![0.1, 0.2, -0.1, -0.2])).unwrap();
        assert_eq!(buffer.samples[0], vec![0.1, 0.2]);
        assert_eq!(buffer.samples[1], vec![-0.1, -0.2]);
    }

    #[test]
    fn test_single_batch_is_squeezed() {
        let buffer = normalize(raw(vec![1, 2, 2], vec![0.1, 0.2, 0.3, 0.4])).unwrap();
        assert_eq!(buffer.samples[1], vec![0.3, 0.4]);
    }

    #[test]
    fn test_multi_batch_is_rejected() {
        let result = normalize(raw(vec![2, 2, 1], vec![0.1, 0.2, 0.3, 0.4]));
        assert!(matches!(result, Err(RemixError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_surround_is_rejected() {
        let result = normalize(raw(vec![6, 1], vec![0.0; 6]));
        assert!(matches!(result, Err(RemixError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_shape_data_disagreement() {
        let result = normalize(raw(vec![2, 4], vec![0.0; 6]));
        assert!(matches!(result, Err(RemixError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_resampled_to_working_rate() {
        let input = RawWaveform {
            shape: vec![2, 22050],
            data: vec![0.25; 44100],
            sample_rate: 22050,
        };
        let buffer = normalize(input).unwrap();
        assert_eq!(buffer.sample_rate, WORKING_SAMPLE_RATE);
        assert_eq!(buffer.len(), 44100);
        assert!((buffer.samples[0][1000] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_buffer_roundtrip_through_raw() {
        let original = AudioBuffer::filled(16, 0.5);
        let buffer = normalize(RawWaveform::batched(&original)).unwrap();
        assert_eq!(buffer, original);
    }
}
