//! Audio Buffer Management
//!
//! Provides the core audio buffer type shared by every stage of the remix
//! pipeline. All arithmetic happens on canonical stereo buffers at the
//! working sample rate.

use crate::error::{RemixError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Working sample rate for all processing and output (44.1kHz)
pub const WORKING_SAMPLE_RATE: u32 = 44100;

/// Canonical channel count for every buffer that takes part in arithmetic
pub const CANONICAL_CHANNELS: usize = 2;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Non-interleaved 32-bit float audio.
///
/// Each channel is a separate `Vec<f32>`; all channels have the same length.
///
/// # Example
/// ```
/// use stemcraft::engine::{AudioBuffer, ChannelLayout};
///
/// let buffer = AudioBuffer::new(44100, ChannelLayout::Stereo);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 44100);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer with the specified number of samples and layout
    pub fn new(num_samples: usize, layout: ChannelLayout) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; layout.num_channels()],
            sample_rate: WORKING_SAMPLE_RATE,
        }
    }

    /// Create a stereo buffer where every sample holds `value`
    pub fn filled(num_samples: usize, value: f32) -> Self {
        Self {
            samples: vec![vec![value; num_samples]; CANONICAL_CHANNELS],
            sample_rate: WORKING_SAMPLE_RATE,
        }
    }

    /// Build a buffer from per-channel sample vectors
    ///
    /// All channels must have the same length.
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if let Some(first) = samples.first() {
            let expected = first.len();
            if let Some(bad) = samples.iter().position(|ch| ch.len() != expected) {
                return Err(RemixError::ShapeMismatch {
                    reason: format!(
                        "channel {} has {} samples, channel 0 has {}",
                        bad,
                        samples[bad].len(),
                        expected
                    ),
                });
            }
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create an audio buffer from interleaved sample data
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(RemixError::ShapeMismatch {
                reason: "interleaved data with zero channels".to_string(),
            });
        }
        if interleaved.len() % channels != 0 {
            return Err(RemixError::ShapeMismatch {
                reason: format!(
                    "interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    channels
                ),
            });
        }

        let frames = interleaved.len() / channels;
        let mut samples = vec![Vec::with_capacity(frames); channels];
        for frame in interleaved.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format (L, R, L, R, ...)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let num_channels = self.channels();
        let num_samples = self.len();
        let mut interleaved = Vec::with_capacity(num_channels * num_samples);
        for i in 0..num_samples {
            for channel in &self.samples {
                interleaved.push(channel[i]);
            }
        }
        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer holds no samples
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get the channel layout, if it is one we know
    pub fn channel_layout(&self) -> Option<ChannelLayout> {
        ChannelLayout::from_count(self.channels())
    }

    /// Immutable access to one channel
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Shorten every channel to at most `len` samples
    pub fn truncate(&mut self, len: usize) {
        for channel in &mut self.samples {
            channel.truncate(len);
        }
    }

    /// Copy of the first `len` samples of every channel
    pub fn truncated(&self, len: usize) -> Self {
        Self {
            samples: self
                .samples
                .iter()
                .map(|ch| ch[..len.min(ch.len())].to_vec())
                .collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Add `other` sample-by-sample over the overlapping length
    pub fn add_assign(&mut self, other: &AudioBuffer) {
        for (dst, src) in self.samples.iter_mut().zip(&other.samples) {
            for (d, s) in dst.iter_mut().zip(src) {
                *d += *s;
            }
        }
    }

    /// Subtract `other` sample-by-sample over the overlapping length
    pub fn sub_assign(&mut self, other: &AudioBuffer) {
        for (dst, src) in self.samples.iter_mut().zip(&other.samples) {
            for (d, s) in dst.iter_mut().zip(src) {
                *d -= *s;
            }
        }
    }

    /// Multiply every sample by a linear factor
    pub fn scale(&mut self, factor: f32) {
        for channel in &mut self.samples {
            for sample in channel.iter_mut() {
                *sample *= factor;
            }
        }
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }

    /// Clamp all samples to the valid range [-1.0, 1.0]
    pub fn clamp(&mut self) {
        for channel in &mut self.samples {
            for sample in channel.iter_mut() {
                *sample = sample.clamp(-1.0, 1.0);
            }
        }
    }

    /// Largest absolute sample value (linear)
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|s| s.abs())
            .fold(0.0_f32, f32::max)
    }

    /// RMS level across all channels (linear)
    pub fn rms(&self) -> f32 {
        let total = self.channels() * self.len();
        if total == 0 {
            return 0.0;
        }
        let sum_squares: f64 = self
            .samples
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        (sum_squares / total as f64).sqrt() as f32
    }

    /// RMS level across all channels in dB
    pub fn rms_db(&self) -> f32 {
        linear_to_db(self.rms())
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new(0, ChannelLayout::Stereo)
    }
}

// ============================================================================
// Tests
// ============================================================================
