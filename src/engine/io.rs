//! Audio file I/O
//!
//! WAV import and export. Imported audio is normalized to the canonical
//! stereo layout at the working sample rate; exports are always stereo
//! WAV at the working rate.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::{AudioBuffer, WORKING_SAMPLE_RATE};
use crate::engine::normalize::ensure_stereo;
use crate::error::{RemixError, Result};

/// Export format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// Bit depth: 16, 24, or 32 (float)
    pub bit_depth: u16,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat { bit_depth: 16 }
    }
}

impl ExportFormat {
    pub fn new(bit_depth: u16) -> Self {
        ExportFormat { bit_depth }
    }
}

/// Import a WAV file as a canonical stereo buffer
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidAudio` - If the file is not a readable WAV file
/// * `ShapeMismatch` - If the audio has more than 2 channels
pub fn import_audio(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(RemixError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let reader = WavReader::open(path).map_err(|e| RemixError::InvalidAudio {
        reason: format!("Failed to open WAV file {}: {}", path.display(), e),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;

    let buffer = AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate)?;
    ensure_stereo(buffer)
}

/// Export a buffer as a stereo WAV file at the working sample rate
pub fn export_audio(buffer: &AudioBuffer, path: &Path, format: ExportFormat) -> Result<()> {
    let file = File::create(path)?;
    write_wav(buffer, BufWriter::new(file), format)
}

/// Write a buffer as stereo WAV at the working sample rate to any seekable sink
pub fn write_wav<W: Write + Seek>(buffer: &AudioBuffer, sink: W, format: ExportFormat) -> Result<()> {
    if !matches!(format.bit_depth, 16 | 24 | 32) {
        return Err(RemixError::UnsupportedFormat {
            format: format!("{}-bit audio (only 16, 24, 32 supported)", format.bit_depth),
        });
    }

    let buffer = if buffer.channels() == 2 && buffer.sample_rate == WORKING_SAMPLE_RATE {
        buffer.clone()
    } else {
        ensure_stereo(buffer.clone())?
    };

    let spec = WavSpec {
        channels: 2,
        sample_rate: WORKING_SAMPLE_RATE,
        bits_per_sample: format.bit_depth,
        sample_format: if format.bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let mut writer = WavWriter::new(sink, spec).map_err(hound_to_io)?;
    let interleaved = buffer.to_interleaved();

    match format.bit_depth {
        16 => {
            for sample in interleaved {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
        }
        24 => {
            for sample in interleaved {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
        }
        _ => {
            for sample in interleaved {
                writer.write_sample(sample).map_err(hound_to_io)?;
            }
        }
    }

    writer.finalize().map_err(hound_to_io)?;
    Ok(())
}

fn hound_to_io(e: hound::Error) -> RemixError {
    match e {
        hound::Error::IoError(io) => RemixError::Io(io),
        other => RemixError::Io(std::io::Error::new(std::io::ErrorKind::Other, other.to_string())),
    }
}

/// Read samples from a WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let invalid = |e: hound::Error| RemixError::InvalidAudio {
        reason: format!("Failed to read {}-bit samples: {}", bits_per_sample, e),
    };

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(invalid),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(invalid),
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8388608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(invalid),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(invalid),
            _ => Err(RemixError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits_per_sample),
            }),
        },
    }
}
