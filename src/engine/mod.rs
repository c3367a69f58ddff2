//! Audio Engine Module
//!
//! Core audio plumbing shared by the remix pipeline:
//! - Audio buffer type
//! - Waveform normalization to canonical stereo
//! - WAV file I/O

pub mod buffer;
pub mod io;
pub mod normalize;

pub use buffer::{
    db_to_linear, linear_to_db, AudioBuffer, ChannelLayout, CANONICAL_CHANNELS,
    WORKING_SAMPLE_RATE,
};
pub use io::{export_audio, import_audio, write_wav, ExportFormat};
pub use normalize::{ensure_stereo, normalize, RawWaveform};
