//! Remix pipeline
//!
//! Instruction sets in, rendered stereo WAVs out. Untargeted stems pass
//! through the remainder bit for bit; only targeted stems are processed.

mod compositor;
mod engine;
mod instructions;
mod naming;
mod remainder;
mod report;
mod separation;

#[cfg(feature = "async-bridge")]
mod bridge;

#[cfg(feature = "async-bridge")]
pub use bridge::{apply_feedback_with_timeout, render_remix_with_timeout};
pub use compositor::{compose, finish, Composition, RenderStatus};
pub use engine::RemixEngine;
pub use instructions::{
    CompressionLevel, EqSettings, FilterSettings, InstructionSet, StemInstructions,
    DEFAULT_PITCH, DEFAULT_REVERB, DEFAULT_VOLUME, REVERB_RANGE, VOLUME_RANGE,
};
pub use naming::{file_name_with_suffix, output_file_name, output_tags, stem_file_name};
pub use remainder::{common_length, reconstruct_remainder};
pub use report::{
    ExportedStem, FeedbackOutcome, RemixArtifact, RemixIssue, RenderOutcome, SeparationReport,
};
#[cfg(feature = "http-separator")]
pub use separation::HttpSeparator;
pub use separation::{Separator, StemDirectorySeparator};
