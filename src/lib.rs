//! Stemcraft - stem-aware remix engine
//!
//! Stemcraft re-renders a stereo mix with per-stem edits (volume, reverb,
//! pitch, EQ, filtering, compression) while leaving every untouched part of
//! the mix exactly as it was.
//!
//! # Architecture
//!
//! - The mix is separated into the targeted stems only
//! - Remainder: the mix minus the unprocessed targets, carried through as is
//! - Each target runs its own effect chain, in parallel
//! - The compositor sums remainder and processed stems, adds the optional
//!   global reverb and clips
//!
//! Sessions keep the last applied instruction set so qualitative feedback
//! ("louder", "more reverb") can be turned into a new render.

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod remix;
pub mod session;

pub use config::EngineConfig;
pub use engine::{AudioBuffer, RawWaveform};
pub use error::{RemixError, Result};
pub use remix::{
    FeedbackOutcome, InstructionSet, RemixArtifact, RemixEngine, RemixIssue, RenderOutcome,
    RenderStatus, Separator,
};
pub use session::{FeedbackDelta, SessionStore};
