//! Sessions
//!
//! Instruction state per session, the feedback diff applied against it,
//! and the stores and locks that keep it consistent.

mod describe;
mod feedback;
mod registry;
mod state;
mod store;

pub use describe::describe_changes;
pub use feedback::{
    apply_delta, CompressionChange, FeedbackDelta, FeedbackResult, PitchChange, ReverbChange,
    VolumeChange,
};
pub use registry::SessionRegistry;
pub use state::{SessionState, SessionTask};
pub use store::{JsonFileStore, MemoryStore, SessionStore};
