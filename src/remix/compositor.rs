//! Mix compositor
//!
//! Sums the remainder with every processed stem, applies the optional
//! global reverb to the whole sum and clips the result.

use serde::{Deserialize, Serialize};

use crate::dsp::{run_guarded, StageBackend, StageFailure};
use crate::engine::AudioBuffer;
use crate::remix::remainder::common_length;

/// Whether any edit made it into the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    Applied,
    /// Every targeted stem failed; the output is the original mix
    NoEditsApplied,
}

#[derive(Debug)]
pub struct Composition {
    pub buffer: AudioBuffer,
    pub status: RenderStatus,
    pub failures: Vec<StageFailure>,
}

/// Combine the remainder and processed stems into the final buffer.
///
/// With no processed stems the untouched mix is returned with
/// [`RenderStatus::NoEditsApplied`] instead of the bare remainder.
pub fn compose(
    mix: &AudioBuffer,
    remainder: &AudioBuffer,
    processed: &[AudioBuffer],
    global_reverb: f32,
    backend: &dyn StageBackend,
) -> Composition {
    if processed.is_empty() {
        let mut buffer = mix.clone();
        buffer.clamp();
        return Composition {
            buffer,
            status: RenderStatus::NoEditsApplied,
            failures: Vec::new(),
        };
    }

    let len = common_length(remainder, processed);
    let mut sum = remainder.truncated(len);
    for stem in processed {
        sum.add_assign(stem);
    }

    let mut failures = Vec::new();
    let buffer = finish(sum, global_reverb, backend, &mut failures);
    Composition {
        buffer,
        status: RenderStatus::Applied,
        failures,
    }
}

/// Global reverb (when `global_reverb > 0`) followed by a clip to [-1, 1]
pub fn finish(
    mut buffer: AudioBuffer,
    global_reverb: f32,
    backend: &dyn StageBackend,
    failures: &mut Vec<StageFailure>,
) -> AudioBuffer {
    if global_reverb > 0.0 {
        let stage = backend.reverb(global_reverb);
        buffer = run_guarded(stage.as_ref(), buffer, failures);
    }
    buffer.clamp();
    buffer
}
