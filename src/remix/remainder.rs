//! Remainder reconstruction
//!
//! `remainder = mix - Σ separated targets`, over the shortest common length.
//! Subtracting the unprocessed separated copies means every untargeted
//! stem is carried through the remainder exactly. The remainder is never
//! clipped.

use crate::engine::{AudioBuffer, CANONICAL_CHANNELS};
use crate::error::{RemixError, Result};

/// Shortest length among the mix and all stems
pub fn common_length<'a>(mix: &AudioBuffer, stems: impl IntoIterator<Item = &'a AudioBuffer>) -> usize {
    stems
        .into_iter()
        .map(AudioBuffer::len)
        .fold(mix.len(), usize::min)
}

/// Compute the remainder, truncated to the common length.
///
/// # Errors
/// `ShapeMismatch` if any buffer is not stereo.
pub fn reconstruct_remainder(mix: &AudioBuffer, separated: &[&AudioBuffer]) -> Result<AudioBuffer> {
    for buffer in std::iter::once(mix).chain(separated.iter().copied()) {
        if buffer.channels() != CANONICAL_CHANNELS {
            return Err(RemixError::ShapeMismatch {
                reason: format!(
                    "remainder needs stereo buffers, got {} channels",
                    buffer.channels()
                ),
            });
        }
    }

    let min_len = common_length(mix, separated.iter().copied());
    let mut remainder = mix.truncated(min_len);
    for stem in separated {
        remainder.sub_assign(stem);
    }
    Ok(remainder)
}
