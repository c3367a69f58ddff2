//! Output file naming
//!
//! `remix_<tags>_<suffix>.wav`, where the tags list the effect categories the
//! instruction set actually exercises and the suffix only avoids collisions.
//! Exported stems are named `<mix>_<stem>_<suffix>.wav`.

use std::path::Path;

use uuid::Uuid;

use crate::remix::instructions::{InstructionSet, DEFAULT_PITCH, DEFAULT_REVERB, DEFAULT_VOLUME};

const SUFFIX_LEN: usize = 6;

/// Tags in canonical order; empty when nothing non-default is requested
pub fn output_tags(set: &InstructionSet) -> Vec<&'static str> {
    let mut tags = Vec::new();
    if set.volumes.values().any(|v| *v != DEFAULT_VOLUME) {
        tags.push("vol");
    }
    if set.reverb.values().any(|r| *r != DEFAULT_REVERB) {
        tags.push("reverb");
    }
    if set.pitch_shift.values().any(|p| *p != DEFAULT_PITCH) {
        tags.push("pitch");
    }
    if !set.eq.is_empty() {
        tags.push("eq");
    }
    if !set.filter.is_empty() {
        tags.push("filter");
    }
    if !set.compression.is_empty() {
        tags.push("compression");
    }
    if set.global_reverb_amount() > DEFAULT_REVERB {
        tags.push("globalreverb");
    }
    tags
}

/// Six hex characters from a fresh v4 UUID
pub fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..SUFFIX_LEN].to_string()
}

/// Name with an explicit suffix
pub fn file_name_with_suffix(set: &InstructionSet, suffix: &str) -> String {
    let tags = output_tags(set);
    let tag_part = if tags.is_empty() {
        "basic".to_string()
    } else {
        tags.join("_")
    };
    format!("remix_{}_{}.wav", tag_part, suffix)
}

pub fn output_file_name(set: &InstructionSet) -> String {
    file_name_with_suffix(set, &random_suffix())
}

/// File name for an exported stem of `mix_path`
pub fn stem_file_name(mix_path: &Path, stem: &str, suffix: &str) -> String {
    let base = mix_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mix".to_string());
    format!("{}_{}_{}.wav", base, stem, suffix)
}
