//! One-sentence summaries of what changed between two instruction sets

use std::collections::{BTreeMap, BTreeSet};

use crate::remix::{InstructionSet, DEFAULT_PITCH, DEFAULT_REVERB, DEFAULT_VOLUME};

const NO_CHANGES: &str = "No changes were made";

fn stems_of<T>(old: &BTreeMap<String, T>, new: &BTreeMap<String, T>) -> BTreeSet<String> {
    old.keys().chain(new.keys()).cloned().collect()
}

fn volume_phrase(stem: &str, old: f32, new: f32) -> Option<String> {
    if new == old {
        None
    } else if new == 0.0 {
        Some(format!("muted {}", stem))
    } else if new > old {
        Some(format!("boosted {}", stem))
    } else {
        Some(format!("lowered {}", stem))
    }
}

fn reverb_phrase(target: &str, old: f32, new: f32) -> Option<String> {
    if new == old {
        None
    } else if old == DEFAULT_REVERB {
        Some(format!("added reverb to {}", target))
    } else if new == DEFAULT_REVERB {
        Some(format!("removed the reverb from {}", target))
    } else if new > old {
        Some(format!("increased the reverb on {}", target))
    } else {
        Some(format!("reduced the reverb on {}", target))
    }
}

fn pitch_phrase(stem: &str, old: i32, new: i32) -> Option<String> {
    let delta = new - old;
    if delta == 0 {
        return None;
    }
    if new == DEFAULT_PITCH {
        return Some(format!("reset the pitch of {}", stem));
    }
    let direction = if delta > 0 { "up" } else { "down" };
    let unit = if delta.abs() == 1 { "semitone" } else { "semitones" };
    Some(format!("shifted {} {} {} {}", stem, direction, delta.abs(), unit))
}

/// Human-readable summary such as "I boosted vocals and added reverb to vocals".
///
/// Returns "No changes were made" when the sets are identical in effect.
pub fn describe_changes(old: &InstructionSet, new: &InstructionSet) -> String {
    let mut phrases = Vec::new();

    for stem in stems_of(&old.volumes, &new.volumes) {
        let before = old.volumes.get(&stem).copied().unwrap_or(DEFAULT_VOLUME);
        let after = new.volumes.get(&stem).copied().unwrap_or(DEFAULT_VOLUME);
        phrases.extend(volume_phrase(&stem, before, after));
    }

    for stem in stems_of(&old.reverb, &new.reverb) {
        let before = old.reverb.get(&stem).copied().unwrap_or(DEFAULT_REVERB);
        let after = new.reverb.get(&stem).copied().unwrap_or(DEFAULT_REVERB);
        phrases.extend(reverb_phrase(&stem, before, after));
    }

    for stem in stems_of(&old.pitch_shift, &new.pitch_shift) {
        let before = old.pitch_shift.get(&stem).copied().unwrap_or(DEFAULT_PITCH);
        let after = new.pitch_shift.get(&stem).copied().unwrap_or(DEFAULT_PITCH);
        phrases.extend(pitch_phrase(&stem, before, after));
    }

    for stem in stems_of(&old.compression, &new.compression) {
        match (old.compression.get(&stem), new.compression.get(&stem)) {
            (before, Some(level)) if before != Some(level) => {
                phrases.push(format!("set {} compression to {}", stem, level))
            }
            (Some(_), None) => phrases.push(format!("removed the compression on {}", stem)),
            _ => {}
        }
    }

    for stem in stems_of(&old.eq, &new.eq) {
        if old.eq.get(&stem) != new.eq.get(&stem) {
            phrases.push(format!("adjusted the EQ on {}", stem));
        }
    }

    for stem in stems_of(&old.filter, &new.filter) {
        if old.filter.get(&stem) != new.filter.get(&stem) {
            phrases.push(format!("changed the filter on {}", stem));
        }
    }

    phrases.extend(reverb_phrase(
        "the whole mix",
        old.global_reverb_amount(),
        new.global_reverb_amount(),
    ));

    match phrases.len() {
        0 => NO_CHANGES.to_string(),
        1 => format!("I {}", phrases[0]),
        n => format!("I {} and {}", phrases[..n - 1].join(", "), phrases[n - 1]),
    }
}
