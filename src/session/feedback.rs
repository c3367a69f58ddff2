//! Feedback diff engine
//!
//! A [`FeedbackDelta`] carries qualitative labels ("louder", "more",
//! "+2") per stem. Applying it to the last instruction set produces either
//! a structurally different set or [`FeedbackResult::NoChange`].
//!
//! Labels are parsed into typed enums at deserialization time, so an
//! unknown label is rejected before it can reach the diff.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RemixError, Result};
use crate::remix::{
    CompressionLevel, InstructionSet, DEFAULT_PITCH, DEFAULT_REVERB, DEFAULT_VOLUME,
    REVERB_RANGE, VOLUME_RANGE,
};

/// Volume and reverb values produced by feedback land on 0.01 steps
const STEPS_PER_UNIT: f32 = 100.0;

fn invalid_label(param: &str, value: &str, expected: &str) -> RemixError {
    RemixError::InvalidParameter {
        param: param.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}

/// Lowercase and treat `_`/`-` as spaces so "much_louder" matches "much louder"
fn canonical_label(label: &str) -> String {
    label
        .trim()
        .to_ascii_lowercase()
        .replace(['_', '-'], " ")
}

// ============================================================================
// Labels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VolumeChange {
    SlightlySofter,
    Softer,
    MuchSofter,
    Mute,
    SlightlyLouder,
    Louder,
    MuchLouder,
}

impl VolumeChange {
    /// New volume from the current one, before clamping
    pub fn apply(self, current: f32) -> f32 {
        match self {
            Self::SlightlySofter => current - 0.1,
            Self::Softer => current - 0.3,
            Self::MuchSofter => current - 0.6,
            Self::Mute => 0.0,
            Self::SlightlyLouder => current + 0.1,
            Self::Louder => current + 0.3,
            Self::MuchLouder => current + 0.6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SlightlySofter => "slightly softer",
            Self::Softer => "softer",
            Self::MuchSofter => "much softer",
            Self::Mute => "mute",
            Self::SlightlyLouder => "slightly louder",
            Self::Louder => "louder",
            Self::MuchLouder => "much louder",
        }
    }
}

impl FromStr for VolumeChange {
    type Err = RemixError;

    fn from_str(s: &str) -> Result<Self> {
        match canonical_label(s).as_str() {
            "slightly softer" => Ok(Self::SlightlySofter),
            "softer" => Ok(Self::Softer),
            "much softer" => Ok(Self::MuchSofter),
            "mute" => Ok(Self::Mute),
            "slightly louder" => Ok(Self::SlightlyLouder),
            "louder" => Ok(Self::Louder),
            "much louder" => Ok(Self::MuchLouder),
            _ => Err(invalid_label(
                "volume",
                s,
                "slightly softer, softer, much softer, mute, slightly louder, louder or much louder",
            )),
        }
    }
}

/// Reverb label, used per stem and for the global pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReverbChange {
    More,
    Less,
    /// Remove the reverb entirely
    None,
}

impl ReverbChange {
    pub fn apply(self, current: f32) -> f32 {
        match self {
            Self::More => current + 0.1,
            Self::Less => current - 0.1,
            Self::None => 0.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::More => "more",
            Self::Less => "less",
            Self::None => "none",
        }
    }
}

impl FromStr for ReverbChange {
    type Err = RemixError;

    fn from_str(s: &str) -> Result<Self> {
        match canonical_label(s).as_str() {
            "more" => Ok(Self::More),
            "less" => Ok(Self::Less),
            "none" | "off" => Ok(Self::None),
            _ => Err(invalid_label("reverb", s, "more, less or none")),
        }
    }
}

/// Pitch label: a signed semitone delta or a reset to 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PitchLabel", into = "String")]
pub enum PitchChange {
    Shift(i32),
    Reset,
}

impl PitchChange {
    pub fn apply(self, current: i32) -> i32 {
        match self {
            Self::Shift(delta) => current.saturating_add(delta),
            Self::Reset => DEFAULT_PITCH,
        }
    }
}

impl FromStr for PitchChange {
    type Err = RemixError;

    fn from_str(s: &str) -> Result<Self> {
        // The sign must survive, so numbers are parsed before canonicalizing
        match s.trim().parse::<i32>() {
            Ok(0) => return Ok(Self::Reset),
            Ok(delta) => return Ok(Self::Shift(delta)),
            Err(_) => {}
        }
        match canonical_label(s).as_str() {
            "undo" | "reset" => Ok(Self::Reset),
            _ => Err(invalid_label(
                "pitch_shift",
                s,
                "a signed integer such as \"+2\" or \"-3\", or \"undo\"",
            )),
        }
    }
}

/// Accepts both `"+2"` and `2` in JSON
#[derive(Deserialize)]
#[serde(untagged)]
enum PitchLabel {
    Number(i32),
    Text(String),
}

impl TryFrom<PitchLabel> for PitchChange {
    type Error = RemixError;

    fn try_from(label: PitchLabel) -> Result<Self> {
        match label {
            PitchLabel::Number(0) => Ok(Self::Reset),
            PitchLabel::Number(delta) => Ok(Self::Shift(delta)),
            PitchLabel::Text(text) => text.parse(),
        }
    }
}

/// Compression label: overwrite with a level, or drop the entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CompressionChange {
    Set(CompressionLevel),
    Remove,
}

impl FromStr for CompressionChange {
    type Err = RemixError;

    fn from_str(s: &str) -> Result<Self> {
        match canonical_label(s).as_str() {
            "none" | "off" => Ok(Self::Remove),
            _ => s.parse().map(Self::Set),
        }
    }
}

macro_rules! string_label {
    ($($ty:ty),*) => {$(
        impl TryFrom<String> for $ty {
            type Error = RemixError;

            fn try_from(value: String) -> Result<Self> {
                value.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> String {
                value.to_string()
            }
        }
    )*};
}

string_label!(VolumeChange, ReverbChange, CompressionChange);

impl From<PitchChange> for String {
    fn from(value: PitchChange) -> String {
        value.to_string()
    }
}

impl fmt::Display for VolumeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ReverbChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PitchChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shift(delta) => write!(f, "{:+}", delta),
            Self::Reset => f.write_str("undo"),
        }
    }
}

impl fmt::Display for CompressionChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set(level) => write!(f, "{}", level),
            Self::Remove => f.write_str("none"),
        }
    }
}

// ============================================================================
// Delta
// ============================================================================

/// Sparse adjustment relative to the last instruction set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackDelta {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, VolumeChange>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reverb: BTreeMap<String, ReverbChange>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pitch_shift: BTreeMap<String, PitchChange>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub compression: BTreeMap<String, CompressionChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_reverb: Option<ReverbChange>,
}

impl FeedbackDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn volume(mut self, stem: &str, change: VolumeChange) -> Self {
        self.volumes.insert(stem.to_string(), change);
        self
    }

    pub fn reverb(mut self, stem: &str, change: ReverbChange) -> Self {
        self.reverb.insert(stem.to_string(), change);
        self
    }

    pub fn pitch(mut self, stem: &str, change: PitchChange) -> Self {
        self.pitch_shift.insert(stem.to_string(), change);
        self
    }

    pub fn compression(mut self, stem: &str, change: CompressionChange) -> Self {
        self.compression.insert(stem.to_string(), change);
        self
    }

    pub fn global_reverb(mut self, change: ReverbChange) -> Self {
        self.global_reverb = Some(change);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
            && self.reverb.is_empty()
            && self.pitch_shift.is_empty()
            && self.compression.is_empty()
            && self.global_reverb.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackResult {
    Changed(InstructionSet),
    /// The delta left the instruction set structurally identical
    NoChange,
}

fn quantize(value: f32) -> f32 {
    (value * STEPS_PER_UNIT).round() / STEPS_PER_UNIT
}

fn clamp_quantized(value: f32, (min, max): (f32, f32)) -> f32 {
    quantize(value.clamp(min, max))
}

/// Write `value` for `stem`, unless the stem has no entry and `value` is
/// the category default.
fn update_entry<T: PartialEq>(map: &mut BTreeMap<String, T>, stem: &str, value: T, default: T) {
    match map.get_mut(stem) {
        Some(existing) => *existing = value,
        None if value == default => {}
        None => {
            map.insert(stem.to_string(), value);
        }
    }
}

/// Apply `delta` to a copy of `last` and compare structurally.
///
/// Categories and stems the delta does not mention are left untouched.
pub fn apply_delta(last: &InstructionSet, delta: &FeedbackDelta) -> FeedbackResult {
    if delta.is_empty() {
        return FeedbackResult::NoChange;
    }
    let mut next = last.clone();

    for (stem, change) in &delta.volumes {
        let current = next.volumes.get(stem).copied().unwrap_or(DEFAULT_VOLUME);
        let updated = clamp_quantized(change.apply(current), VOLUME_RANGE);
        update_entry(&mut next.volumes, stem, updated, DEFAULT_VOLUME);
    }

    for (stem, change) in &delta.reverb {
        let current = next.reverb.get(stem).copied().unwrap_or(DEFAULT_REVERB);
        let updated = clamp_quantized(change.apply(current), REVERB_RANGE);
        update_entry(&mut next.reverb, stem, updated, DEFAULT_REVERB);
    }

    for (stem, change) in &delta.pitch_shift {
        let current = next.pitch_shift.get(stem).copied().unwrap_or(DEFAULT_PITCH);
        update_entry(&mut next.pitch_shift, stem, change.apply(current), DEFAULT_PITCH);
    }

    for (stem, change) in &delta.compression {
        match change {
            CompressionChange::Set(level) => {
                next.compression.insert(stem.clone(), *level);
            }
            CompressionChange::Remove => {
                next.compression.remove(stem);
            }
        }
    }

    if let Some(change) = delta.global_reverb {
        let updated = clamp_quantized(change.apply(next.global_reverb_amount()), REVERB_RANGE);
        if next.global_reverb.is_some() || updated != DEFAULT_REVERB {
            next.global_reverb = Some(updated);
        }
    }

    if next == *last {
        FeedbackResult::NoChange
    } else {
        FeedbackResult::Changed(next)
    }
}
