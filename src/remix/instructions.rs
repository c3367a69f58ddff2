//! Instruction sets
//!
//! The structured description of one remix: per-stem parameters grouped by
//! effect category, plus an optional global reverb amount. Every category
//! is a typed map; fields that a stage needs but the caller may omit are
//! `Option`s and are resolved (or rejected) right before the stage runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dsp::{CompressorParams, FilterPlan, PeakingBand};
use crate::error::{RemixError, Result};

pub const DEFAULT_VOLUME: f32 = 1.0;
pub const DEFAULT_REVERB: f32 = 0.0;
pub const DEFAULT_PITCH: i32 = 0;

pub const VOLUME_RANGE: (f32, f32) = (0.0, 2.0);
pub const REVERB_RANGE: (f32, f32) = (0.0, 1.0);

// ============================================================================
// Compression
// ============================================================================

/// Categorical compression strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CompressionLevel {
    Low,
    Medium,
    High,
}

impl CompressionLevel {
    /// Threshold in dB and ratio for this level
    pub fn threshold_and_ratio(self) -> (f32, f32) {
        match self {
            CompressionLevel::Low => (-30.0, 2.0),
            CompressionLevel::Medium => (-20.0, 4.0),
            CompressionLevel::High => (-10.0, 8.0),
        }
    }

    pub fn params(self) -> CompressorParams {
        let (threshold_db, ratio) = self.threshold_and_ratio();
        CompressorParams::new(threshold_db, ratio)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompressionLevel::Low => "low",
            CompressionLevel::Medium => "medium",
            CompressionLevel::High => "high",
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionLevel {
    type Err = RemixError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(CompressionLevel::Low),
            "medium" => Ok(CompressionLevel::Medium),
            "high" => Ok(CompressionLevel::High),
            other => Err(RemixError::InvalidParameter {
                param: "compression".to_string(),
                value: other.to_string(),
                expected: "low, medium or high".to_string(),
            }),
        }
    }
}

impl TryFrom<String> for CompressionLevel {
    type Error = RemixError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CompressionLevel> for String {
    fn from(level: CompressionLevel) -> Self {
        level.as_str().to_string()
    }
}

// ============================================================================
// EQ and Filter
// ============================================================================

/// Peaking EQ request; all three fields are required to run the stage
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EqSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f32>,
    /// Q factor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain_db: Option<f32>,
}

impl EqSettings {
    pub fn new(frequency: f32, width: f32, gain_db: f32) -> Self {
        Self {
            frequency: Some(frequency),
            width: Some(width),
            gain_db: Some(gain_db),
        }
    }

    /// Resolve to a concrete band, naming every missing field
    pub fn resolve(&self, stem: &str) -> Result<PeakingBand> {
        match (self.frequency, self.width, self.gain_db) {
            (Some(frequency), Some(q), Some(gain_db)) => Ok(PeakingBand {
                frequency,
                q,
                gain_db,
            }),
            _ => {
                let missing: Vec<&str> = [
                    ("frequency", self.frequency.is_none()),
                    ("width", self.width.is_none()),
                    ("gain_db", self.gain_db.is_none()),
                ]
                .iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| *name)
                .collect();
                Err(RemixError::IncompleteParameter {
                    stem: stem.to_string(),
                    stage: "eq",
                    missing: missing.join(", "),
                })
            }
        }
    }
}

/// Filter request, tagged by `type`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FilterSettings {
    Lowpass {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cutoff: Option<f32>,
    },
    Highpass {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cutoff: Option<f32>,
    },
    Bandpass {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        low_cutoff: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        high_cutoff: Option<f32>,
    },
}

impl FilterSettings {
    pub fn resolve(&self, stem: &str) -> Result<FilterPlan> {
        let incomplete = |missing: &str| RemixError::IncompleteParameter {
            stem: stem.to_string(),
            stage: "filter",
            missing: missing.to_string(),
        };
        match *self {
            FilterSettings::Lowpass { cutoff } => cutoff
                .map(|cutoff| FilterPlan::Lowpass { cutoff })
                .ok_or_else(|| incomplete("cutoff")),
            FilterSettings::Highpass { cutoff } => cutoff
                .map(|cutoff| FilterPlan::Highpass { cutoff })
                .ok_or_else(|| incomplete("cutoff")),
            FilterSettings::Bandpass {
                low_cutoff,
                high_cutoff,
            } => match (low_cutoff, high_cutoff) {
                (Some(low_cutoff), Some(high_cutoff)) => Ok(FilterPlan::Bandpass {
                    low_cutoff,
                    high_cutoff,
                }),
                (None, Some(_)) => Err(incomplete("low_cutoff")),
                (Some(_), None) => Err(incomplete("high_cutoff")),
                (None, None) => Err(incomplete("low_cutoff, high_cutoff")),
            },
        }
    }
}

// ============================================================================
// Instruction Set
// ============================================================================

/// Everything one stem's chain needs, with defaults filled in
#[derive(Debug, Clone, PartialEq)]
pub struct StemInstructions {
    pub volume: f32,
    pub reverb: f32,
    pub pitch_semitones: i32,
    pub eq: Option<EqSettings>,
    pub filter: Option<FilterSettings>,
    pub compression: Option<CompressionLevel>,
}

impl Default for StemInstructions {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            reverb: DEFAULT_REVERB,
            pitch_semitones: DEFAULT_PITCH,
            eq: None,
            filter: None,
            compression: None,
        }
    }
}

/// Per-stem and global edits for one render
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstructionSet {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, f32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reverb: BTreeMap<String, f32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pitch_shift: BTreeMap<String, i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub compression: BTreeMap<String, CompressionLevel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub eq: BTreeMap<String, EqSettings>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filter: BTreeMap<String, FilterSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_reverb: Option<f32>,
}

impl InstructionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from JSON and clamp into range
    pub fn from_json(json: &str) -> Result<Self> {
        let mut set: InstructionSet = serde_json::from_str(json)?;
        set.clamp_ranges();
        Ok(set)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_volume(mut self, stem: &str, volume: f32) -> Self {
        self.volumes.insert(stem.to_string(), volume);
        self.clamp_ranges();
        self
    }

    pub fn with_reverb(mut self, stem: &str, intensity: f32) -> Self {
        self.reverb.insert(stem.to_string(), intensity);
        self.clamp_ranges();
        self
    }

    pub fn with_pitch_shift(mut self, stem: &str, semitones: i32) -> Self {
        self.pitch_shift.insert(stem.to_string(), semitones);
        self
    }

    pub fn with_compression(mut self, stem: &str, level: CompressionLevel) -> Self {
        self.compression.insert(stem.to_string(), level);
        self
    }

    pub fn with_eq(mut self, stem: &str, eq: EqSettings) -> Self {
        self.eq.insert(stem.to_string(), eq);
        self
    }

    pub fn with_filter(mut self, stem: &str, filter: FilterSettings) -> Self {
        self.filter.insert(stem.to_string(), filter);
        self
    }

    pub fn with_global_reverb(mut self, intensity: f32) -> Self {
        self.global_reverb = Some(intensity);
        self.clamp_ranges();
        self
    }

    /// Force volumes into [0, 2] and reverb amounts into [0, 1].
    ///
    /// Non-finite values fall back to the category default.
    pub fn clamp_ranges(&mut self) {
        for volume in self.volumes.values_mut() {
            *volume = clamp_or(*volume, VOLUME_RANGE, DEFAULT_VOLUME);
        }
        for intensity in self.reverb.values_mut() {
            *intensity = clamp_or(*intensity, REVERB_RANGE, DEFAULT_REVERB);
        }
        if let Some(global) = self.global_reverb.as_mut() {
            *global = clamp_or(*global, REVERB_RANGE, DEFAULT_REVERB);
        }
    }

    /// Stems mentioned by any per-stem category
    pub fn targeted_stems(&self) -> BTreeSet<String> {
        self.volumes
            .keys()
            .chain(self.reverb.keys())
            .chain(self.pitch_shift.keys())
            .chain(self.compression.keys())
            .chain(self.eq.keys())
            .chain(self.filter.keys())
            .cloned()
            .collect()
    }

    /// Chain parameters for `stem`, defaults where the stem is not mentioned
    pub fn for_stem(&self, stem: &str) -> StemInstructions {
        StemInstructions {
            volume: self.volumes.get(stem).copied().unwrap_or(DEFAULT_VOLUME),
            reverb: self.reverb.get(stem).copied().unwrap_or(DEFAULT_REVERB),
            pitch_semitones: self.pitch_shift.get(stem).copied().unwrap_or(DEFAULT_PITCH),
            eq: self.eq.get(stem).copied(),
            filter: self.filter.get(stem).copied(),
            compression: self.compression.get(stem).copied(),
        }
    }

    pub fn global_reverb_amount(&self) -> f32 {
        self.global_reverb.unwrap_or(DEFAULT_REVERB)
    }
}

fn clamp_or(value: f32, (min, max): (f32, f32), fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}
