//! Gain stage
//!
//! Linear volume followed by a hard clip to [-1.0, 1.0].

use crate::dsp::stage::EffectStage;
use crate::engine::AudioBuffer;
use crate::error::Result;

/// Unity volume
pub const UNITY_VOLUME: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gain {
    volume: f32,
}

impl Gain {
    pub fn new(volume: f32) -> Self {
        Self { volume }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}

impl EffectStage for Gain {
    fn name(&self) -> &'static str {
        "gain"
    }

    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let mut output = input.clone();
        output.scale(self.volume);
        output.clamp();
        Ok(output)
    }
}
