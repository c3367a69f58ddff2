//! Shared fixtures: an in-memory separator and mix helpers

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use stemcraft::engine::{export_audio, AudioBuffer, ExportFormat, RawWaveform};
use stemcraft::session::MemoryStore;
use stemcraft::{EngineConfig, RemixEngine, RemixError, Result, Separator};
use tempfile::TempDir;

pub const SAMPLE_RATE: u32 = 44100;

/// Serves fixed stem buffers and records every request
pub struct FakeSeparator {
    stems: HashMap<String, RawWaveform>,
    pub calls: Mutex<Vec<Vec<String>>>,
    pub fail_with: Mutex<Option<String>>,
}

impl FakeSeparator {
    pub fn new() -> Self {
        Self {
            stems: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            fail_with: Mutex::new(None),
        }
    }

    pub fn with_stem(mut self, name: &str, buffer: &AudioBuffer) -> Self {
        self.stems
            .insert(name.to_string(), RawWaveform::from_buffer(buffer));
        self
    }

    pub fn with_raw(mut self, name: &str, raw: RawWaveform) -> Self {
        self.stems.insert(name.to_string(), raw);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Separator for FakeSeparator {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn separate(&self, _mix_path: &Path, stems: &[String]) -> Result<HashMap<String, RawWaveform>> {
        self.calls.lock().push(stems.to_vec());

        if let Some(reason) = self.fail_with.lock().clone() {
            return Err(RemixError::Separation { reason });
        }
        if let Some(stem) = stems.iter().find(|s| !self.stems.contains_key(*s)) {
            return Err(RemixError::UnsupportedStem { stem: stem.clone() });
        }
        Ok(stems
            .iter()
            .map(|s| (s.clone(), self.stems[s].clone()))
            .collect())
    }
}

pub fn stereo(samples: Vec<f32>) -> AudioBuffer {
    AudioBuffer::from_channels(vec![samples.clone(), samples], SAMPLE_RATE).unwrap()
}

pub fn sine(frequency: f32, amplitude: f32, len: usize) -> AudioBuffer {
    stereo(
        (0..len)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * frequency * i as f32 / SAMPLE_RATE as f32).sin()
            })
            .collect(),
    )
}

pub fn sum(buffers: &[&AudioBuffer]) -> AudioBuffer {
    let mut total = buffers[0].clone();
    for buffer in &buffers[1..] {
        total.add_assign(buffer);
    }
    total
}

/// Write `mix` as a float WAV so it reads back bit-exact
pub fn write_mix(dir: &TempDir, mix: &AudioBuffer) -> PathBuf {
    let path = dir.path().join("mix.wav");
    export_audio(mix, &path, ExportFormat::new(32)).unwrap();
    path
}

pub fn engine(separator: Arc<FakeSeparator>) -> RemixEngine {
    engine_with_config(separator, EngineConfig::default())
}

pub fn engine_with_config(separator: Arc<FakeSeparator>, config: EngineConfig) -> RemixEngine {
    RemixEngine::new(config, separator, Arc::new(MemoryStore::new())).unwrap()
}

pub fn assert_all_close(buffer: &AudioBuffer, expected: &AudioBuffer, epsilon: f32) {
    assert_eq!(buffer.channels(), expected.channels());
    assert_eq!(buffer.len(), expected.len());
    for (got, want) in buffer.samples.iter().zip(&expected.samples) {
        for (g, w) in got.iter().zip(want) {
            approx::assert_abs_diff_eq!(*g, *w, epsilon = epsilon);
        }
    }
}
