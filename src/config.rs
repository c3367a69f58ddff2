//! Engine configuration
//!
//! Loaded from a JSON file, then overridden by `STEMCRAFT_*` environment
//! variables.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::WORKING_SAMPLE_RATE;
use crate::error::{RemixError, Result};

/// Stems every separator is expected to know about
pub const DEFAULT_STEMS: [&str; 4] = ["vocals", "drums", "bass", "other"];

/// Which implementation runs the reverb, EQ, filter and compression stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageBackendKind {
    /// In-process DSP
    #[default]
    Native,
    /// `sox` subprocess per stage
    Sox,
}

impl std::str::FromStr for StageBackendKind {
    type Err = RemixError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(StageBackendKind::Native),
            "sox" => Ok(StageBackendKind::Sox),
            other => Err(RemixError::Config {
                reason: format!("unknown stage backend '{}' (expected native or sox)", other),
            }),
        }
    }
}

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rate the DSP stages are tuned for. Audio is always resampled to
    /// [`WORKING_SAMPLE_RATE`], so no other value is accepted.
    pub sample_rate: u32,
    /// Where rendered artifacts are written. `None` keeps them in memory only.
    pub output_dir: Option<PathBuf>,
    /// 16, 24 or 32 (float)
    pub output_bit_depth: u16,
    pub stage_backend: StageBackendKind,
    pub sox_path: PathBuf,
    pub stage_timeout_secs: u64,
    /// Directory for subprocess scratch files, defaults to the OS temp dir
    pub scratch_dir: Option<PathBuf>,
    /// Additional free-form stem labels accepted by the separator
    pub extra_stems: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: WORKING_SAMPLE_RATE,
            output_dir: None,
            output_bit_depth: 16,
            stage_backend: StageBackendKind::Native,
            sox_path: PathBuf::from("sox"),
            stage_timeout_secs: 30,
            scratch_dir: None,
            extra_stems: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load a config file and apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RemixError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let config = Self::default().with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `STEMCRAFT_*` environment variables on top of this config
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(dir) = env::var("STEMCRAFT_OUTPUT_DIR") {
            self.output_dir = Some(PathBuf::from(dir));
        }
        if let Ok(sox) = env::var("STEMCRAFT_SOX_PATH") {
            self.sox_path = PathBuf::from(sox);
        }
        if let Ok(backend) = env::var("STEMCRAFT_STAGE_BACKEND") {
            self.stage_backend = backend.parse()?;
        }
        if let Ok(secs) = env::var("STEMCRAFT_STAGE_TIMEOUT_SECS") {
            self.stage_timeout_secs = secs.trim().parse().map_err(|_| RemixError::Config {
                reason: format!("STEMCRAFT_STAGE_TIMEOUT_SECS is not a number: '{}'", secs),
            })?;
        }
        Ok(self)
    }

    /// Check the settings for values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate != WORKING_SAMPLE_RATE {
            return Err(RemixError::Config {
                reason: format!(
                    "sample_rate {} is not supported (audio is processed at {} Hz)",
                    self.sample_rate, WORKING_SAMPLE_RATE
                ),
            });
        }
        if !matches!(self.output_bit_depth, 16 | 24 | 32) {
            return Err(RemixError::Config {
                reason: format!(
                    "output_bit_depth {} is not supported (16, 24 or 32)",
                    self.output_bit_depth
                ),
            });
        }
        if self.stage_timeout_secs == 0 {
            return Err(RemixError::Config {
                reason: "stage_timeout_secs must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(env::temp_dir)
    }

    pub fn is_known_stem(&self, stem: &str) -> bool {
        DEFAULT_STEMS.contains(&stem) || self.extra_stems.iter().any(|s| s == stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.output_bit_depth, 16);
        assert_eq!(config.stage_backend, StageBackendKind::Native);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stemcraft.json");
        std::fs::write(&path, r#"{"output_bit_depth": 24, "extra_stems": ["piano"]}"#).unwrap();

        let config: EngineConfig =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(config.output_bit_depth, 24);
        assert_eq!(config.stage_timeout_secs, 30);
        assert!(config.is_known_stem("piano"));
        assert!(config.is_known_stem("vocals"));
        assert!(!config.is_known_stem("kazoo"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = EngineConfig {
            output_bit_depth: 12,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RemixError::Config { .. })));

        let config = EngineConfig {
            stage_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_other_sample_rates() {
        for rate in [0, 22050, 48000] {
            let config = EngineConfig {
                sample_rate: rate,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(RemixError::Config { .. })), "{}", rate);
        }
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("Sox".parse::<StageBackendKind>().unwrap(), StageBackendKind::Sox);
        assert!("ffmpeg".parse::<StageBackendKind>().is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let result = EngineConfig::from_file(Path::new("/no/such/stemcraft.json"));
        assert!(matches!(result, Err(RemixError::FileNotFound { .. })));
    }
}
