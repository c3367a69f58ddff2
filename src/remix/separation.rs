//! Separation collaborator
//!
//! The engine never separates audio itself. A [`Separator`] turns a mix into
//! named raw waveforms; every waveform is normalized before use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::engine::{import_audio, RawWaveform};
use crate::error::{RemixError, Result};

/// Decomposes a mix into named stems
pub trait Separator: Send + Sync {
    /// Get separator name for logging
    fn name(&self) -> &'static str;

    /// Separate `mix_path` into the requested stems.
    ///
    /// A stem outside the separator's vocabulary must fail with
    /// [`RemixError::UnsupportedStem`] naming that stem.
    fn separate(&self, mix_path: &Path, stems: &[String]) -> Result<HashMap<String, RawWaveform>>;
}

// ============================================================================
// Stem Directory
// ============================================================================

/// Serves pre-separated stems stored as `<dir>/<stem>.wav`
#[derive(Debug, Clone)]
pub struct StemDirectorySeparator {
    dir: PathBuf,
}

impl StemDirectorySeparator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn stem_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}.wav", stem))
    }
}

impl Separator for StemDirectorySeparator {
    fn name(&self) -> &'static str {
        "stem-directory"
    }

    fn separate(&self, _mix_path: &Path, stems: &[String]) -> Result<HashMap<String, RawWaveform>> {
        if !self.dir.is_dir() {
            return Err(RemixError::Separation {
                reason: format!("stem directory {} does not exist", self.dir.display()),
            });
        }

        if let Some(missing) = stems.iter().find(|stem| !self.stem_path(stem).is_file()) {
            return Err(RemixError::UnsupportedStem {
                stem: missing.clone(),
            });
        }

        stems
            .iter()
            .map(|stem| {
                let buffer = import_audio(&self.stem_path(stem))?;
                Ok((stem.clone(), RawWaveform::from_buffer(&buffer)))
            })
            .collect()
    }
}

// ============================================================================
// HTTP Service
// ============================================================================

#[cfg(feature = "http-separator")]
pub use http::HttpSeparator;

#[cfg(feature = "http-separator")]
mod http {
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    use super::Separator;
    use crate::engine::RawWaveform;
    use crate::error::{RemixError, Result};

    #[derive(Debug, Serialize)]
    struct SeparationRequest<'a> {
        mix_path: &'a Path,
        stems: &'a [String],
    }

    #[derive(Debug, Deserialize)]
    struct SeparationResponse {
        #[serde(default)]
        stems: HashMap<String, RawWaveform>,
        #[serde(default)]
        unsupported: Vec<String>,
        #[serde(default)]
        error: Option<String>,
    }

    /// Remote separation service speaking JSON over HTTP
    pub struct HttpSeparator {
        base_url: String,
        timeout: Duration,
    }

    impl HttpSeparator {
        pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
            Self {
                base_url: base_url.into(),
                timeout,
            }
        }
    }

    impl Separator for HttpSeparator {
        fn name(&self) -> &'static str {
            "http"
        }

        fn separate(&self, mix_path: &Path, stems: &[String]) -> Result<HashMap<String, RawWaveform>> {
            let client = reqwest::blocking::Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| RemixError::Separation {
                    reason: e.to_string(),
                })?;

            let url = format!("{}/separate", self.base_url.trim_end_matches('/'));
            let response = client
                .post(&url)
                .json(&SeparationRequest { mix_path, stems })
                .send()
                .map_err(|e| RemixError::Separation {
                    reason: if e.is_timeout() {
                        format!("separation service timed out after {:?}", self.timeout)
                    } else {
                        format!("cannot reach separation service at {}: {}", self.base_url, e)
                    },
                })?;

            let status = response.status();
            let body: SeparationResponse = response.json().map_err(|e| RemixError::Separation {
                reason: format!("invalid response from separation service ({}): {}", status, e),
            })?;

            if let Some(stem) = body.unsupported.into_iter().next() {
                return Err(RemixError::UnsupportedStem { stem });
            }
            if !status.is_success() {
                return Err(RemixError::Separation {
                    reason: body
                        .error
                        .unwrap_or_else(|| format!("separation service returned {}", status)),
                });
            }
            Ok(body.stems)
        }
    }
}
