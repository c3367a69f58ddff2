//! Subprocess stages
//!
//! Runs reverb, EQ, filter and compression through the `sox` command-line
//! tool. Every invocation owns two uniquely named scratch WAV files that are
//! removed when the stage returns, whatever the outcome. Files orphaned by
//! a crashed process carry [`SCRATCH_PREFIX`] and are swept by
//! [`sweep_stale_scratch`].

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::config::EngineConfig;
use crate::dsp::compressor::CompressorParams;
use crate::dsp::eq::PeakingBand;
use crate::dsp::filter::FilterPlan;
use crate::dsp::reverb::EchoParams;
use crate::dsp::stage::{EffectStage, StageBackend};
use crate::engine::{import_audio, write_wav, AudioBuffer, ExportFormat};
use crate::error::{RemixError, Result};

/// File name prefix of every scratch file this module creates
pub const SCRATCH_PREFIX: &str = "stemcraft-scratch-";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Scratch Files
// ============================================================================

/// Exclusively owned temporary WAV file, deleted on drop
#[derive(Debug)]
pub struct ScratchFile {
    file: NamedTempFile,
}

impl ScratchFile {
    pub fn create_in(dir: &Path) -> Result<Self> {
        Self::with_suffix(dir, ".wav")
    }

    fn with_suffix(dir: &Path, suffix: &str) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .suffix(suffix)
            .tempfile_in(dir)?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Write `buffer` as 32-bit float WAV so nothing is clipped on the way out
    pub fn write_buffer(&self, buffer: &AudioBuffer) -> Result<()> {
        let sink = BufWriter::new(self.file.reopen()?);
        write_wav(buffer, sink, ExportFormat::new(32))
    }
}

/// Remove scratch files older than `max_age` from `dir`.
///
/// Returns the number of files removed. Files that vanish or cannot be
/// inspected are skipped.
pub fn sweep_stale_scratch(dir: &Path, max_age: Duration) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(SCRATCH_PREFIX) {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if matches!(age, Some(age) if age >= max_age) && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }

    if removed > 0 {
        info!("Removed {} stale scratch files from {}", removed, dir.display());
    }
    Ok(removed)
}

// ============================================================================
// Sox Runner
// ============================================================================

/// Launches `sox` with a hard timeout
#[derive(Debug, Clone)]
pub struct SoxRunner {
    sox_path: PathBuf,
    timeout: Duration,
    scratch_dir: PathBuf,
}

impl SoxRunner {
    pub fn new(sox_path: PathBuf, timeout: Duration, scratch_dir: PathBuf) -> Self {
        Self {
            sox_path,
            timeout,
            scratch_dir,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.sox_path.clone(),
            config.stage_timeout(),
            config.scratch_dir(),
        )
    }

    /// Process `input` through `sox <in> <out> <effect_args...>`
    pub fn run(&self, stage: &'static str, input: &AudioBuffer, effect_args: &[String]) -> Result<AudioBuffer> {
        let input_file = ScratchFile::create_in(&self.scratch_dir)?;
        let output_file = ScratchFile::create_in(&self.scratch_dir)?;
        // stderr goes to a file so a verbose sox never blocks on a full pipe
        let log_file = ScratchFile::with_suffix(&self.scratch_dir, ".log")?;
        input_file.write_buffer(input)?;

        debug!("sox {} effect: {}", stage, effect_args.join(" "));

        let mut child = Command::new(&self.sox_path)
            .arg(input_file.path())
            .arg(output_file.path())
            .args(effect_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log_file.file.reopen()?))
            .spawn()
            .map_err(|e| RemixError::ExternalStage {
                stage,
                reason: format!("failed to launch {}: {}", self.sox_path.display(), e),
            })?;

        let status = wait_with_timeout(&mut child, self.timeout, stage)?;
        if !status.success() {
            let stderr = fs::read_to_string(log_file.path()).unwrap_or_default();
            let stderr = stderr.lines().last().unwrap_or("").trim();
            return Err(RemixError::ExternalStage {
                stage,
                reason: format!("sox exited with {}: {}", status, stderr),
            });
        }

        import_audio(output_file.path()).map_err(|e| RemixError::ExternalStage {
            stage,
            reason: format!("unreadable sox output: {}", e),
        })
    }
}

/// Poll `child` until it exits, killing it once `timeout` has elapsed
fn wait_with_timeout(child: &mut Child, timeout: Duration, stage: &'static str) -> Result<ExitStatus> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if started.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RemixError::ExternalStage {
                    stage,
                    reason: format!("timed out after {:.1}s", timeout.as_secs_f32()),
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                return Err(RemixError::ExternalStage {
                    stage,
                    reason: format!("failed to wait for sox: {}", e),
                });
            }
        }
    }
}

// ============================================================================
// Sox Stages
// ============================================================================

/// One sox effect invocation
#[derive(Debug, Clone)]
pub struct SoxStage {
    name: &'static str,
    args: Vec<String>,
    runner: Arc<SoxRunner>,
}

impl EffectStage for SoxStage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        self.runner.run(self.name, input, &self.args)
    }
}

/// Builds every guarded stage as a sox invocation
#[derive(Debug, Clone)]
pub struct SoxBackend {
    runner: Arc<SoxRunner>,
}

impl SoxBackend {
    pub fn new(runner: SoxRunner) -> Self {
        Self {
            runner: Arc::new(runner),
        }
    }

    fn stage(&self, name: &'static str, args: Vec<String>) -> Box<dyn EffectStage> {
        Box::new(SoxStage {
            name,
            args,
            runner: Arc::clone(&self.runner),
        })
    }
}

impl StageBackend for SoxBackend {
    fn reverb(&self, intensity: f32) -> Box<dyn EffectStage> {
        self.stage("reverb", reverb_args(EchoParams::from_intensity(intensity)))
    }

    fn peaking_eq(&self, band: PeakingBand) -> Box<dyn EffectStage> {
        self.stage("eq", eq_args(band))
    }

    fn pass_filter(&self, plan: FilterPlan) -> Box<dyn EffectStage> {
        self.stage("filter", filter_args(plan))
    }

    fn compressor(&self, params: CompressorParams) -> Box<dyn EffectStage> {
        self.stage("compression", compand_args(params))
    }
}

fn reverb_args(echo: EchoParams) -> Vec<String> {
    vec![
        "echo".to_string(),
        "0.8".to_string(),
        "0.9".to_string(),
        format!("{:.1}", echo.delay_ms),
        format!("{:.3}", echo.decay),
    ]
}

fn eq_args(band: PeakingBand) -> Vec<String> {
    vec![
        "equalizer".to_string(),
        format!("{}", band.frequency),
        format!("{}q", band.q),
        format!("{}", band.gain_db),
    ]
}

fn filter_args(plan: FilterPlan) -> Vec<String> {
    match plan {
        FilterPlan::Lowpass { cutoff } => vec!["lowpass".to_string(), format!("{}", cutoff)],
        FilterPlan::Highpass { cutoff } => vec!["highpass".to_string(), format!("{}", cutoff)],
        FilterPlan::Bandpass {
            low_cutoff,
            high_cutoff,
        } => vec![
            "highpass".to_string(),
            format!("{}", low_cutoff),
            "lowpass".to_string(),
            format!("{}", high_cutoff),
        ],
    }
}

/// Hard-knee transfer curve: unity up to the threshold, then 1/ratio
fn compand_args(params: CompressorParams) -> Vec<String> {
    vec![
        "compand".to_string(),
        format!("{},{}", params.attack_ms / 1000.0, params.release_ms / 1000.0),
        format!(
            "-90,-90,{t},{t},0,{out}",
            t = params.threshold_db,
            out = params.output_at_full_scale_db()
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scratch_file_removed_on_drop() {
        let dir = tempdir().unwrap();
        let path = {
            let scratch = ScratchFile::create_in(dir.path()).unwrap();
            scratch.write_buffer(&AudioBuffer::filled(32, 0.5)).unwrap();
            assert!(scratch.path().exists());
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_round_trip_is_float() {
        let dir = tempdir().unwrap();
        let scratch = ScratchFile::create_in(dir.path()).unwrap();
        scratch.write_buffer(&AudioBuffer::filled(32, 1.5)).unwrap();
        let back = import_audio(scratch.path()).unwrap();
        assert_eq!(back.samples[0][0], 1.5);
    }

    #[test]
    fn test_sweep_only_touches_prefixed_files() {
        let dir = tempdir().unwrap();
        let stale = dir.path().join(format!("{}orphan.wav", SCRATCH_PREFIX));
        let unrelated = dir.path().join("keep.wav");
        fs::write(&stale, b"x").unwrap();
        fs::write(&unrelated, b"x").unwrap();

        let removed = sweep_stale_scratch(dir.path(), Duration::ZERO).unwrap();
        assert_eq!(removed, 1);
        assert!(!stale.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_sweep_keeps_fresh_files() {
        let dir = tempdir().unwrap();
        let fresh = dir.path().join(format!("{}live.wav", SCRATCH_PREFIX));
        fs::write(&fresh, b"x").unwrap();

        let removed = sweep_stale_scratch(dir.path(), Duration::from_secs(3600)).unwrap();
        assert_eq!(removed, 0);
        assert!(fresh.exists());
    }

    #[test]
    fn test_missing_binary_is_external_stage_error() {
        let dir = tempdir().unwrap();
        let runner = SoxRunner::new(
            PathBuf::from("/nonexistent/bin/sox"),
            Duration::from_secs(1),
            dir.path().to_path_buf(),
        );
        let backend = SoxBackend::new(runner);
        let result = backend.reverb(0.5).apply(&AudioBuffer::filled(64, 0.1));

        assert!(matches!(result, Err(RemixError::ExternalStage { stage: "reverb", .. })));
        // Scratch files were cleaned up on the failure path
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_effect_arguments() {
        assert_eq!(
            filter_args(FilterPlan::Bandpass {
                low_cutoff: 200.0,
                high_cutoff: 5000.0
            }),
            vec!["highpass", "200", "lowpass", "5000"]
        );
        assert_eq!(
            eq_args(PeakingBand {
                frequency: 1000.0,
                q: 1.5,
                gain_db: -3.0
            }),
            vec!["equalizer", "1000", "1.5q", "-3"]
        );
        assert_eq!(
            compand_args(CompressorParams::new(-20.0, 4.0))[2],
            "-90,-90,-20,-20,0,-15"
        );
        assert_eq!(reverb_args(EchoParams::from_intensity(1.0))[0], "echo");
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_process_is_killed() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("slow-sox");
        fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        }
        let scratch = dir.path().join("scratch");
        fs::create_dir(&scratch).unwrap();

        let runner = SoxRunner::new(script, Duration::from_millis(200), scratch.clone());
        let started = Instant::now();
        let result = runner.run("compression", &AudioBuffer::filled(16, 0.1), &[]);

        assert!(matches!(result, Err(RemixError::ExternalStage { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_verbose_failure_does_not_stall() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("noisy-sox");
        fs::write(
            &script,
            "#!/bin/sh\nhead -c 262144 /dev/zero | tr '\\0' x >&2\necho >&2\necho 'bad effect' >&2\nexit 2\n",
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        }
        let scratch = dir.path().join("scratch");
        fs::create_dir(&scratch).unwrap();

        let runner = SoxRunner::new(script, Duration::from_secs(20), scratch.clone());
        let started = Instant::now();
        let result = runner.run("eq", &AudioBuffer::filled(16, 0.1), &[]);

        match result {
            Err(RemixError::ExternalStage { stage, reason }) => {
                assert_eq!(stage, "eq");
                assert!(reason.contains("bad effect"), "{}", reason);
                assert!(!reason.contains("timed out"));
            }
            other => panic!("expected an external stage error, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
    }
}
