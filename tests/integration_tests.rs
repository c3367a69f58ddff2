//! Integration Tests
//!
//! End-to-end renders through the remix engine with an in-memory separator.

mod common;

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use common::*;
use stemcraft::engine::{import_audio, AudioBuffer, RawWaveform};
use stemcraft::remix::{reconstruct_remainder, CompressionLevel, EqSettings, FilterSettings};
use stemcraft::{EngineConfig, InstructionSet, RemixError, RenderOutcome, RenderStatus};
use tempfile::tempdir;

fn rendered(outcome: RenderOutcome) -> stemcraft::RemixArtifact {
    match outcome {
        RenderOutcome::Rendered(artifact) => artifact,
        RenderOutcome::NothingToRemix => panic!("expected a render"),
    }
}

/// Four stems whose sum is the mix
fn band_fixture(len: usize) -> (AudioBuffer, FakeSeparator, Vec<AudioBuffer>) {
    let vocals = sine(440.0, 0.2, len);
    let drums = sine(110.0, 0.15, len);
    let bass = sine(55.0, 0.2, len);
    let other = sine(880.0, 0.1, len);
    let mix = sum(&[&vocals, &drums, &bass, &other]);
    let separator = FakeSeparator::new()
        .with_stem("vocals", &vocals)
        .with_stem("drums", &drums)
        .with_stem("bass", &bass)
        .with_stem("other", &other);
    (mix, separator, vec![vocals, drums, bass, other])
}

// === Scenarios ===

#[test]
fn test_vocal_boost_scenario() {
    let dir = tempdir().unwrap();
    let mix_path = write_mix(&dir, &AudioBuffer::filled(44100, 0.1));
    let separator = Arc::new(FakeSeparator::new().with_stem("vocals", &AudioBuffer::filled(44100, 0.1)));
    let engine = engine(separator);

    let set = InstructionSet::new().with_volume("vocals", 1.2);
    let artifact = rendered(engine.render_remix(&mix_path, &set).unwrap());

    assert_eq!(artifact.status, RenderStatus::Applied);
    assert!(artifact.issues.is_empty());
    assert!(artifact.file_name.starts_with("remix_vol_"));
    assert_eq!(artifact.buffer.len(), 44100);
    assert_all_close(&artifact.buffer, &AudioBuffer::filled(44100, 0.12), 1e-6);
}

#[test]
fn test_default_instructions_reproduce_mix() {
    let dir = tempdir().unwrap();
    let (mix, separator, _) = band_fixture(22050);
    let mix_path = write_mix(&dir, &mix);
    let engine = engine(Arc::new(separator));

    let set = InstructionSet::new()
        .with_volume("vocals", 1.0)
        .with_volume("drums", 1.0)
        .with_reverb("bass", 0.0)
        .with_pitch_shift("other", 0);
    let artifact = rendered(engine.render_remix(&mix_path, &set).unwrap());

    assert!(artifact.file_name.starts_with("remix_basic_"));
    assert_all_close(&artifact.buffer, &mix, 1e-5);
}

#[test]
fn test_edits_are_confined_to_targets() {
    let dir = tempdir().unwrap();
    let (mix, separator, stems) = band_fixture(22050);
    let mix_path = write_mix(&dir, &mix);
    let engine = engine(Arc::new(separator));

    let set = InstructionSet::new().with_volume("vocals", 0.5);
    let artifact = rendered(engine.render_remix(&mix_path, &set).unwrap());

    // The remainder is exactly mix minus the separated vocals
    let remainder = reconstruct_remainder(&mix, &[&stems[0]]).unwrap();
    let mut quiet_vocals = stems[0].clone();
    quiet_vocals.scale(0.5);
    let mut expected = remainder.clone();
    expected.add_assign(&quiet_vocals);
    assert_all_close(&artifact.buffer, &expected, 1e-6);

    // Take the vocals away and the drums, bass and other are what they were
    let untouched = sum(&[&stems[1], &stems[2], &stems[3]]);
    let mut leftover = artifact.buffer.clone();
    leftover.sub_assign(&quiet_vocals);
    assert_all_close(&leftover, &untouched, 1e-5);
}

#[test]
fn test_output_is_clipped() {
    let dir = tempdir().unwrap();
    let mix_path = write_mix(&dir, &AudioBuffer::filled(8820, 0.9));
    let separator = Arc::new(FakeSeparator::new().with_stem("vocals", &AudioBuffer::filled(8820, 0.9)));
    let engine = engine(separator);

    let set = InstructionSet::new()
        .with_volume("vocals", 2.0)
        .with_reverb("vocals", 1.0)
        .with_global_reverb(1.0);
    let artifact = rendered(engine.render_remix(&mix_path, &set).unwrap());

    assert!(artifact.buffer.peak() <= 1.0);
    assert_eq!(
        artifact.tags,
        vec!["vol".to_string(), "reverb".to_string(), "globalreverb".to_string()]
    );
}

#[test]
fn test_out_of_range_values_are_clamped() {
    let set = InstructionSet::from_json(r#"{"volumes": {"vocals": 3.5}, "reverb": {"drums": -1.0}}"#)
        .unwrap();
    assert_eq!(set.volumes["vocals"], 2.0);
    assert_eq!(set.reverb["drums"], 0.0);
}

// === Short circuits ===

#[test]
fn test_no_targets_skips_separation() {
    let dir = tempdir().unwrap();
    let mix_path = write_mix(&dir, &AudioBuffer::filled(4410, 0.1));
    let separator = Arc::new(FakeSeparator::new());
    let engine = engine(Arc::clone(&separator));

    let outcome = engine.render_remix(&mix_path, &InstructionSet::new()).unwrap();
    assert!(matches!(outcome, RenderOutcome::NothingToRemix));

    let reverb_only = InstructionSet::new().with_global_reverb(0.5);
    let artifact = rendered(engine.render_remix(&mix_path, &reverb_only).unwrap());
    assert_eq!(artifact.status, RenderStatus::Applied);
    assert_eq!(artifact.tags, vec!["globalreverb".to_string()]);
    assert_eq!(separator.call_count(), 0);
}

// === Recovered failures ===

#[test]
fn test_failed_pitch_shift_falls_back_to_mix() {
    let dir = tempdir().unwrap();
    let mix = sine(220.0, 0.3, 4410);
    let mix_path = write_mix(&dir, &mix);
    let separator = Arc::new(FakeSeparator::new().with_stem("vocals", &mix));
    let engine = engine(separator);

    let set = InstructionSet::new().with_pitch_shift("vocals", 30);
    let artifact = rendered(engine.render_remix(&mix_path, &set).unwrap());

    assert_eq!(artifact.status, RenderStatus::NoEditsApplied);
    assert_eq!(artifact.buffer, mix);
    assert_eq!(artifact.issues.len(), 1);
    assert_eq!(artifact.issues[0].code, "PITCH_SHIFT_ERROR");
    assert_eq!(artifact.issues[0].stem.as_deref(), Some("vocals"));
}

#[test]
fn test_failed_stem_does_not_block_others() {
    let dir = tempdir().unwrap();
    let mix_path = write_mix(&dir, &AudioBuffer::filled(4410, 0.3));
    let separator = Arc::new(
        FakeSeparator::new()
            .with_stem("vocals", &AudioBuffer::filled(4410, 0.1))
            .with_stem("drums", &AudioBuffer::filled(4410, 0.1)),
    );
    let engine = engine(separator);

    let set = InstructionSet::new()
        .with_pitch_shift("vocals", -40)
        .with_volume("drums", 2.0);
    let artifact = rendered(engine.render_remix(&mix_path, &set).unwrap());

    // remainder 0.1 + drums 0.2; the vocals are dropped
    assert_eq!(artifact.status, RenderStatus::Applied);
    assert_abs_diff_eq!(artifact.buffer.samples[0][100], 0.3, epsilon = 1e-6);
    assert_eq!(artifact.issues.len(), 1);
}

#[test]
fn test_separator_rejection_drops_only_that_stem() {
    let dir = tempdir().unwrap();
    let mix_path = write_mix(&dir, &AudioBuffer::filled(4410, 0.2));
    let separator = Arc::new(FakeSeparator::new().with_stem("vocals", &AudioBuffer::filled(4410, 0.1)));
    let engine = engine(Arc::clone(&separator));

    let set = InstructionSet::new()
        .with_volume("vocals", 0.0)
        .with_volume("bass", 1.5);
    let artifact = rendered(engine.render_remix(&mix_path, &set).unwrap());

    assert_eq!(separator.call_count(), 2);
    assert_eq!(separator.calls.lock()[1], vec!["vocals".to_string()]);
    assert_eq!(artifact.issues[0].code, "UNSUPPORTED_STEM");
    assert_eq!(artifact.issues[0].stem.as_deref(), Some("bass"));
    assert_abs_diff_eq!(artifact.buffer.samples[1][0], 0.1, epsilon = 1e-6);
}

#[test]
fn test_incomplete_eq_skips_only_that_stage() {
    let dir = tempdir().unwrap();
    let mix_path = write_mix(&dir, &AudioBuffer::filled(4410, 0.2));
    let separator = Arc::new(FakeSeparator::new().with_stem("vocals", &AudioBuffer::filled(4410, 0.2)));
    let engine = engine(separator);

    let mut set = InstructionSet::new().with_volume("vocals", 0.5);
    set.eq.insert(
        "vocals".to_string(),
        EqSettings {
            frequency: Some(2000.0),
            width: None,
            gain_db: None,
        },
    );
    let artifact = rendered(engine.render_remix(&mix_path, &set).unwrap());

    assert_eq!(artifact.status, RenderStatus::Applied);
    assert_eq!(artifact.issues.len(), 1);
    assert_eq!(artifact.issues[0].code, "INCOMPLETE_PARAMETER");
    assert_eq!(artifact.issues[0].stage, "eq");
    assert_abs_diff_eq!(artifact.buffer.samples[0][10], 0.1, epsilon = 1e-6);
}

#[test]
fn test_full_chain_stays_finite_and_bounded() {
    let dir = tempdir().unwrap();
    let (mix, separator, _) = band_fixture(22050);
    let mix_path = write_mix(&dir, &mix);
    let engine = engine(Arc::new(separator));

    let set = InstructionSet::new()
        .with_volume("vocals", 1.4)
        .with_reverb("vocals", 0.6)
        .with_pitch_shift("vocals", 3)
        .with_eq("vocals", EqSettings::new(3000.0, 1.2, 4.0))
        .with_filter(
            "drums",
            FilterSettings::Bandpass {
                low_cutoff: Some(80.0),
                high_cutoff: Some(5000.0),
            },
        )
        .with_compression("drums", CompressionLevel::High)
        .with_global_reverb(0.2);
    let artifact = rendered(engine.render_remix(&mix_path, &set).unwrap());

    assert_eq!(artifact.status, RenderStatus::Applied);
    assert!(artifact.issues.is_empty(), "{:?}", artifact.issues);
    assert!(artifact.buffer.is_finite());
    assert!(artifact.buffer.peak() <= 1.0);
    assert_eq!(artifact.buffer.len(), mix.len());
}

// === Fatal errors ===

#[test]
fn test_separation_failure_aborts() {
    let dir = tempdir().unwrap();
    let mix_path = write_mix(&dir, &AudioBuffer::filled(4410, 0.2));
    let separator = Arc::new(FakeSeparator::new().with_stem("vocals", &AudioBuffer::filled(4410, 0.1)));
    *separator.fail_with.lock() = Some("model crashed".to_string());
    let engine = engine(separator);

    let result = engine.render_remix(&mix_path, &InstructionSet::new().with_volume("vocals", 0.5));
    assert!(matches!(result, Err(RemixError::Separation { .. })));
}

#[test]
fn test_bad_stem_shape_aborts() {
    let dir = tempdir().unwrap();
    let mix_path = write_mix(&dir, &AudioBuffer::filled(100, 0.2));
    let six_channels = RawWaveform {
        shape: vec![6, 100],
        data: vec![0.0; 600],
        sample_rate: 44100,
    };
    let separator = Arc::new(FakeSeparator::new().with_raw("vocals", six_channels));
    let engine = engine(separator);

    let result = engine.render_remix(&mix_path, &InstructionSet::new().with_volume("vocals", 0.5));
    assert!(matches!(result, Err(RemixError::ShapeMismatch { .. })));
}

#[test]
fn test_missing_mix_file() {
    let engine = engine(Arc::new(FakeSeparator::new()));
    let result = engine.render_remix(
        std::path::Path::new("/no/such/mix.wav"),
        &InstructionSet::new().with_volume("vocals", 0.5),
    );
    assert!(matches!(result, Err(RemixError::FileNotFound { .. })));
}

// === Output ===

#[test]
fn test_mono_batched_stem_is_normalized() {
    let dir = tempdir().unwrap();
    let mix_path = write_mix(&dir, &AudioBuffer::filled(1000, 0.2));
    let batched_mono = RawWaveform {
        shape: vec![1, 1, 1000],
        data: vec![0.1; 1000],
        sample_rate: 44100,
    };
    let separator = Arc::new(FakeSeparator::new().with_raw("bass", batched_mono));
    let engine = engine(separator);

    let artifact = rendered(
        engine
            .render_remix(&mix_path, &InstructionSet::new().with_volume("bass", 0.0))
            .unwrap(),
    );
    assert_eq!(artifact.buffer.channels(), 2);
    assert_abs_diff_eq!(artifact.buffer.samples[1][500], 0.1, epsilon = 1e-6);
}

#[test]
fn test_artifact_written_to_output_dir() {
    let dir = tempdir().unwrap();
    let out = tempdir().unwrap();
    let mix_path = write_mix(&dir, &AudioBuffer::filled(4410, 0.1));
    let separator = Arc::new(FakeSeparator::new().with_stem("drums", &AudioBuffer::filled(4410, 0.05)));
    let config = EngineConfig {
        output_dir: Some(out.path().to_path_buf()),
        ..EngineConfig::default()
    };
    let engine = engine_with_config(separator, config);

    let set = InstructionSet::new().with_compression("drums", CompressionLevel::Medium);
    let artifact = rendered(engine.render_remix(&mix_path, &set).unwrap());

    let path = artifact.path.expect("output path");
    assert_eq!(path.parent(), Some(out.path()));
    assert!(artifact.file_name.starts_with("remix_compression_"));

    let written = import_audio(&path).unwrap();
    assert_eq!(written.channels(), 2);
    assert_eq!(written.sample_rate, 44100);
    assert_eq!(written.len(), 4410);
}
