//! Session and feedback tests
//!
//! Baselines, the feedback diff, and per-session serialization, driven
//! through the public engine API.

mod common;

use std::sync::Arc;
use std::thread;

use approx::assert_abs_diff_eq;
use common::*;
use pretty_assertions::assert_eq;
use stemcraft::engine::AudioBuffer;
use stemcraft::session::{
    JsonFileStore, PitchChange, ReverbChange, SessionTask, VolumeChange,
};
use stemcraft::{
    EngineConfig, FeedbackDelta, FeedbackOutcome, InstructionSet, RemixEngine, RemixError,
    RenderOutcome,
};
use tempfile::{tempdir, TempDir};
use test_case::test_case;

fn session_fixture() -> (RemixEngine, Arc<FakeSeparator>, TempDir) {
    let dir = tempdir().unwrap();
    let mix_path = write_mix(&dir, &AudioBuffer::filled(4410, 0.2));
    let separator = Arc::new(
        FakeSeparator::new()
            .with_stem("vocals", &AudioBuffer::filled(4410, 0.1))
            .with_stem("drums", &AudioBuffer::filled(4410, 0.05)),
    );
    let engine = engine(Arc::clone(&separator));
    engine.attach_mix("session-1", &mix_path).unwrap();
    (engine, separator, dir)
}

fn louder_vocals() -> FeedbackDelta {
    FeedbackDelta::new().volume("vocals", VolumeChange::Louder)
}

fn remixed(outcome: FeedbackOutcome) -> (RenderOutcome, String) {
    match outcome {
        FeedbackOutcome::Remixed { outcome, summary } => (outcome, summary),
        FeedbackOutcome::NoChange { message } => panic!("expected a remix, got: {}", message),
    }
}

#[test]
fn test_repeated_louder_climbs_then_clamps() {
    let (engine, _separator, _dir) = session_fixture();
    engine
        .remix_session("session-1", &InstructionSet::new().with_volume("vocals", 1.0))
        .unwrap();

    for expected in [1.3, 1.6, 1.9, 2.0] {
        remixed(engine.apply_feedback("session-1", &louder_vocals()).unwrap());
        let last = engine.get_last_instructions("session-1").unwrap().unwrap();
        assert_abs_diff_eq!(last.volumes["vocals"], expected, epsilon = 1e-6);
    }

    let outcome = engine.apply_feedback("session-1", &louder_vocals()).unwrap();
    assert!(matches!(outcome, FeedbackOutcome::NoChange { .. }));
}

#[test]
fn test_feedback_render_uses_new_volume() {
    let (engine, _separator, _dir) = session_fixture();
    engine
        .remix_session("session-1", &InstructionSet::new().with_volume("vocals", 1.0))
        .unwrap();

    let (outcome, summary) = remixed(engine.apply_feedback("session-1", &louder_vocals()).unwrap());
    assert_eq!(summary, "I boosted vocals");

    // remainder 0.1 + vocals 0.1 * 1.3
    let artifact = outcome.artifact().unwrap();
    assert_abs_diff_eq!(artifact.buffer.samples[0][0], 0.23, epsilon = 1e-6);
    assert!(artifact.file_name.starts_with("remix_vol_"));
}

#[test]
fn test_feedback_without_baseline_is_rejected() {
    let (engine, separator, _dir) = session_fixture();
    let result = engine.apply_feedback("session-1", &louder_vocals());

    assert!(matches!(result, Err(RemixError::NoBaseline { .. })));
    assert_eq!(separator.call_count(), 0);
    assert!(engine.get_last_instructions("session-1").unwrap().is_none());
}

#[test]
fn test_no_op_feedback_does_not_render() {
    let (engine, separator, _dir) = session_fixture();
    engine
        .remix_session("session-1", &InstructionSet::new().with_volume("vocals", 1.2))
        .unwrap();
    let calls = separator.call_count();

    let delta = FeedbackDelta::new()
        .reverb("drums", ReverbChange::Less)
        .pitch("vocals", PitchChange::Reset);
    let outcome = engine.apply_feedback("session-1", &delta).unwrap();

    assert!(matches!(outcome, FeedbackOutcome::NoChange { .. }));
    assert_eq!(separator.call_count(), calls);
}

#[test]
fn test_nothing_to_remix_keeps_session_uninitialized() {
    let (engine, _separator, _dir) = session_fixture();
    let outcome = engine
        .remix_session("session-1", &InstructionSet::new())
        .unwrap();

    assert!(matches!(outcome, RenderOutcome::NothingToRemix));
    assert!(engine.get_last_instructions("session-1").unwrap().is_none());
}

#[test]
fn test_applied_remix_sets_baseline_and_task() {
    let (engine, _separator, _dir) = session_fixture();
    let set = InstructionSet::new()
        .with_volume("vocals", 1.2)
        .with_reverb("drums", 0.3);
    engine.remix_session("session-1", &set).unwrap();

    let state = engine.session_state("session-1").unwrap().unwrap();
    assert_eq!(state.last_instructions, Some(set));
    assert_eq!(state.active_task, Some(SessionTask::Remix));
}

#[test]
fn test_unknown_session_has_no_mix() {
    let (engine, _separator, _dir) = session_fixture();
    let result = engine.remix_session("other", &InstructionSet::new().with_volume("vocals", 1.2));
    assert!(matches!(result, Err(RemixError::MissingMix { .. })));
}

#[test]
fn test_reset_forgets_baseline() {
    let (engine, _separator, _dir) = session_fixture();
    engine
        .remix_session("session-1", &InstructionSet::new().with_volume("vocals", 1.2))
        .unwrap();
    engine.reset_session("session-1").unwrap();

    assert!(engine.get_mix_path("session-1").unwrap().is_none());
    assert!(matches!(
        engine.apply_feedback("session-1", &louder_vocals()),
        Err(RemixError::NoBaseline { .. })
    ));
}

#[test]
fn test_concurrent_feedback_on_one_session_is_serialized() {
    let (engine, _separator, _dir) = session_fixture();
    engine
        .remix_session("session-1", &InstructionSet::new().with_volume("vocals", 1.0))
        .unwrap();
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let delta = FeedbackDelta::new().volume("vocals", VolumeChange::SlightlyLouder);
                engine.apply_feedback("session-1", &delta).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let last = engine.get_last_instructions("session-1").unwrap().unwrap();
    assert_abs_diff_eq!(last.volumes["vocals"], 1.2, epsilon = 1e-6);
}

#[test]
fn test_sessions_survive_restart() {
    let dir = tempdir().unwrap();
    let store_dir = dir.path().join("sessions");
    let mix_path = write_mix(&dir, &AudioBuffer::filled(4410, 0.2));
    let separator = Arc::new(FakeSeparator::new().with_stem("vocals", &AudioBuffer::filled(4410, 0.1)));

    let first = RemixEngine::new(
        EngineConfig::default(),
        separator.clone(),
        Arc::new(JsonFileStore::open(&store_dir).unwrap()),
    )
    .unwrap();
    first.attach_mix("persisted", &mix_path).unwrap();
    first
        .remix_session("persisted", &InstructionSet::new().with_volume("vocals", 0.8))
        .unwrap();
    drop(first);

    let second = RemixEngine::new(
        EngineConfig::default(),
        separator,
        Arc::new(JsonFileStore::open(&store_dir).unwrap()),
    )
    .unwrap();
    let outcome = second
        .apply_feedback(
            "persisted",
            &FeedbackDelta::new().volume("vocals", VolumeChange::SlightlySofter),
        )
        .unwrap();
    remixed(outcome);

    let last = second.get_last_instructions("persisted").unwrap().unwrap();
    assert_abs_diff_eq!(last.volumes["vocals"], 0.7, epsilon = 1e-6);
}

#[test]
fn test_separate_reports_unsupported_and_sets_task() {
    let (engine, _separator, _dir) = session_fixture();
    let report = engine
        .separate_stems("session-1", &["vocals".to_string(), "theremin".to_string()])
        .unwrap();

    assert_eq!(report.stems.len(), 1);
    assert_eq!(report.stems[0].stem, "vocals");
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].stem.as_deref(), Some("theremin"));

    let state = engine.session_state("session-1").unwrap().unwrap();
    assert_eq!(state.active_task, Some(SessionTask::Separation));
}

#[test_case(r#"{"volumes": {"vocals": "quieter-ish"}}"# ; "unknown volume label")]
#[test_case(r#"{"reverb": {"vocals": "lots"}}"# ; "unknown reverb label")]
#[test_case(r#"{"pitch_shift": {"vocals": "up"}}"# ; "non numeric pitch")]
#[test_case(r#"{"compression": {"drums": "extreme"}}"# ; "unknown compression level")]
fn test_invalid_feedback_labels(json: &str) {
    assert!(FeedbackDelta::from_json(json).is_err());
}
