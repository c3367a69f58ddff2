//! CLI Command Implementations

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use log::info;

use crate::config::EngineConfig;
use crate::remix::{
    FeedbackOutcome, InstructionSet, RemixArtifact, RemixEngine, RenderOutcome,
    StemDirectorySeparator,
};
use crate::session::{FeedbackDelta, JsonFileStore};

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Option<PathBuf>,
    pub sessions_dir: PathBuf,
}

impl Context {
    fn load_config(&self) -> Result<EngineConfig> {
        let config = match &self.config {
            Some(path) => EngineConfig::from_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => EngineConfig::from_env()?,
        };
        Ok(config)
    }

    fn engine(&self, stems_dir: &Path, output: Option<&Path>) -> Result<RemixEngine> {
        let mut config = self.load_config()?;
        if let Some(dir) = output {
            config.output_dir = Some(dir.to_path_buf());
        }
        let store = JsonFileStore::open(&self.sessions_dir).with_context(|| {
            format!("Failed to open session store: {}", self.sessions_dir.display())
        })?;
        Ok(RemixEngine::new(
            config,
            Arc::new(StemDirectorySeparator::new(stems_dir)),
            Arc::new(store),
        )?)
    }

    /// Engine for commands that never separate
    fn session_engine(&self) -> Result<RemixEngine> {
        self.engine(Path::new("."), None)
    }
}

fn read_instructions(path: &Path) -> Result<InstructionSet> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read instructions: {}", path.display()))?;
    InstructionSet::from_json(&json)
        .with_context(|| format!("Invalid instructions in {}", path.display()))
}

fn read_delta(path: &Path) -> Result<FeedbackDelta> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read feedback: {}", path.display()))?;
    FeedbackDelta::from_json(&json).with_context(|| format!("Invalid feedback in {}", path.display()))
}

fn print_artifact(artifact: &RemixArtifact) {
    match &artifact.path {
        Some(path) => println!("Wrote {}", path.display()),
        None => println!("Rendered {} (no output directory configured)", artifact.file_name),
    }
    println!("Status: {:?}", artifact.status);
    if !artifact.issues.is_empty() {
        println!("Edits that did not apply:");
        for issue in &artifact.issues {
            let stem = issue.stem.as_deref().unwrap_or("mix");
            println!("  [{}] {} {}: {}", issue.code, stem, issue.stage, issue.message);
        }
    }
}

fn print_outcome(outcome: &RenderOutcome) {
    match outcome {
        RenderOutcome::Rendered(artifact) => print_artifact(artifact),
        RenderOutcome::NothingToRemix => println!("Nothing to remix: the instructions touch no stem."),
    }
}

/// Render a mix without a session.
pub fn render(
    ctx: &Context,
    mix: &Path,
    stems: &Path,
    instructions: &Path,
    output: Option<&Path>,
) -> Result<()> {
    info!("Rendering {}", mix.display());
    let engine = ctx.engine(stems, output)?;
    let instructions = read_instructions(instructions)?;
    print_outcome(&engine.render_remix(mix, &instructions)?);
    Ok(())
}

pub fn attach(ctx: &Context, session: &str, mix: &Path) -> Result<()> {
    ctx.session_engine()?.attach_mix(session, mix)?;
    println!("Session {} now uses {}", session, mix.display());
    Ok(())
}

pub fn remix(ctx: &Context, session: &str, stems: &Path, instructions: &Path) -> Result<()> {
    let engine = ctx.engine(stems, None)?;
    let instructions = read_instructions(instructions)?;
    print_outcome(&engine.remix_session(session, &instructions)?);
    Ok(())
}

pub fn feedback(ctx: &Context, session: &str, stems: &Path, delta: &Path) -> Result<()> {
    let engine = ctx.engine(stems, None)?;
    let delta = read_delta(delta)?;
    match engine.apply_feedback(session, &delta)? {
        FeedbackOutcome::Remixed { outcome, summary } => {
            println!("{}", summary);
            print_outcome(&outcome);
        }
        FeedbackOutcome::NoChange { message } => println!("{}", message),
    }
    Ok(())
}

pub fn separate(ctx: &Context, session: &str, stems: &Path, names: &[String]) -> Result<()> {
    let engine = ctx.engine(stems, None)?;
    let report = engine.separate_stems(session, names)?;

    for stem in &report.stems {
        match &stem.path {
            Some(path) => println!("{}: {}", stem.stem, path.display()),
            None => println!("{}: {} (no output directory configured)", stem.stem, stem.file_name),
        }
    }
    for issue in &report.issues {
        println!("Skipped {}: {}", issue.stem.as_deref().unwrap_or("?"), issue.message);
    }
    Ok(())
}

pub fn reset(ctx: &Context, session: &str) -> Result<()> {
    ctx.session_engine()?.reset_session(session)?;
    println!("Session {} cleared", session);
    Ok(())
}

pub fn show(ctx: &Context, session: &str) -> Result<()> {
    match ctx.session_engine()?.session_state(session)? {
        Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
        None => println!("No session named {}", session),
    }
    Ok(())
}
