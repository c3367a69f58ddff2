//! CLI Module
//!
//! Command-line front end for rendering remixes and driving sessions.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stemcraft - stem-aware remix renderer
#[derive(Parser, Debug)]
#[command(name = "stemcraft")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding session state
    #[arg(long, global = true, default_value = ".stemcraft/sessions")]
    pub sessions_dir: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render an instruction set against a mix
    Render {
        /// The mix to remix
        mix: PathBuf,

        /// Directory of pre-separated `<stem>.wav` files
        #[arg(short, long)]
        stems: PathBuf,

        /// Instruction set (JSON)
        #[arg(short, long)]
        instructions: PathBuf,

        /// Output directory, overriding the configuration
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Bind a mix to a session
    Attach {
        session: String,
        mix: PathBuf,
    },

    /// Remix a session's mix and keep the instructions as its baseline
    Remix {
        session: String,

        #[arg(short, long)]
        stems: PathBuf,

        #[arg(short, long)]
        instructions: PathBuf,
    },

    /// Adjust the last remix of a session
    Feedback {
        session: String,

        #[arg(short, long)]
        stems: PathBuf,

        /// Feedback delta (JSON)
        #[arg(short, long)]
        delta: PathBuf,
    },

    /// Export stems of a session's mix
    Separate {
        session: String,

        #[arg(short, long)]
        stems: PathBuf,

        /// Stems to export, comma separated; all default stems when omitted
        #[arg(short, long, value_delimiter = ',')]
        names: Vec<String>,
    },

    /// Forget a session
    Reset { session: String },

    /// Print a session's state
    Show { session: String },
}
