//! Stemcraft CLI
//!
//! Command-line interface for the stemcraft remix engine.

use clap::Parser;
use env_logger::Env;
use log::info;

use stemcraft::cli::commands::{self, Context};
use stemcraft::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Stemcraft v{}", env!("CARGO_PKG_VERSION"));

    let ctx = Context {
        config: cli.config,
        sessions_dir: cli.sessions_dir,
    };

    match cli.command {
        Some(cmd) => handle_command(&ctx, cmd),
        None => {
            println!("Stemcraft v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(ctx: &Context, cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Render {
            mix,
            stems,
            instructions,
            output,
        } => commands::render(ctx, &mix, &stems, &instructions, output.as_deref()),
        Commands::Attach { session, mix } => commands::attach(ctx, &session, &mix),
        Commands::Remix {
            session,
            stems,
            instructions,
        } => commands::remix(ctx, &session, &stems, &instructions),
        Commands::Feedback {
            session,
            stems,
            delta,
        } => commands::feedback(ctx, &session, &stems, &delta),
        Commands::Separate {
            session,
            stems,
            names,
        } => commands::separate(ctx, &session, &stems, &names),
        Commands::Reset { session } => commands::reset(ctx, &session),
        Commands::Show { session } => commands::show(ctx, &session),
    }
}
