//! mixbus CLI - render, play and inspect mixbus projects.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mixbus")]
#[command(author, version, about = "mixbus mixing engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a project to a WAV file
    Render(commands::render::RenderArgs),

    /// Play a project on an output device
    Play(commands::play::PlayArgs),

    /// Validate a project and print its render order
    Check(commands::check::CheckArgs),

    /// List available effects and instruments
    Effects(commands::effects::EffectsArgs),

    /// List audio output devices
    Devices(commands::devices::DevicesArgs),

    /// Write a starter project
    New(commands::new::NewArgs),
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output stays clean on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    tracing_log::LogTracer::init().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => commands::render::run(args),
        Commands::Play(args) => commands::play::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Effects(args) => commands::effects::run(args),
        Commands::Devices(args) => commands::devices::run(args),
        Commands::New(args) => commands::new::run(args),
    }
}
