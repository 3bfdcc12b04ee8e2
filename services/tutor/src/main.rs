mod config;
mod console;
mod speech;

use crate::config::{Backend, Config};
use crate::console::{ConsolePrompt, ConsoleReporter, StdinLines, rule};
use anyhow::{Context, Result};
use clap::Parser;
use pronounce_core::ingest::{IngestPolicy, discover};
use pronounce_core::session::SessionRunner;
use pronounce_native_utils::device::{get_available_inputs, get_available_outputs};
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Sentence-by-sentence English pronunciation practice")]
struct Cli {
    /// Folder with practice text files (overrides PRACTICE_DIR)
    #[arg(long)]
    dir: Option<PathBuf>,
    /// Speech backend (overrides PRONOUNCE_BACKEND)
    #[arg(long, value_enum)]
    backend: Option<Backend>,
    /// Print the available audio devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Parse Command-Line Arguments ---
    let args = Cli::parse();

    // --- 2. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load application configuration")?;

    // --- 3. Initialize Logging ---
    // Logs go to stderr so they stay out of the practice console.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    if args.list_devices {
        println!("Input devices:\n{}", get_available_inputs()?);
        println!("Output devices:\n{}", get_available_outputs()?);
        return Ok(());
    }

    if let Some(dir) = args.dir {
        config.practice_dir = dir;
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    config.validate().context("Invalid configuration")?;
    tracing::info!(backend = ?config.backend, dir = %config.practice_dir.display(), "configuration loaded");

    println!("🎤 VoiceTutor - English pronunciation practice 🎤");
    println!("{}", rule());

    // --- 4. Find Practice Material ---
    let discovery = discover(&config.practice_dir).context("Failed to prepare the practice folder")?;
    if let Some(sample) = &discovery.seeded {
        println!("📁 Created the practice folder: {}", config.practice_dir.display());
        println!("📝 Put English text files (.txt) in this folder.");
        println!("📄 Created a sample practice file: {}", sample.display());
    }
    if discovery.sources.is_empty() {
        println!("No text files found in '{}'.", config.practice_dir.display());
        println!("📄 Example file names: practice.txt, daily_conversation.txt");
        return Ok(());
    }
    println!("\n{} practice files found.", discovery.sources.len());

    // --- 5. Connect Speech ---
    let lines = StdinLines::spawn();
    let (mut presenter, mut capture) = speech::connect(&config, &lines)
        .await
        .context("Failed to set up speech")?;

    // --- 6. Run the Session ---
    let mut control = ConsolePrompt::new(lines);
    let mut reporter = ConsoleReporter;
    let mut runner = SessionRunner::new(discovery.sources, IngestPolicy::default(), config.attempt_policy());

    tokio::select! {
        summary = runner.run(presenter.as_mut(), capture.as_mut(), &mut control, &mut reporter) => {
            tracing::info!(?summary, "session ended");
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n\nExiting the program.");
            tracing::info!("Received Ctrl-C, shutting down...");
        }
    }
    Ok(())
}
