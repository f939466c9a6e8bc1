//! CLI application for erasing and rewriting text on document pages.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use pagedit_core::PageditError;

use commands::{GlobalOpts, assemble, config, detect, edit, ingest, models};

/// Page editor - replace text on scanned document pages
#[derive(Parser)]
#[command(name = "pagedit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Session storage root (overrides storage.root)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a PDF or image into a new session
    Ingest(ingest::IngestArgs),

    /// Detect text blocks on a page
    Detect(detect::DetectArgs),

    /// Erase a region and draw replacement text
    Apply(edit::ApplyArgs),

    /// Apply a list of edits from a JSON file in one pass
    Update(edit::UpdateArgs),

    /// Restore a page from its backup
    Restore(edit::RestoreArgs),

    /// Assemble session pages into a PDF or image
    Assemble(assemble::AssembleArgs),

    /// Manage inpainting and OCR models
    Models(models::ModelsArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // stdout carries JSON results
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let opts = GlobalOpts {
        config: cli.config.as_deref(),
        root: cli.root.as_deref(),
    };

    let result = match cli.command {
        Commands::Ingest(args) => ingest::run(args, opts).await,
        Commands::Detect(args) => detect::run(args, opts).await,
        Commands::Apply(args) => edit::apply(args, opts).await,
        Commands::Update(args) => edit::update(args, opts).await,
        Commands::Restore(args) => edit::restore(args, opts).await,
        Commands::Assemble(args) => assemble::run(args, opts).await,
        Commands::Models(args) => models::run(args, cli.config.as_deref()).await,
        Commands::Config(args) => config::run(args, cli.config.as_deref()).await,
    };

    if let Err(err) = result {
        match err.downcast_ref::<PageditError>() {
            Some(e) => eprintln!("{}", serde_json::to_string(&e.report())?),
            None => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }
    Ok(())
}
