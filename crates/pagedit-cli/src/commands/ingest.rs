//! Ingest command - turn a document into an editing session.

use std::path::PathBuf;

use clap::Args;

use super::{Context, GlobalOpts, print_json};

/// Arguments for the ingest command.
#[derive(Args)]
pub struct IngestArgs {
    /// Input file (PDF, PNG, JPEG, ...)
    pub input: PathBuf,
}

pub async fn run(args: IngestArgs, opts: GlobalOpts<'_>) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("File not found: {}", args.input.display());
    }

    let ctx = Context::load(&opts)?;
    let ingested = pagedit_core::ingest_file(&ctx.storage, &args.input, ctx.config.storage.render_dpi)?;
    print_json(&ingested)
}
