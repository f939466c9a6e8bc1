//! Assemble command - write a session's pages as one document.

use std::path::PathBuf;

use clap::Args;
use console::style;

use pagedit_core::{OutputFormat, assemble_session};

use super::{Context, GlobalOpts};

/// Arguments for the assemble command.
#[derive(Args)]
pub struct AssembleArgs {
    /// Session id
    pub session: String,

    /// Output format: pdf, png, jpg, ...
    #[arg(short, long, default_value = "pdf")]
    pub format: String,

    /// Output file (defaults to <session>.<ext> in the current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn run(args: AssembleArgs, opts: GlobalOpts<'_>) -> anyhow::Result<()> {
    let ctx = Context::load(&opts)?;
    let format: OutputFormat = args.format.parse()?;
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{}.{}", args.session, format.extension())));

    let count = assemble_session(
        ctx.storage.as_ref(),
        &args.session,
        format,
        ctx.config.storage.render_dpi,
        &output,
    )?;

    eprintln!(
        "{} Wrote {} page(s) to {}",
        style("✓").green(),
        count,
        output.display()
    );
    println!("{}", output.display());
    Ok(())
}
