//! Edit commands - apply, update (batch) and restore.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde_json::json;

use pagedit_core::models::edit::FontSizePercent;
use pagedit_core::{EditRequest, FillStrategy, PageLocks, PageditError, Region, RestoreEngine};

use super::{Context, GlobalOpts, print_json};

/// Arguments for the apply command.
#[derive(Args)]
pub struct ApplyArgs {
    /// Session id
    pub session: String,

    /// Page index
    pub page: u32,

    /// Target region as x,y,width,height
    #[arg(short, long, value_parser = parse_region)]
    pub region: Region,

    /// Replacement text (omit to erase only)
    #[arg(short, long, default_value = "")]
    pub text: String,

    /// Font family
    #[arg(long, default_value = "NotoSansTC")]
    pub font: String,

    /// Absolute font size in pixels
    #[arg(long)]
    pub size: Option<u32>,

    /// Font size as a percentage of the fitted size, e.g. 150 or 150%
    #[arg(long)]
    pub size_percent: Option<String>,

    #[arg(long)]
    pub bold: bool,

    #[arg(long)]
    pub italic: bool,

    /// Text colour as #rrggbb
    #[arg(long, default_value = "#000000")]
    pub color: String,

    /// Fill strategy: content_aware (lama) or border_average
    #[arg(long)]
    pub fill: Option<FillStrategy>,

    /// Explicit fill colour for border_average
    #[arg(long)]
    pub fill_color: Option<String>,

    /// Apply over the original page instead of the current one
    #[arg(long)]
    pub restore_first: bool,
}

impl ApplyArgs {
    fn to_request(&self) -> EditRequest {
        let mut edit = EditRequest::new(self.region, self.text.clone())
            .with_font(self.font.clone())
            .with_style(self.bold, self.italic)
            .with_text_color(self.color.clone())
            .with_restore_first(self.restore_first);
        edit.font_size = self.size;
        edit.font_size_percent = self.size_percent.clone().map(FontSizePercent::Text);
        edit.fill_strategy = self.fill;
        edit.fill_color = self.fill_color.clone();
        edit
    }
}

/// Arguments for the update command.
#[derive(Args)]
pub struct UpdateArgs {
    /// Session id
    pub session: String,

    /// Page index
    pub page: u32,

    /// JSON file holding an array of edits
    #[arg(short, long)]
    pub edits: PathBuf,
}

/// Arguments for the restore command.
#[derive(Args)]
pub struct RestoreArgs {
    /// Session id
    pub session: String,

    /// Page index
    pub page: u32,
}

fn parse_region(s: &str) -> Result<Region, String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid region '{}': {}", s, e))?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(Region::from_f64(*x, *y, *w, *h)),
        _ => Err(format!("region needs 4 values (x,y,width,height), got {}", parts.len())),
    }
}

fn uses_content_aware(edits: &[EditRequest], default: FillStrategy) -> bool {
    edits
        .iter()
        .any(|e| e.fill_strategy.unwrap_or(default) == FillStrategy::ContentAware)
}

pub async fn apply(args: ApplyArgs, opts: GlobalOpts<'_>) -> anyhow::Result<()> {
    let ctx = Context::load(&opts)?;
    let page = ctx.page(&args.session, args.page)?;
    let edit = args.to_request();

    let compositor = ctx.compositor(uses_content_aware(
        std::slice::from_ref(&edit),
        ctx.config.fill.default_strategy,
    ))?;
    let result = compositor.apply(&page, &edit)?;

    print_json(&json!({
        "page": result.page,
        "path": ctx.storage.page_path(&result.page),
        "applied": result.applied,
    }))
}

pub async fn update(args: UpdateArgs, opts: GlobalOpts<'_>) -> anyhow::Result<()> {
    let ctx = Context::load(&opts)?;
    let page = ctx.page(&args.session, args.page)?;

    let content = fs::read_to_string(&args.edits)?;
    let edits: Vec<EditRequest> = serde_json::from_str(&content)
        .map_err(|e| PageditError::InvalidEdit(format!("{}: {}", args.edits.display(), e)))?;

    let compositor = ctx.compositor(uses_content_aware(&edits, ctx.config.fill.default_strategy))?;
    let result = compositor.apply_batch(&page, &edits)?;

    print_json(&json!({
        "page": result.page,
        "path": ctx.storage.page_path(&result.page),
        "applied": result.applied,
    }))
}

pub async fn restore(args: RestoreArgs, opts: GlobalOpts<'_>) -> anyhow::Result<()> {
    let ctx = Context::load(&opts)?;
    let page = ctx.page(&args.session, args.page)?;

    let restorer = RestoreEngine::new(ctx.storage.clone(), Arc::new(PageLocks::new()));
    let outcome = restorer.restore(&page)?;

    print_json(&json!({
        "page": page,
        "outcome": outcome,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region() {
        assert_eq!(parse_region("10,20,300,50").unwrap(), Region::new(10, 20, 300, 50));
        assert_eq!(parse_region(" 1.9, 2 ,3,4").unwrap(), Region::new(1, 2, 3, 4));
        assert!(parse_region("1,2,3").is_err());
        assert!(parse_region("a,b,c,d").is_err());
    }
}
