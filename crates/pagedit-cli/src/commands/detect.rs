//! Detect command - find text blocks on a page.

use clap::Args;

use pagedit_core::{MockDetector, OcrDetector, TextDetector, detect_page};

use super::{Context, GlobalOpts, print_json};

/// Arguments for the detect command.
#[derive(Args)]
pub struct DetectArgs {
    /// Session id
    pub session: String,

    /// Page index
    pub page: u32,

    /// Return fixed demo blocks instead of running OCR
    #[arg(long)]
    pub mock: bool,
}

pub async fn run(args: DetectArgs, opts: GlobalOpts<'_>) -> anyhow::Result<()> {
    let ctx = Context::load(&opts)?;
    let page = ctx.page(&args.session, args.page)?;

    let detector: Box<dyn TextDetector> = if args.mock {
        Box::new(MockDetector)
    } else {
        Box::new(OcrDetector::from_config(&ctx.config.models).map_err(pagedit_core::PageditError::from)?)
    };

    let blocks = detect_page(detector.as_ref(), ctx.storage.as_ref(), &page)?;
    print_json(&blocks)
}
