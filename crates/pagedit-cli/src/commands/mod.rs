//! Subcommand implementations.

pub mod assemble;
pub mod config;
pub mod detect;
pub mod edit;
pub mod ingest;
pub mod models;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use pagedit_core::{
    Compositor, CompositorBuilder, ContentAwareFill, DirStorage, LamaInpainter, PageId, PageStorage,
    PageditConfig, PageditError,
};

/// Options shared by every session command.
pub struct GlobalOpts<'a> {
    pub config: Option<&'a str>,
    pub root: Option<&'a Path>,
}

/// Configuration and storage resolved from the global options.
pub struct Context {
    pub config: PageditConfig,
    pub storage: Arc<DirStorage>,
}

impl Context {
    pub fn load(opts: &GlobalOpts<'_>) -> anyhow::Result<Self> {
        let mut config = load_config(opts.config)?;
        if let Some(root) = opts.root {
            config.storage.root = root.to_path_buf();
        }
        let storage = Arc::new(DirStorage::new(&config.storage.root, &config.storage.backup_suffix));
        Ok(Self { config, storage })
    }

    /// Page handle, failing with `not_found` if it does not exist.
    pub fn page(&self, session: &str, index: u32) -> anyhow::Result<PageId> {
        let page = PageId::new(session, index);
        if !self.storage.contains(&page) {
            return Err(PageditError::NotFound(page.to_string()).into());
        }
        Ok(page)
    }

    /// Compositor for this context. The inpainting model is only loaded
    /// when `content_aware` is set; if it cannot be loaded, content-aware
    /// edits fail with a fill error instead.
    pub fn compositor(&self, content_aware: bool) -> anyhow::Result<Compositor> {
        let storage: Arc<dyn PageStorage> = self.storage.clone();
        let mut builder = CompositorBuilder::from_config(storage, &self.config)?;

        if content_aware {
            match LamaInpainter::from_config(&self.config.models) {
                Ok(inpainter) => builder = builder.with_content_aware(ContentAwareFill::new(inpainter)),
                Err(e) => warn!("Content-aware fill disabled: {}", e),
            }
        } else {
            debug!("Skipping inpainting model load");
        }

        Ok(builder.build())
    }
}

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pagedit")
        .join("config.json")
}

/// Load the config named on the command line, else the default file if it
/// exists, else built-in defaults.
pub fn load_config(path: Option<&str>) -> anyhow::Result<PageditConfig> {
    match path {
        Some(path) => Ok(PageditConfig::from_file(Path::new(path))?),
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                Ok(PageditConfig::from_file(&default_path)?)
            } else {
                Ok(PageditConfig::default())
            }
        }
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
