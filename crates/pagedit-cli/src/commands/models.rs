//! Models command - download and manage inpainting and OCR models.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use console::style;
use futures_util::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use pagedit_core::models::config::ModelConfig;

use super::load_config;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List known models
    List,

    /// Download models
    Download(DownloadArgs),

    /// Check model status
    Status,

    /// Remove downloaded models
    Clean,
}

/// Model groups that can be fetched separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelGroup {
    /// LaMa inpainting model for content-aware fill
    Inpaint,
    /// PaddleOCR detection + recognition models
    Ocr,
}

#[derive(Args)]
struct DownloadArgs {
    /// Only download this group
    #[arg(short, long, value_enum)]
    only: Option<ModelGroup>,

    /// Output directory (defaults to models.model_dir)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force re-download even if files exist
    #[arg(long)]
    force: bool,

    /// Override the inpainting model URL
    #[arg(long)]
    inpaint_url: Option<String>,
}

/// A downloadable model file.
#[derive(Clone)]
struct ModelInfo {
    group: ModelGroup,
    filename: String,
    size_bytes: u64,
    description: &'static str,
    url: String,
}

/// Known model files, named as the configuration expects them.
fn model_catalog(config: &ModelConfig) -> Vec<ModelInfo> {
    const OCR_BASE: &str = "https://github.com/jakubmatias/incr/raw/main/models/mobile";
    vec![
        ModelInfo {
            group: ModelGroup::Inpaint,
            filename: config.inpaint_model.clone(),
            size_bytes: 208_000_000,
            description: "LaMa inpainting (fp32)",
            url: "https://huggingface.co/Carve/LaMa-ONNX/resolve/main/lama_fp32.onnx".to_string(),
        },
        ModelInfo {
            group: ModelGroup::Ocr,
            filename: config.detection_model.clone(),
            size_bytes: 4_500_000,
            description: "PP-OCRv3 mobile detection",
            url: format!("{}/det.onnx", OCR_BASE),
        },
        ModelInfo {
            group: ModelGroup::Ocr,
            filename: config.recognition_model.clone(),
            size_bytes: 7_500_000,
            description: "Latin recognition",
            url: format!("{}/latin_rec.onnx", OCR_BASE),
        },
        ModelInfo {
            group: ModelGroup::Ocr,
            filename: config.dictionary.clone(),
            size_bytes: 2_000,
            description: "Latin character dictionary",
            url: format!("{}/latin_dict.txt", OCR_BASE),
        },
    ]
}

pub async fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?.models;
    match args.command {
        ModelsCommand::List => list_models(&config),
        ModelsCommand::Download(download_args) => download_models(&config, download_args).await,
        ModelsCommand::Status => check_status(&config, &config.model_dir),
        ModelsCommand::Clean => clean_models(&config),
    }
}

fn list_models(config: &ModelConfig) -> anyhow::Result<()> {
    println!("{}", style("Available Models").bold());
    println!();

    for model in model_catalog(config) {
        println!(
            "    {:<20} {:>10}  {}",
            model.filename,
            format_size(model.size_bytes),
            model.description
        );
    }

    println!();
    println!("Commands:");
    println!("  pagedit models download              Download all models");
    println!("  pagedit models download -o inpaint   Download only the inpainting model");
    Ok(())
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {spinner:.green} {msg:<30} [{bar:25.cyan/blue}] {bytes}/{total_bytes}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// On-disk state of one model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileState {
    Missing,
    /// Present but less than half the expected size.
    Partial(u64),
    Ready(u64),
}

impl ModelInfo {
    fn state(&self, dir: &Path) -> FileState {
        match fs::metadata(dir.join(&self.filename)) {
            Err(_) => FileState::Missing,
            Ok(meta) if meta.len() > self.size_bytes / 2 => FileState::Ready(meta.len()),
            Ok(meta) => FileState::Partial(meta.len()),
        }
    }
}

async fn download_models(config: &ModelConfig, args: DownloadArgs) -> anyhow::Result<()> {
    let output_dir = args.output.clone().unwrap_or_else(|| config.model_dir.clone());
    fs::create_dir_all(&output_dir)?;
    println!("{} Downloading models to {}", style("ℹ").blue(), output_dir.display());
    println!();

    let client = reqwest::Client::builder()
        .user_agent(concat!("pagedit-cli/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(600))
        .build()?;
    let bars = MultiProgress::new();

    let mut failed = Vec::new();
    for mut model in model_catalog(config) {
        if args.only.is_some_and(|only| only != model.group) {
            continue;
        }
        if let (ModelGroup::Inpaint, Some(url)) = (model.group, &args.inpaint_url) {
            model.url = url.clone();
        }

        if let FileState::Ready(size) = model.state(&output_dir) {
            if !args.force {
                println!("  {} {} (present, {})", style("✓").green(), model.filename, format_size(size));
                continue;
            }
        }

        let pb = bars.add(ProgressBar::new(model.size_bytes));
        pb.set_style(progress_style());
        pb.set_message(model.filename.clone());

        let target = output_dir.join(&model.filename);
        if let Err(e) = download_file(&client, &model.url, &target, &pb).await {
            pb.abandon_with_message(format!("{} {}: {}", style("✗").red(), model.filename, e));
            failed.push(model.filename);
        } else {
            pb.finish_with_message(format!("{} {}", style("✓").green(), model.filename));
        }
    }

    println!();
    if failed.is_empty() {
        println!("{} Models ready", style("✓").green().bold());
    } else {
        println!("{} Failed: {}", style("⚠").yellow().bold(), failed.join(", "));
        println!("Retry with: pagedit models download --force");
    }
    println!();
    check_status(config, &output_dir)
}

/// Stream `url` into `path` via a `.part` file renamed on completion.
async fn download_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    pb: &ProgressBar,
) -> anyhow::Result<()> {
    let response = client.get(url).send().await?.error_for_status()?;
    if let Some(len) = response.content_length() {
        pb.set_length(len);
    }

    let partial = path.with_extension("part");
    let mut file = File::create(&partial)?;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        pb.inc(chunk.len() as u64);
    }
    file.sync_all()?;
    drop(file);

    fs::rename(&partial, path)?;
    Ok(())
}

fn check_status(config: &ModelConfig, model_dir: &Path) -> anyhow::Result<()> {
    println!("{} {}", style("Models in").bold(), model_dir.display());
    println!();

    let catalog = model_catalog(config);
    for (group, label) in [
        (ModelGroup::Inpaint, "inpaint (content-aware fill)"),
        (ModelGroup::Ocr, "ocr (text detection)"),
    ] {
        println!("{}", style(format!("▸ {}", label)).bold());

        let mut ready = true;
        for model in catalog.iter().filter(|m| m.group == group) {
            let (mark, detail) = match model.state(model_dir) {
                FileState::Ready(size) => (style("✓").green(), format_size(size)),
                FileState::Partial(size) => (style("⚠").yellow(), format!("{} (incomplete?)", format_size(size))),
                FileState::Missing => (style("✗").red(), "missing".to_string()),
            };
            ready &= matches!(model.state(model_dir), FileState::Ready(_));
            println!("    {} {:<25} {:>10}", mark, model.filename, detail);
        }

        if ready {
            println!("    {} Ready", style("✓").green());
        } else {
            println!("    {} Run 'pagedit models download'", style("⚠").yellow());
        }
        println!();
    }
    Ok(())
}

fn clean_models(config: &ModelConfig) -> anyhow::Result<()> {
    let dir = &config.model_dir;
    let mut freed = 0;
    let mut removed = 0;

    for model in model_catalog(config) {
        if let FileState::Ready(size) | FileState::Partial(size) = model.state(dir) {
            fs::remove_file(dir.join(&model.filename))?;
            println!("  {} Removed {}", style("✓").green(), model.filename);
            freed += size;
            removed += 1;
        }
    }

    // leftovers from interrupted downloads
    for entry in fs::read_dir(dir).into_iter().flatten().flatten() {
        if entry.path().extension().is_some_and(|e| e == "part") {
            fs::remove_file(entry.path())?;
        }
    }

    if removed == 0 {
        println!("{} Nothing to remove", style("ℹ").blue());
    } else {
        println!();
        println!("{} Freed {} across {} files", style("✓").green(), format_size(freed), removed);
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const UNITS: [(&str, u64); 3] = [("GB", 1_000_000_000), ("MB", 1_000_000), ("KB", 1_000)];
    UNITS
        .iter()
        .find(|(_, scale)| bytes >= *scale)
        .map(|(unit, scale)| format!("{:.1}{}", bytes as f64 / *scale as f64, unit))
        .unwrap_or_else(|| format!("{}B", bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(2_000), "2.0KB");
        assert_eq!(format_size(208_000_000), "208.0MB");
    }

    #[test]
    fn test_catalog_follows_config_names() {
        let mut config = ModelConfig::default();
        config.inpaint_model = "big-lama.onnx".to_string();
        let catalog = model_catalog(&config);
        assert_eq!(catalog[0].filename, "big-lama.onnx");
        assert_eq!(catalog.iter().filter(|m| m.group == ModelGroup::Ocr).count(), 3);
    }

    #[test]
    fn test_file_state() {
        let dir = tempfile::tempdir().unwrap();
        let model = model_catalog(&ModelConfig::default()).pop().unwrap();
        assert_eq!(model.state(dir.path()), FileState::Missing);

        std::fs::write(dir.path().join(&model.filename), b"x").unwrap();
        assert_eq!(model.state(dir.path()), FileState::Partial(1));

        std::fs::write(dir.path().join(&model.filename), vec![b'a'; 1_500]).unwrap();
        assert_eq!(model.state(dir.path()), FileState::Ready(1_500));
    }
}
