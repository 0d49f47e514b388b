//! CLI binary for mediaconv.
//!
//! A thin shim over the library crate: maps CLI flags to a mode and
//! `ConversionOptions`, runs one batch and writes the artifacts to disk.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mediaconv::{
    BatchConverter, ConversionMode, ConversionOptions, ConversionProgressCallback, InputUnit,
    ProgressCallback, RunState, TargetEncoding,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold:<10}  [{bar:36.green/238}] {pos:>3}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Idle");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_units: usize) {
        self.bar.set_length(total_units as u64);
    }

    fn on_stage(&self, state: RunState) {
        let prefix = state.to_string();
        let mut chars = prefix.chars();
        let prefix = match chars.next() {
            Some(c) => c.to_uppercase().chain(chars).collect(),
            None => prefix,
        };
        self.bar.set_prefix(prefix);
    }

    fn on_unit_start(&self, _index: usize, _total: usize, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_unit_complete(&self, index: usize, total: usize, produced: usize) {
        if produced > 0 {
            self.bar.println(format!(
                "  {} {:>3}/{:<3}  {}",
                green("✓"),
                index + 1,
                total,
                dim(&format!("{produced} output(s)")),
            ));
        }
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _artifacts: usize) {
        self.bar.finish_and_clear();
    }

    fn on_run_failed(&self, _error: &str) {
        self.bar.abandon();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Re-encode photos as webp into ./out
  mediaconv --mode image-recode --format webp --out out a.png b.jpg

  # Assemble scans into converted_images.pdf
  mediaconv --mode images-to-document scan1.jpg scan2.jpg

  # Extract every page of a PDF (zipped when there is more than one)
  mediaconv --mode document-to-images --format png --scale 2 report.pdf

  # JSON run record instead of a summary
  mediaconv --mode image-recode --json photo.png > run.json

OUTPUT NAMES:
  image-recode         <base-name>.<jpeg|png|webp>, one per input
  images-to-document   converted_images.pdf
  document-to-images   page_<n>.<ext>, or converted_pages.zip for > 1 page

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Directory holding libpdfium; otherwise the system search path
  RUST_LOG          Override the log filter (e.g. mediaconv=debug)
"#;

/// Batch-convert images and PDF documents.
#[derive(Parser, Debug)]
#[command(
    name = "mediaconv",
    version,
    about = "Batch-convert images and PDF documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input files (images, or a single PDF for document-to-images).
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Conversion mode.
    #[arg(short, long, env = "MEDIACONV_MODE", value_enum)]
    mode: ModeArg,

    /// Output raster encoding.
    #[arg(short, long, env = "MEDIACONV_FORMAT", value_enum, default_value = "jpeg")]
    format: FormatArg,

    /// JPEG quality (1–100).
    #[arg(long, env = "MEDIACONV_QUALITY", default_value_t = mediaconv::config::DEFAULT_JPEG_QUALITY,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Page render scale for document-to-images (0.1–8).
    #[arg(long, env = "MEDIACONV_SCALE", default_value_t = mediaconv::config::DEFAULT_RENDER_SCALE)]
    scale: f32,

    /// Directory the artifacts are written into.
    #[arg(short, long, env = "MEDIACONV_OUT", default_value = ".")]
    out: PathBuf,

    /// Print the run record as JSON instead of a summary.
    #[arg(long, env = "MEDIACONV_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MEDIACONV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MEDIACONV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MEDIACONV_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    ImageRecode,
    ImagesToDocument,
    DocumentToImages,
}

impl From<ModeArg> for ConversionMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::ImageRecode => ConversionMode::ImageRecode,
            ModeArg::ImagesToDocument => ConversionMode::ImagesToDocument,
            ModeArg::DocumentToImages => ConversionMode::DocumentToImages,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Jpeg,
    Png,
    Webp,
}

impl From<FormatArg> for TargetEncoding {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Jpeg => TargetEncoding::Jpeg,
            FormatArg::Png => TargetEncoding::Png,
            FormatArg::Webp => TargetEncoding::Webp,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build converter ──────────────────────────────────────────────────
    let mode = ConversionMode::from(cli.mode);
    let options = ConversionOptions::builder()
        .target(cli.format.into())
        .jpeg_quality(cli.quality)
        .render_scale(cli.scale)
        .build()
        .context("Invalid conversion options")?;

    let mut converter = BatchConverter::new();
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        converter = converter.with_progress(cb);
    }
    converter.set_options(mode, options);

    let mut units = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        units.push(
            InputUnit::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?,
        );
    }
    converter
        .select_batch(units, mode)
        .context("Invalid selection")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let Some(run) = converter.run().await.context("Conversion failed")? else {
        return Ok(());
    };

    let written = converter
        .registry()
        .write_all(&cli.out)
        .await
        .context("Failed to write artifacts")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&run).context("Failed to serialise run")?;
        println!("{json}");
    } else if !cli.quiet {
        for path in &written {
            eprintln!("  {} {}", green("→"), path.display());
        }
        eprintln!(
            "{} {} → {} artifact(s) in {}ms",
            green("✔"),
            bold(&format!("{} {}", run.stats.units, mode)),
            run.artifacts.len(),
            run.stats.total_duration_ms,
        );
    }

    converter.reset();
    Ok(())
}
