//! # mediaconv
//!
//! Batch media conversion: re-encode images, assemble images into a PDF,
//! and extract the pages of a PDF as images.
//!
//! ## Pipeline Overview
//!
//! ```text
//! selected files
//!  │
//!  ├─ 1. Load     read bytes, decode rasters / validate documents
//!  ├─ 2. Convert  codec adapter for the mode (CPU-bound, spawn_blocking)
//!  ├─ 3. Package  expose individually, or bundle pages into one ZIP
//!  └─ 4. Expose   register artifacts; hand out handles until reset
//! ```
//!
//! | Mode                 | Input              | Output                               |
//! |----------------------|--------------------|--------------------------------------|
//! | `image-recode`       | images             | `<base>.<jpeg\|png\|webp>` each      |
//! | `images-to-document` | images             | `converted_images.pdf`, one per page |
//! | `document-to-images` | one PDF            | `page_<n>.<ext>`, zipped when > 1    |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mediaconv::{BatchConverter, ConversionMode, ConversionOptions, InputUnit, TargetEncoding};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut converter = BatchConverter::new();
//!     converter.set_options(
//!         ConversionMode::DocumentToImages,
//!         ConversionOptions::with_target(TargetEncoding::Png),
//!     );
//!     converter.select_batch(
//!         vec![InputUnit::open("report.pdf").await?],
//!         ConversionMode::DocumentToImages,
//!     )?;
//!     if let Some(run) = converter.run().await? {
//!         println!("{:?}", run.artifact_names());
//!         converter.registry().write_all("out").await?;
//!     }
//!     converter.reset();
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mediaconv` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod adapter;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod packaging;
pub mod pipeline;
pub mod progress;
pub mod registry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionMode, ConversionOptions, ConversionOptionsBuilder, PageSize, TargetEncoding,
    ARCHIVE_NAME, DOCUMENT_NAME,
};
pub use convert::{convert, convert_sync, BatchConverter, RunState};
pub use error::ConvertError;
pub use output::{ArtifactSummary, BatchRun, ContentKind, ConversionResult, RunStats, RunStatus};
pub use pipeline::input::InputUnit;
pub use pipeline::Collaborators;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use registry::{Artifact, ArtifactHandle, ArtifactRegistry};
