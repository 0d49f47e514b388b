//! Codec adapters: loaded units → ordered, named payloads.
//!
//! Every [`ConversionMode`] maps to one adapter behind the single
//! [`CodecAdapter::convert`] method. Adapters are pure: they read the loaded
//! units and options, call their collaborator, and return results. They do
//! not touch run state or the artifact registry.
//!
//! Adapter calls are blocking (image encoding, pdfium, lopdf) and are run by
//! the orchestrator inside `spawn_blocking`.

use crate::config::{ConversionMode, ConversionOptions, DOCUMENT_NAME};
use crate::error::ConvertError;
use crate::output::{ContentKind, ConversionResult};
use crate::pipeline::document::{DocumentAssembler, Placement};
use crate::pipeline::encode::encode_image;
use crate::pipeline::loader::{Decoded, LoadedUnit};
use crate::pipeline::render::DocumentRasterizer;
use crate::pipeline::Collaborators;
use image::DynamicImage;
use std::sync::Arc;
use tracing::debug;

/// Convert loaded units into results.
pub trait CodecAdapter: Send + Sync {
    fn convert(
        &self,
        units: Vec<LoadedUnit>,
        options: &ConversionOptions,
    ) -> Result<Vec<ConversionResult>, ConvertError>;
}

/// Select the adapter for `mode`, wired to the collaborators it needs.
pub fn adapter_for(mode: ConversionMode, collaborators: &Collaborators) -> Arc<dyn CodecAdapter> {
    match mode {
        ConversionMode::ImageRecode => Arc::new(ImageRecode),
        ConversionMode::ImagesToDocument => Arc::new(ImagesToDocument {
            documents: collaborators.documents.clone(),
        }),
        ConversionMode::DocumentToImages => Arc::new(DocumentToImages {
            rasterizer: collaborators.rasterizer.clone(),
        }),
    }
}

fn expect_raster(unit: &LoadedUnit) -> Result<&DynamicImage, ConvertError> {
    match &unit.content {
        Decoded::Raster(img) => Ok(img),
        Decoded::Document(_) => Err(ConvertError::Internal(format!(
            "'{}' was loaded as a document, expected an image",
            unit.name
        ))),
    }
}

// ── image-recode ─────────────────────────────────────────────────────────

/// Re-encode each image at its original size: `<base-name>.<ext>`.
pub struct ImageRecode;

impl CodecAdapter for ImageRecode {
    fn convert(
        &self,
        units: Vec<LoadedUnit>,
        options: &ConversionOptions,
    ) -> Result<Vec<ConversionResult>, ConvertError> {
        units
            .iter()
            .map(|unit| {
                let bytes = encode_image(expect_raster(unit)?, options)?;
                Ok(ConversionResult::new(
                    format!("{}.{}", unit.base_name, options.target.extension()),
                    ContentKind::Image,
                    options.target.mime_type(),
                    bytes,
                ))
            })
            .collect()
    }
}

// ── images-to-document ───────────────────────────────────────────────────

/// One document, one image per page, each scaled to fit and centred.
pub struct ImagesToDocument {
    documents: Option<Arc<dyn DocumentAssembler>>,
}

impl CodecAdapter for ImagesToDocument {
    fn convert(
        &self,
        units: Vec<LoadedUnit>,
        _options: &ConversionOptions,
    ) -> Result<Vec<ConversionResult>, ConvertError> {
        let documents = self.documents.as_ref().ok_or_else(|| {
            ConvertError::DocumentLibraryUnavailable("no document assembler configured".into())
        })?;
        if units.is_empty() {
            return Err(ConvertError::EmptyBatch);
        }

        let mut doc = documents.new_document();
        let page = doc.page_size();
        for (i, unit) in units.iter().enumerate() {
            let img = expect_raster(unit)?;
            let at = Placement::fit(img.width(), img.height(), page);
            if i > 0 {
                doc.add_page()?;
            }
            doc.place_image(img, at)?;
            debug!(
                "Placed '{}' on page {} at ({:.1}, {:.1}) {:.1}x{:.1}",
                unit.name,
                i + 1,
                at.x,
                at.y,
                at.width,
                at.height
            );
        }

        Ok(vec![ConversionResult::new(
            DOCUMENT_NAME,
            ContentKind::Document,
            "application/pdf",
            doc.export()?,
        )])
    }
}

// ── document-to-images ───────────────────────────────────────────────────

/// Rasterise every page of the first unit: `page_<n>.<ext>`, 1-based.
pub struct DocumentToImages {
    rasterizer: Option<Arc<dyn DocumentRasterizer>>,
}

impl CodecAdapter for DocumentToImages {
    fn convert(
        &self,
        units: Vec<LoadedUnit>,
        options: &ConversionOptions,
    ) -> Result<Vec<ConversionResult>, ConvertError> {
        let rasterizer =
            self.rasterizer
                .as_ref()
                .ok_or_else(|| ConvertError::CollaboratorUnavailable {
                    collaborator: "document rasteriser".into(),
                    detail: "none configured".into(),
                })?;
        let unit = units.into_iter().next().ok_or(ConvertError::EmptyBatch)?;
        let bytes = match unit.content {
            Decoded::Document(bytes) => bytes,
            Decoded::Raster(_) => {
                return Err(ConvertError::Internal(format!(
                    "'{}' was loaded as an image, expected a document",
                    unit.name
                )))
            }
        };

        let document = rasterizer.open(&unit.name, bytes)?;
        let pages = document.page_count();
        if pages == 0 {
            return Err(ConvertError::UnreadableDocument {
                name: unit.name,
                detail: "document has no pages".into(),
            });
        }

        let ext = options.target.extension();
        (0..pages)
            .map(|idx| {
                let (width, height) = document.page_size(idx)?;
                let scale =
                    capped_scale(width, height, options.render_scale, options.max_render_edge);
                let img = document.render_page(idx, scale)?;
                Ok(ConversionResult::new(
                    format!("page_{}.{}", idx + 1, ext),
                    ContentKind::Image,
                    options.target.mime_type(),
                    encode_image(&img, options)?,
                ))
            })
            .collect()
    }
}

/// Lower `scale` so the longest edge of a `width` x `height` pt page stays
/// within `max_edge` pixels.
fn capped_scale(width: f32, height: f32, scale: f32, max_edge: u32) -> f32 {
    let longest = width.max(height);
    if longest <= 0.0 || longest * scale <= max_edge as f32 {
        return scale;
    }
    let capped = max_edge as f32 / longest;
    debug!(
        "Page {:.0}x{:.0}pt exceeds {}px at {}x; rendering at {:.3}x",
        width, height, max_edge, scale, capped
    );
    capped
}
