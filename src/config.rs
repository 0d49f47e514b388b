//! Conversion modes and per-mode options.
//!
//! A batch is converted under exactly one [`ConversionMode`]. The mode picks
//! the codec adapter and the packaging rule; [`ConversionOptions`] carries
//! the knobs the adapters read (target encoding, JPEG quality, page render
//! scale). Options are built via [`ConversionOptions::builder()`] so callers
//! only set what they care about.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Upscaling factor applied when rasterising document pages. Default: 1.5.
pub const DEFAULT_RENDER_SCALE: f32 = 1.5;

/// Longest edge, in pixels, a rendered page may have. Default: 8192.
///
/// The effective render scale is lowered for pages that would exceed it.
pub const DEFAULT_MAX_RENDER_EDGE: u32 = 8192;

/// JPEG quality used when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Name of the single document produced by `images-to-document`.
pub const DOCUMENT_NAME: &str = "converted_images.pdf";

/// Name of the archive produced when `document-to-images` yields several pages.
pub const ARCHIVE_NAME: &str = "converted_pages.zip";

// ── Modes ────────────────────────────────────────────────────────────────

/// The conversion pipeline variant for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionMode {
    /// Re-encode each image into the target encoding.
    ImageRecode,
    /// Assemble every image in the batch into one PDF, one image per page.
    ImagesToDocument,
    /// Rasterise every page of one PDF into images.
    DocumentToImages,
}

/// Whether the adapter runs once per unit or once over the whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterScope {
    PerUnit,
    WholeBatch,
}

impl ConversionMode {
    pub const ALL: [ConversionMode; 3] = [
        ConversionMode::ImageRecode,
        ConversionMode::ImagesToDocument,
        ConversionMode::DocumentToImages,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConversionMode::ImageRecode => "image-recode",
            ConversionMode::ImagesToDocument => "images-to-document",
            ConversionMode::DocumentToImages => "document-to-images",
        }
    }

    pub fn scope(self) -> AdapterScope {
        match self {
            ConversionMode::ImageRecode => AdapterScope::PerUnit,
            ConversionMode::ImagesToDocument | ConversionMode::DocumentToImages => {
                AdapterScope::WholeBatch
            }
        }
    }

    /// Which decoded representation the loader must produce for this mode.
    pub fn input_kind(self) -> InputKind {
        match self {
            ConversionMode::ImageRecode | ConversionMode::ImagesToDocument => InputKind::Raster,
            ConversionMode::DocumentToImages => InputKind::Document,
        }
    }
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionMode {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        ConversionMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ConvertError::InvalidOptions(format!("unknown conversion mode '{s}'")))
    }
}

/// Decoded representation requested from the resource loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Raster,
    Document,
}

// ── Encodings ────────────────────────────────────────────────────────────

/// Recognised output raster encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetEncoding {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl TargetEncoding {
    /// File extension used in result names. Mirrors the encoding name, so
    /// JPEG output is `.jpeg`, not `.jpg`.
    pub fn extension(self) -> &'static str {
        match self {
            TargetEncoding::Jpeg => "jpeg",
            TargetEncoding::Png => "png",
            TargetEncoding::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            TargetEncoding::Jpeg => "image/jpeg",
            TargetEncoding::Png => "image/png",
            TargetEncoding::Webp => "image/webp",
        }
    }

    pub fn image_format(self) -> image::ImageFormat {
        match self {
            TargetEncoding::Jpeg => image::ImageFormat::Jpeg,
            TargetEncoding::Png => image::ImageFormat::Png,
            TargetEncoding::Webp => image::ImageFormat::WebP,
        }
    }

    /// Lenient parse: unrecognised names fall back to [`TargetEncoding::Jpeg`].
    ///
    /// Use `str::parse` for a strict variant that rejects unknown names.
    pub fn parse_or_default(name: &str) -> Self {
        match name.parse() {
            Ok(enc) => enc,
            Err(_) => {
                warn!("Unrecognised target encoding '{}', falling back to jpeg", name);
                TargetEncoding::default()
            }
        }
    }
}

impl fmt::Display for TargetEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TargetEncoding {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(TargetEncoding::Jpeg),
            "png" => Ok(TargetEncoding::Png),
            "webp" => Ok(TargetEncoding::Webp),
            other => Err(ConvertError::EncodeUnsupported {
                encoding: other.to_string(),
                detail: "expected one of jpeg, png, webp".into(),
            }),
        }
    }
}

// ── Options ──────────────────────────────────────────────────────────────

/// Options read by the codec adapters.
///
/// `images-to-document` ignores all of them; the other two modes read
/// `target` and `jpeg_quality`, and `document-to-images` also reads
/// `render_scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Output raster encoding. Default: jpeg.
    pub target: TargetEncoding,

    /// JPEG quality 1–100. Default: 92.
    pub jpeg_quality: u8,

    /// Page upscaling factor for document rasterisation. Range 0.1–8.0. Default: 1.5.
    pub render_scale: f32,

    /// Cap on the longest edge of a rendered page, in pixels. Default: 8192.
    #[serde(default = "default_max_render_edge")]
    pub max_render_edge: u32,
}

fn default_max_render_edge() -> u32 {
    DEFAULT_MAX_RENDER_EDGE
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            target: TargetEncoding::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            render_scale: DEFAULT_RENDER_SCALE,
            max_render_edge: DEFAULT_MAX_RENDER_EDGE,
        }
    }
}

impl ConversionOptions {
    pub fn builder() -> ConversionOptionsBuilder {
        ConversionOptionsBuilder {
            options: Self::default(),
        }
    }

    /// Shorthand for default options with the given target encoding.
    pub fn with_target(target: TargetEncoding) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }
}

/// Builder for [`ConversionOptions`].
#[derive(Debug)]
pub struct ConversionOptionsBuilder {
    options: ConversionOptions,
}

impl ConversionOptionsBuilder {
    pub fn target(mut self, target: TargetEncoding) -> Self {
        self.options.target = target;
        self
    }

    /// Set the target from a user-supplied name, falling back to jpeg.
    pub fn target_name(mut self, name: &str) -> Self {
        self.options.target = TargetEncoding::parse_or_default(name);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.options.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.options.render_scale = scale;
        self
    }

    pub fn max_render_edge(mut self, px: u32) -> Self {
        self.options.max_render_edge = px;
        self
    }

    /// Build the options, validating constraints.
    pub fn build(self) -> Result<ConversionOptions, ConvertError> {
        let o = &self.options;
        if !o.render_scale.is_finite() || !(0.1..=8.0).contains(&o.render_scale) {
            return Err(ConvertError::InvalidOptions(format!(
                "render scale must be 0.1–8.0, got {}",
                o.render_scale
            )));
        }
        if o.max_render_edge == 0 {
            return Err(ConvertError::InvalidOptions(
                "max render edge must be at least 1 pixel".into(),
            ));
        }
        Ok(self.options)
    }
}

// ── Page geometry ────────────────────────────────────────────────────────

/// Page dimensions in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// A4 portrait, the fixed geometry of assembled documents.
    pub const A4: PageSize = PageSize {
        width: 595.28,
        height: 841.89,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_name() {
        for mode in ConversionMode::ALL {
            assert_eq!(mode.as_str().parse::<ConversionMode>().unwrap(), mode);
        }
        assert!("pdf-to-word".parse::<ConversionMode>().is_err());
    }

    #[test]
    fn mode_scopes() {
        assert_eq!(ConversionMode::ImageRecode.scope(), AdapterScope::PerUnit);
        assert_eq!(
            ConversionMode::ImagesToDocument.scope(),
            AdapterScope::WholeBatch
        );
        assert_eq!(
            ConversionMode::DocumentToImages.input_kind(),
            InputKind::Document
        );
    }

    #[test]
    fn unknown_encoding_falls_back_to_jpeg() {
        assert_eq!(TargetEncoding::parse_or_default("bmp"), TargetEncoding::Jpeg);
        assert_eq!(TargetEncoding::parse_or_default("PNG"), TargetEncoding::Png);
        assert_eq!(TargetEncoding::parse_or_default("webp"), TargetEncoding::Webp);
    }

    #[test]
    fn strict_encoding_parse_rejects_unknown() {
        let err = "tiff".parse::<TargetEncoding>().unwrap_err();
        assert!(matches!(err, ConvertError::EncodeUnsupported { .. }));
    }

    #[test]
    fn extension_follows_encoding_name() {
        assert_eq!(TargetEncoding::Jpeg.extension(), "jpeg");
        assert_eq!(TargetEncoding::Webp.mime_type(), "image/webp");
    }

    #[test]
    fn builder_defaults_and_validation() {
        let o = ConversionOptions::builder().build().unwrap();
        assert_eq!(o.target, TargetEncoding::Jpeg);
        assert_eq!(o.jpeg_quality, 92);
        assert!((o.render_scale - 1.5).abs() < f32::EPSILON);
        assert_eq!(o.max_render_edge, DEFAULT_MAX_RENDER_EDGE);

        let o = ConversionOptions::builder()
            .target_name("nonsense")
            .jpeg_quality(0)
            .build()
            .unwrap();
        assert_eq!(o.target, TargetEncoding::Jpeg);
        assert_eq!(o.jpeg_quality, 1);

        assert!(ConversionOptions::builder()
            .render_scale(0.0)
            .build()
            .is_err());
        assert!(ConversionOptions::builder()
            .render_scale(f32::NAN)
            .build()
            .is_err());
        assert!(ConversionOptions::builder()
            .max_render_edge(0)
            .build()
            .is_err());
    }
}
