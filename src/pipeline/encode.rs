//! Raster encoding: `DynamicImage` → bytes in the target encoding.
//!
//! JPEG has no alpha channel, so images are flattened to RGB before the JPEG
//! encoder sees them. PNG and WebP keep whatever colour type they decoded as;
//! WebP output is lossless.

use crate::config::{ConversionOptions, TargetEncoding};
use crate::error::ConvertError;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image at its original dimensions.
pub fn encode_image(
    img: &DynamicImage,
    options: &ConversionOptions,
) -> Result<Vec<u8>, ConvertError> {
    let target = options.target;
    let mut buf = Vec::new();

    match target {
        TargetEncoding::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut buf, options.jpeg_quality);
            rgb.write_with_encoder(encoder)
                .map_err(|e| ConvertError::from_encode(target.extension(), e))?;
        }
        TargetEncoding::Png | TargetEncoding::Webp => {
            let img = match (target, img) {
                // The WebP encoder takes 8-bit L/LA/RGB/RGBA only.
                (TargetEncoding::Webp, DynamicImage::ImageRgb8(_))
                | (TargetEncoding::Webp, DynamicImage::ImageRgba8(_)) => img.clone(),
                (TargetEncoding::Webp, other) => DynamicImage::ImageRgba8(other.to_rgba8()),
                _ => img.clone(),
            };
            img.write_to(&mut Cursor::new(&mut buf), target.image_format())
                .map_err(|e| ConvertError::from_encode(target.extension(), e))?;
        }
    }

    debug!(
        "Encoded {}x{} image → {} bytes {}",
        img.width(),
        img.height(),
        buf.len(),
        target
    );
    Ok(buf)
}
