//! Resource loading: input unit → decoded representation.
//!
//! Raster modes get a decoded pixel surface. The document mode gets the raw
//! bytes after a cheap `%PDF` magic check; opening and paginating happens in
//! the rasteriser, which owns the document for as long as its pages are
//! being rendered.

use crate::config::InputKind;
use crate::error::ConvertError;
use crate::pipeline::input::InputUnit;
use image::DynamicImage;
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Decoded content of one unit.
pub enum Decoded {
    Raster(DynamicImage),
    Document(Vec<u8>),
}

/// An input unit after loading.
pub struct LoadedUnit {
    pub name: String,
    pub base_name: String,
    pub content: Decoded,
}

impl LoadedUnit {
    /// Pixel dimensions for raster units, `None` for documents.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match &self.content {
            Decoded::Raster(img) => Some((img.width(), img.height())),
            Decoded::Document(_) => None,
        }
    }
}

/// Read and decode `unit` as `kind`.
///
/// Image decoding is CPU-bound and runs on the blocking pool.
pub async fn load(unit: &InputUnit, kind: InputKind) -> Result<LoadedUnit, ConvertError> {
    let bytes = unit.read().await?;
    let name = unit.name().to_string();

    let content = match kind {
        InputKind::Raster => {
            let task_name = name.clone();
            let img = tokio::task::spawn_blocking(move || {
                image::load_from_memory(&bytes).map_err(|e| ConvertError::unreadable(task_name, e))
            })
            .await
            .map_err(|e| ConvertError::Internal(format!("Decode task panicked: {e}")))??;
            debug!("Decoded '{}' → {}x{} px", name, img.width(), img.height());
            Decoded::Raster(img)
        }
        InputKind::Document => {
            if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
                let head: Vec<u8> = bytes.iter().take(4).copied().collect();
                return Err(ConvertError::unreadable(
                    &name,
                    format!("not a PDF document (first bytes: {head:?})"),
                ));
            }
            debug!("Loaded document '{}' ({} bytes)", name, bytes.len());
            Decoded::Document(bytes)
        }
    };

    Ok(LoadedUnit {
        base_name: unit.base_name().to_string(),
        name,
        content,
    })
}
