//! Document rasterisation: open a PDF and render its pages to `DynamicImage`.
//!
//! [`DocumentRasterizer`] is the seam between the pipeline and the rendering
//! library. The shipped implementation, [`PdfiumRasterizer`], wraps the pdfium
//! C++ library through `pdfium-render`. pdfium keeps thread-local state and
//! must not be driven from async code, so callers run every method of these
//! traits inside `tokio::task::spawn_blocking`.
//!
//! The library is bound lazily on the first `open`, not at construction, so a
//! converter that never sees a document never needs pdfium installed. A
//! failed bind surfaces as [`ConvertError::CollaboratorUnavailable`].

use crate::error::ConvertError;
use image::DynamicImage;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Environment variable naming a directory that contains the pdfium library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Opens paginated documents from raw bytes.
pub trait DocumentRasterizer: Send + Sync {
    /// Parse `bytes` into a paginated handle.
    ///
    /// `name` is used only for error messages.
    fn open<'a>(
        &'a self,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<Box<dyn PagedDocument + 'a>, ConvertError>;
}

/// An opened document.
pub trait PagedDocument {
    fn page_count(&self) -> usize;

    /// Width and height of the 0-based page `index`, in points.
    fn page_size(&self, index: usize) -> Result<(f32, f32), ConvertError>;

    /// Render the 0-based page `index`, upscaled by `scale`.
    fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage, ConvertError>;
}

/// pdfium-backed rasteriser.
pub struct PdfiumRasterizer {
    lib_dir: Option<PathBuf>,
    pdfium: OnceCell<Pdfium>,
}

impl PdfiumRasterizer {
    /// Bind to `$PDFIUM_LIB_PATH` when set, else the system library path.
    pub fn new() -> Self {
        Self {
            lib_dir: std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from),
            pdfium: OnceCell::new(),
        }
    }

    /// Bind to the pdfium library in `dir`.
    pub fn with_library_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            lib_dir: Some(dir.into()),
            pdfium: OnceCell::new(),
        }
    }

    fn pdfium(&self) -> Result<&Pdfium, ConvertError> {
        self.pdfium.get_or_try_init(|| {
            let bindings = match &self.lib_dir {
                Some(dir) => {
                    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                }
                None => Pdfium::bind_to_system_library(),
            }
            .map_err(|e| ConvertError::CollaboratorUnavailable {
                collaborator: "pdfium".into(),
                detail: format!("{e:?}"),
            })?;
            info!("Bound pdfium library");
            Ok(Pdfium::new(bindings))
        })
    }
}

impl Default for PdfiumRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentRasterizer for PdfiumRasterizer {
    fn open<'a>(
        &'a self,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<Box<dyn PagedDocument + 'a>, ConvertError> {
        let pdfium = self.pdfium()?;
        let document = pdfium.load_pdf_from_byte_vec(bytes, None).map_err(|e| {
            ConvertError::UnreadableDocument {
                name: name.to_string(),
                detail: format!("{e:?}"),
            }
        })?;
        let total = document.pages().len() as usize;
        info!("Document '{}' loaded: {} pages", name, total);
        Ok(Box::new(PdfiumDocument {
            name: name.to_string(),
            document,
        }))
    }
}

struct PdfiumDocument<'a> {
    name: String,
    document: PdfDocument<'a>,
}

impl<'a> PdfiumDocument<'a> {
    fn failed(&self, index: usize, e: PdfiumError) -> ConvertError {
        ConvertError::UnreadableDocument {
            name: self.name.clone(),
            detail: format!("page {}: {e:?}", index + 1),
        }
    }

    fn page(&self, index: usize) -> Result<PdfPage<'a>, ConvertError> {
        self.document
            .pages()
            .get(index as u16)
            .map_err(|e| self.failed(index, e))
    }
}

impl PagedDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&self, index: usize) -> Result<(f32, f32), ConvertError> {
        let page = self.page(index)?;
        Ok((page.width().value, page.height().value))
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage, ConvertError> {
        let page = self.page(index)?;
        let config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| self.failed(index, e))?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}
