//! Pipeline stages and the external collaborators they drive.
//!
//! Each submodule implements one step. The three external backends
//! (rasteriser, document builder, archiver) sit behind traits and are
//! handed to the converter through [`Collaborators`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ loader ──▶ encode / document / render ──▶ archive
//! (unit)    (decode)   (codec adapters)               (packaging)
//! ```
//!
//! 1. [`input`]   : a selected file; bytes read on demand
//! 2. [`loader`]  : decode to a pixel surface or validate a document
//! 3. [`encode`]  : pixel surface → jpeg / png / webp bytes
//! 4. [`document`]: place images on pages and export a PDF
//! 5. [`render`]  : open a PDF and rasterise its pages (pdfium)
//! 6. [`archive`] : bundle payloads into a ZIP

pub mod archive;
pub mod document;
pub mod encode;
pub mod input;
pub mod loader;
pub mod render;

use std::fmt;
use std::sync::Arc;

use archive::{ArchiveAssembler, ZipAssembler};
use document::{DocumentAssembler, PdfAssembler};
use render::{DocumentRasterizer, PdfiumRasterizer};

/// The external capabilities a converter may call on.
///
/// Each slot is optional. An empty slot is only an error when a run first
/// needs it, and then it is reported with the specific
/// `*LibraryUnavailable` / `CollaboratorUnavailable` error.
#[derive(Clone)]
pub struct Collaborators {
    pub rasterizer: Option<Arc<dyn DocumentRasterizer>>,
    pub documents: Option<Arc<dyn DocumentAssembler>>,
    pub archives: Option<Arc<dyn ArchiveAssembler>>,
}

impl Default for Collaborators {
    /// pdfium rasteriser, lopdf document builder, zip archiver.
    fn default() -> Self {
        Self {
            rasterizer: Some(Arc::new(PdfiumRasterizer::new())),
            documents: Some(Arc::new(PdfAssembler::default())),
            archives: Some(Arc::new(ZipAssembler)),
        }
    }
}

impl Collaborators {
    /// No collaborators at all.
    pub fn none() -> Self {
        Self {
            rasterizer: None,
            documents: None,
            archives: None,
        }
    }

    pub fn with_rasterizer(mut self, r: Arc<dyn DocumentRasterizer>) -> Self {
        self.rasterizer = Some(r);
        self
    }

    pub fn with_documents(mut self, d: Arc<dyn DocumentAssembler>) -> Self {
        self.documents = Some(d);
        self
    }

    pub fn with_archives(mut self, a: Arc<dyn ArchiveAssembler>) -> Self {
        self.archives = Some(a);
        self
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = |present: bool| if present { "<present>" } else { "<absent>" };
        f.debug_struct("Collaborators")
            .field("rasterizer", &slot(self.rasterizer.is_some()))
            .field("documents", &slot(self.documents.is_some()))
            .field("archives", &slot(self.archives.is_some()))
            .finish()
    }
}
