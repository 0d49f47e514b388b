//! Error types for the mediaconv library.
//!
//! A single error type, [`ConvertError`], covers every way a batch run can
//! fail. Runs are atomic: the first error raised by a loader, adapter or
//! packaging step aborts the run and is handed to the caller unchanged,
//! together with zero results. There is no partial-success mode and nothing
//! is retried.
//!
//! Variants fall into three groups:
//!
//! * **Input**: the bytes the caller supplied cannot be used
//!   ([`ConvertError::UnreadableInput`], [`ConvertError::UnreadableDocument`]).
//! * **Codec / collaborator**: an encoder refused the requested output, or an
//!   external capability (document builder, archiver, rasteriser) is missing
//!   at the moment it is first needed.
//! * **Run lifecycle**: the caller drove the converter out of order
//!   ([`ConvertError::RunNotReset`], [`ConvertError::MultipleDocuments`]).

use crate::convert::RunState;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the mediaconv library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The unit's bytes could not be read or parsed as the expected format
    /// (missing file, zero bytes, corrupt data, wrong extension).
    #[error("Cannot read input '{name}': {reason}")]
    UnreadableInput { name: String, reason: String },

    /// The document bytes were loaded but the rasteriser could not open them.
    #[error("Cannot open document '{name}': {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    UnreadableDocument { name: String, detail: String },

    /// The raster encoder rejected the requested output encoding.
    #[error("Encoding '{encoding}' is not supported here: {detail}")]
    EncodeUnsupported { encoding: String, detail: String },

    /// A whole-batch conversion was invoked with zero units.
    #[error("No input files were supplied")]
    EmptyBatch,

    // ── Collaborator errors ───────────────────────────────────────────────
    /// The document-construction collaborator is not available.
    #[error("Document library unavailable: {0}")]
    DocumentLibraryUnavailable(String),

    /// The archive collaborator is not available.
    #[error("Archive library unavailable: {0}")]
    ArchiveLibraryUnavailable(String),

    /// Some other external capability could not be reached when first used.
    #[error(
        "{collaborator} is unavailable: {detail}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium-directory or install pdfium system-wide."
    )]
    CollaboratorUnavailable {
        collaborator: String,
        detail: String,
    },

    // ── Run lifecycle errors ──────────────────────────────────────────────
    /// `document-to-images` accepts exactly one document per batch.
    #[error("document-to-images converts one document at a time, {count} were selected")]
    MultipleDocuments { count: usize },

    /// A new run was requested before the previous one was reset.
    #[error("Previous run is {state}; call reset() before starting another run")]
    RunNotReset { state: RunState },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Options builder validation failed.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write an artifact to disk.
    #[error("Failed to write artifact '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    pub(crate) fn unreadable(name: impl Into<String>, reason: impl ToString) -> Self {
        ConvertError::UnreadableInput {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Map an `image` encoder failure to the error the caller sees.
    ///
    /// Unsupported colour types or formats become
    /// [`ConvertError::EncodeUnsupported`]; anything else is internal.
    pub(crate) fn from_encode(encoding: &str, err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => ConvertError::EncodeUnsupported {
                encoding: encoding.to_string(),
                detail: e.to_string(),
            },
            other => ConvertError::Internal(format!("{encoding} encoding failed: {other}")),
        }
    }
}
