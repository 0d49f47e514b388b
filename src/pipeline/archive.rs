//! Archive construction: bundle named payloads into one ZIP.

use crate::error::ConvertError;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Creates empty archives.
pub trait ArchiveAssembler: Send + Sync {
    fn new_archive(&self) -> Box<dyn ArchiveSink>;
}

/// An archive under construction. Entries keep insertion order.
pub trait ArchiveSink {
    fn add_entry(&mut self, name: &str, bytes: &[u8]) -> Result<(), ConvertError>;

    fn export(self: Box<Self>) -> Result<Vec<u8>, ConvertError>;
}

/// `zip`-backed archiver using deflate.
#[derive(Debug, Clone, Default)]
pub struct ZipAssembler;

impl ArchiveAssembler for ZipAssembler {
    fn new_archive(&self) -> Box<dyn ArchiveSink> {
        Box::new(ZipSink {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            entries: 0,
        })
    }
}

struct ZipSink {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    entries: usize,
}

fn zip_failed(e: impl std::fmt::Display) -> ConvertError {
    ConvertError::Internal(format!("ZIP assembly failed: {e}"))
}

impl ArchiveSink for ZipSink {
    fn add_entry(&mut self, name: &str, bytes: &[u8]) -> Result<(), ConvertError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer.start_file(name, options).map_err(zip_failed)?;
        self.writer.write_all(bytes).map_err(zip_failed)?;
        self.entries += 1;
        Ok(())
    }

    fn export(self: Box<Self>) -> Result<Vec<u8>, ConvertError> {
        let ZipSink { writer, entries } = *self;
        let bytes = writer.finish().map_err(zip_failed)?.into_inner();
        debug!("Exported ZIP: {} entries, {} bytes", entries, bytes.len());
        Ok(bytes)
    }
}
