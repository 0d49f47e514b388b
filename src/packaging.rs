//! Packaging policy: how a run's results are exposed to the caller.
//!
//! The rule is a function of the mode and the result count only:
//!
//! | results | mode                 | exposure                              |
//! |---------|----------------------|---------------------------------------|
//! | 1       | any                  | the result itself                     |
//! | > 1     | `document-to-images` | one `converted_pages.zip`             |
//! | > 1     | `image-recode`       | every result individually             |
//! | > 1     | `images-to-document` | not produced (always one document)    |
//!
//! Recoded images stay separate files; extracted pages are bundled.

use crate::config::{ConversionMode, ARCHIVE_NAME};
use crate::error::ConvertError;
use crate::output::{ContentKind, ConversionResult};
use crate::pipeline::archive::ArchiveAssembler;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// How results are exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packaging {
    /// Exactly one result, exposed as-is.
    Single,
    /// Several results, each exposed on its own.
    Individual,
    /// Several results bundled into one archive.
    Bundle,
}

/// Decide the packaging for `count` results produced under `mode`.
pub fn decide(mode: ConversionMode, count: usize) -> Packaging {
    match (count, mode) {
        (0 | 1, _) => Packaging::Single,
        (_, ConversionMode::DocumentToImages) => Packaging::Bundle,
        (_, ConversionMode::ImageRecode | ConversionMode::ImagesToDocument) => {
            Packaging::Individual
        }
    }
}

/// Rename repeated result names to `stem (2).ext`, `stem (3).ext`, ...
///
/// The first occurrence keeps its name. Order is preserved.
pub fn dedupe_names(results: &mut [ConversionResult]) {
    let mut seen = HashSet::with_capacity(results.len());
    for r in results.iter_mut() {
        if seen.insert(r.name.clone()) {
            continue;
        }
        let (stem, ext) = match r.name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{ext}")),
            _ => (r.name.clone(), String::new()),
        };
        let renamed = (2..)
            .map(|n| format!("{stem} ({n}){ext}"))
            .find(|candidate| !seen.contains(candidate))
            .unwrap_or_default();
        debug!("Renamed duplicate {} to {}", r.name, renamed);
        seen.insert(renamed.clone());
        r.name = renamed;
    }
}

/// Apply the packaging decision.
///
/// Bundling is blocking work; call from the blocking pool.
pub fn package(
    mode: ConversionMode,
    mut results: Vec<ConversionResult>,
    archives: Option<&Arc<dyn ArchiveAssembler>>,
) -> Result<Vec<ConversionResult>, ConvertError> {
    dedupe_names(&mut results);
    let decision = decide(mode, results.len());
    debug!("Packaging {} results as {:?}", results.len(), decision);

    match decision {
        Packaging::Single | Packaging::Individual => Ok(results),
        Packaging::Bundle => {
            let archives = archives.ok_or_else(|| {
                ConvertError::ArchiveLibraryUnavailable("no archive assembler configured".into())
            })?;
            let mut archive = archives.new_archive();
            for r in &results {
                archive.add_entry(&r.name, &r.bytes)?;
            }
            let bytes = archive.export()?;
            info!("Bundled {} results into {}", results.len(), ARCHIVE_NAME);
            Ok(vec![ConversionResult::new(
                ARCHIVE_NAME,
                ContentKind::Archive,
                "application/zip",
                bytes,
            )])
        }
    }
}
