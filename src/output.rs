//! Result and run-record types.

use crate::config::{ConversionMode, ConversionOptions};
use crate::registry::ArtifactHandle;
use serde::{Deserialize, Serialize};

/// What a payload contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Image,
    Document,
    Archive,
}

/// One named payload produced by a codec adapter or by packaging.
#[derive(Clone, PartialEq, Eq)]
pub struct ConversionResult {
    /// Suggested download name, unique within a run.
    pub name: String,
    pub kind: ContentKind,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ConversionResult {
    pub fn new(
        name: impl Into<String>,
        kind: ContentKind,
        mime_type: &'static str,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            mime_type,
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for ConversionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionResult")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("mime_type", &self.mime_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// Terminal status of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// A registered artifact as reported in a [`BatchRun`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub handle: ArtifactHandle,
    pub name: String,
    pub kind: ContentKind,
    pub size_bytes: usize,
}

/// Timing for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Number of input units in the batch.
    pub units: usize,
    /// Payloads produced by the adapter before packaging.
    pub produced: usize,
    pub load_duration_ms: u64,
    pub convert_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The record of one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRun {
    pub id: u64,
    pub mode: ConversionMode,
    pub options: ConversionOptions,
    /// Input unit names, in selection order.
    pub inputs: Vec<String>,
    /// Exposed artifacts, in result order. Empty for a failed run.
    pub artifacts: Vec<ArtifactSummary>,
    pub status: RunStatus,
    /// Display form of the terminal error of a failed run.
    pub error: Option<String>,
    pub stats: RunStats,
}

impl BatchRun {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn artifact_names(&self) -> Vec<&str> {
        self.artifacts.iter().map(|a| a.name.as_str()).collect()
    }
}
