//! Artifact registry: live result payloads awaiting download or cleanup.
//!
//! The orchestrator registers a run's packaged results here once the run has
//! succeeded, never before, so a failed run leaves the registry untouched.
//! Handles are never reused, so a handle kept from an earlier run simply
//! stops resolving once that run is reset.

use crate::error::ConvertError;
use crate::output::{ArtifactSummary, ContentKind, ConversionResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Opaque, revocable reference to a registered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactHandle(u64);

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "artifact:{}", self.0)
    }
}

/// A user-facing output.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub handle: ArtifactHandle,
    pub result: ConversionResult,
}

impl Artifact {
    pub fn name(&self) -> &str {
        &self.result.name
    }

    pub fn kind(&self) -> ContentKind {
        self.result.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.result.bytes
    }

    /// `data:<mime>;base64,<payload>` for callers that hand out URIs.
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.result.mime_type,
            STANDARD.encode(&self.result.bytes)
        )
    }

    fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            handle: self.handle,
            name: self.result.name.clone(),
            kind: self.result.kind,
            size_bytes: self.result.bytes.len(),
        }
    }
}

/// Tracks live artifacts in registration order.
#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    next: u64,
    live: Vec<Artifact>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `results` and hand back their summaries.
    pub fn register(&mut self, results: Vec<ConversionResult>) -> Vec<ArtifactSummary> {
        results
            .into_iter()
            .map(|result| {
                self.next += 1;
                let artifact = Artifact {
                    handle: ArtifactHandle(self.next),
                    result,
                };
                debug!("Registered {} as {}", artifact.name(), artifact.handle);
                let summary = artifact.summary();
                self.live.push(artifact);
                summary
            })
            .collect()
    }

    pub fn get(&self, handle: ArtifactHandle) -> Option<&Artifact> {
        self.live.iter().find(|a| a.handle == handle)
    }

    /// Remove and return an artifact; its handle stops resolving.
    pub fn take(&mut self, handle: ArtifactHandle) -> Option<Artifact> {
        let pos = self.live.iter().position(|a| a.handle == handle)?;
        Some(self.live.remove(pos))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.live.iter()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Drop every live artifact. Returns how many were released.
    pub fn release_all(&mut self) -> usize {
        let released = self.live.len();
        self.live.clear();
        if released > 0 {
            info!("Released {} artifacts", released);
        }
        released
    }

    /// Write every live artifact into `dir` under its suggested name.
    ///
    /// Each file is written to a temp name and renamed into place, so a
    /// crash never leaves a truncated artifact behind. Names that are not a
    /// bare file name, or that repeat, are rejected before anything is
    /// written.
    pub async fn write_all(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, ConvertError> {
        let dir = dir.as_ref();
        let mut names = HashSet::with_capacity(self.live.len());
        for artifact in &self.live {
            let name = artifact.name();
            let rejected = |kind: io::ErrorKind, msg: &str| ConvertError::OutputWriteFailed {
                path: dir.join(name),
                source: io::Error::new(kind, format!("{msg}: {name:?}")),
            };
            if Path::new(name).file_name() != Some(OsStr::new(name)) {
                return Err(rejected(io::ErrorKind::InvalidInput, "not a plain file name"));
            }
            if !names.insert(name) {
                return Err(rejected(io::ErrorKind::AlreadyExists, "duplicate artifact name"));
            }
        }

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ConvertError::OutputWriteFailed {
                path: dir.to_path_buf(),
                source: e,
            })?;

        let mut written = Vec::with_capacity(self.live.len());
        for artifact in &self.live {
            let path = dir.join(artifact.name());
            let tmp_path = dir.join(format!(".{}.tmp", artifact.name()));
            let failed = |e| ConvertError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            };

            tokio::fs::write(&tmp_path, artifact.bytes())
                .await
                .map_err(failed)?;
            tokio::fs::rename(&tmp_path, &path).await.map_err(failed)?;
            debug!("Wrote {} ({} bytes)", path.display(), artifact.bytes().len());
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str) -> ConversionResult {
        ConversionResult::new(name, ContentKind::Image, "image/png", b"png!".to_vec())
    }

    #[test]
    fn handles_are_unique_across_releases() {
        let mut reg = ArtifactRegistry::new();
        let first = reg.register(vec![result("a.png")]);
        assert_eq!(reg.release_all(), 1);
        let second = reg.register(vec![result("a.png")]);
        assert_ne!(first[0].handle, second[0].handle);
        assert!(reg.get(first[0].handle).is_none());
        assert!(reg.get(second[0].handle).is_some());
    }

    #[test]
    fn take_consumes_artifact() {
        let mut reg = ArtifactRegistry::new();
        let s = reg.register(vec![result("a.png"), result("b.png")]);
        let taken = reg.take(s[0].handle).unwrap();
        assert_eq!(taken.name(), "a.png");
        assert_eq!(reg.len(), 1);
        assert!(reg.take(s[0].handle).is_none());
    }

    #[test]
    fn data_uri_carries_mime_and_base64() {
        let mut reg = ArtifactRegistry::new();
        let s = reg.register(vec![result("a.png")]);
        let uri = reg.get(s[0].handle).unwrap().data_uri();
        assert_eq!(uri, "data:image/png;base64,cG5nIQ==");
    }

    #[test]
    fn write_all_persists_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = ArtifactRegistry::new();
        reg.register(vec![result("a.png"), result("b.png")]);

        let written = tokio_test::block_on(reg.write_all(dir.path().join("out"))).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(std::fs::read(&written[1]).unwrap(), b"png!");
        assert!(!dir.path().join("out/.a.png.tmp").exists());
    }

    #[test]
    fn write_all_refuses_repeated_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = ArtifactRegistry::new();
        reg.register(vec![result("a.png"), result("a.png")]);

        let err = tokio_test::block_on(reg.write_all(dir.path())).unwrap_err();
        match err {
            ConvertError::OutputWriteFailed { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::AlreadyExists)
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("a.png").exists());
    }

    #[test]
    fn write_all_stays_inside_dir() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out");
        for name in ["../escape.png", "nested/a.png", "..", "/abs.png"] {
            let mut reg = ArtifactRegistry::new();
            reg.register(vec![result(name)]);
            let err = tokio_test::block_on(reg.write_all(&out)).unwrap_err();
            assert!(
                matches!(err, ConvertError::OutputWriteFailed { .. }),
                "{name}: {err}"
            );
        }
        assert!(!root.path().join("escape.png").exists());
        assert!(!out.join("nested").exists());
    }
}
