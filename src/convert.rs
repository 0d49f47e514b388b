//! Batch orchestration: select → run → collect → reset.
//!
//! [`BatchConverter`] owns everything that changes during a run: the selected
//! batch, the active mode, per-mode options, the run state and the artifact
//! registry. Adapters and collaborators never see any of it.
//!
//! ## Run state machine
//!
//! ```text
//!           run()                                   reset()
//!  Idle ──────────▶ Loading ⇄ Converting ──▶ Packaging ──▶ Done ──────▶ Idle
//!                      │           │             │
//!                      └───────────┴─────────────┴──▶ Failed ─────────▶ Idle
//! ```
//!
//! Per-unit modes alternate `Loading`/`Converting` for each unit, so only
//! one decoded unit is held at a time. Whole-batch modes load every unit
//! first and convert once. A run is atomic: results are registered only after
//! packaging succeeds, and the first error ends the run with nothing exposed.

use crate::adapter::{adapter_for, CodecAdapter};
use crate::config::{AdapterScope, ConversionMode, ConversionOptions};
use crate::error::ConvertError;
use crate::output::{BatchRun, ConversionResult, RunStats, RunStatus};
use crate::packaging;
use crate::pipeline::input::InputUnit;
use crate::pipeline::loader;
use crate::pipeline::Collaborators;
use crate::progress::ProgressCallback;
use crate::registry::{Artifact, ArtifactHandle, ArtifactRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Where the converter is in its run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Loading,
    Converting,
    Packaging,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::Idle => "idle",
            RunState::Loading => "loading",
            RunState::Converting => "converting",
            RunState::Packaging => "packaging",
            RunState::Done => "done",
            RunState::Failed => "failed",
        })
    }
}

/// The conversion orchestrator.
pub struct BatchConverter {
    collaborators: Collaborators,
    progress: Option<ProgressCallback>,
    batch: Vec<InputUnit>,
    mode: Option<ConversionMode>,
    options: HashMap<ConversionMode, ConversionOptions>,
    state: RunState,
    runs_started: u64,
    last_run: Option<BatchRun>,
    registry: ArtifactRegistry,
}

impl Default for BatchConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BatchConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConverter")
            .field("collaborators", &self.collaborators)
            .field("progress", &self.progress.as_ref().map(|_| "<dyn ConversionProgressCallback>"))
            .field("batch", &self.batch.iter().map(|u| u.name()).collect::<Vec<_>>())
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("live_artifacts", &self.registry.len())
            .finish()
    }
}

impl BatchConverter {
    /// A converter with the default collaborators (pdfium, lopdf, zip).
    pub fn new() -> Self {
        Self::with_collaborators(Collaborators::default())
    }

    pub fn with_collaborators(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            progress: None,
            batch: Vec::new(),
            mode: None,
            options: HashMap::new(),
            state: RunState::Idle,
            runs_started: 0,
            last_run: None,
            registry: ArtifactRegistry::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    // ── Caller API ───────────────────────────────────────────────────────

    /// Replace the selected batch and mode. The previous batch is dropped.
    ///
    /// `document-to-images` takes exactly one document; selecting more is
    /// rejected here rather than silently ignoring the extras.
    pub fn select_batch(
        &mut self,
        units: Vec<InputUnit>,
        mode: ConversionMode,
    ) -> Result<(), ConvertError> {
        if mode == ConversionMode::DocumentToImages && units.len() > 1 {
            return Err(ConvertError::MultipleDocuments { count: units.len() });
        }
        debug!("Selected {} units for {}", units.len(), mode);
        self.batch = units;
        self.mode = Some(mode);
        Ok(())
    }

    /// Configure `mode`. Takes effect from the next run.
    pub fn set_options(&mut self, mode: ConversionMode, options: ConversionOptions) {
        self.options.insert(mode, options);
    }

    pub fn options_for(&self, mode: ConversionMode) -> ConversionOptions {
        self.options.get(&mode).cloned().unwrap_or_default()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn mode(&self) -> Option<ConversionMode> {
        self.mode
    }

    pub fn batch(&self) -> &[InputUnit] {
        &self.batch
    }

    /// Record of the most recent run since the last reset.
    pub fn last_run(&self) -> Option<&BatchRun> {
        self.last_run.as_ref()
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    pub fn artifact(&self, handle: ArtifactHandle) -> Option<&Artifact> {
        self.registry.get(handle)
    }

    /// Hand an artifact over to the caller; its handle stops resolving.
    pub fn take_artifact(&mut self, handle: ArtifactHandle) -> Option<Artifact> {
        self.registry.take(handle)
    }

    /// Discard the batch, the last run and every live artifact; back to `Idle`.
    ///
    /// Also the way to abandon a run whose future was dropped mid-flight.
    /// Returns the number of artifacts released.
    pub fn reset(&mut self) -> usize {
        let released = self.registry.release_all();
        self.batch.clear();
        self.mode = None;
        self.last_run = None;
        self.set_state(RunState::Idle);
        released
    }

    /// Run the selected batch.
    ///
    /// # Returns
    /// * `Ok(Some(run))`: the run succeeded; its artifacts are in the registry
    /// * `Ok(None)`: nothing selected; no run took place
    ///
    /// # Errors
    /// The first error raised by loading, converting or packaging, unchanged.
    /// The converter is then `Failed` and exposes no results until reset.
    /// [`ConvertError::RunNotReset`] if the previous run was not reset.
    pub async fn run(&mut self) -> Result<Option<BatchRun>, ConvertError> {
        if self.state != RunState::Idle {
            return Err(ConvertError::RunNotReset { state: self.state });
        }
        let mode = match self.mode {
            Some(mode) if !self.batch.is_empty() => mode,
            _ => {
                debug!("Nothing selected; run is a no-op");
                return Ok(None);
            }
        };

        let total_start = Instant::now();
        let options = self.options_for(mode);
        self.runs_started += 1;
        let id = self.runs_started;
        let inputs: Vec<String> = self.batch.iter().map(|u| u.name().to_string()).collect();
        info!("Starting run {}: {} units, mode {}", id, inputs.len(), mode);

        if let Some(ref cb) = self.progress {
            cb.on_run_start(inputs.len());
        }

        let mut stats = RunStats {
            units: inputs.len(),
            ..RunStats::default()
        };
        let outcome = self.execute(mode, &options, &mut stats).await;
        stats.total_duration_ms = elapsed_ms(total_start);

        let mut run = BatchRun {
            id,
            mode,
            options,
            inputs,
            artifacts: Vec::new(),
            status: RunStatus::Failed,
            error: None,
            stats,
        };

        match outcome {
            Ok(results) => {
                run.artifacts = self.registry.register(results);
                run.status = RunStatus::Succeeded;
                self.set_state(RunState::Done);
                info!(
                    "Run {} complete: {} artifacts, {}ms total",
                    id,
                    run.artifacts.len(),
                    run.stats.total_duration_ms
                );
                if let Some(ref cb) = self.progress {
                    cb.on_run_complete(run.artifacts.len());
                }
                self.last_run = Some(run.clone());
                Ok(Some(run))
            }
            Err(e) => {
                error!("Run {} failed: {}", id, e);
                run.error = Some(e.to_string());
                self.set_state(RunState::Failed);
                if let Some(ref cb) = self.progress {
                    cb.on_run_failed(&e.to_string());
                }
                self.last_run = Some(run);
                Err(e)
            }
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn set_state(&mut self, state: RunState) {
        if self.state != state {
            debug!("State {} → {}", self.state, state);
        }
        self.state = state;
        if let Some(ref cb) = self.progress {
            cb.on_stage(state);
        }
    }

    async fn execute(
        &mut self,
        mode: ConversionMode,
        options: &ConversionOptions,
        stats: &mut RunStats,
    ) -> Result<Vec<ConversionResult>, ConvertError> {
        let units = self.batch.clone();
        let total = units.len();
        let kind = mode.input_kind();
        let adapter = adapter_for(mode, &self.collaborators);
        let progress = self.progress.clone();

        let results = match mode.scope() {
            // ── Per unit: load, convert, record, next ────────────────────
            AdapterScope::PerUnit => {
                let mut results = Vec::with_capacity(total);
                for (i, unit) in units.iter().enumerate() {
                    self.set_state(RunState::Loading);
                    if let Some(ref cb) = progress {
                        cb.on_unit_start(i, total, unit.name());
                    }
                    let t = Instant::now();
                    let loaded = loader::load(unit, kind).await?;
                    stats.load_duration_ms += elapsed_ms(t);

                    self.set_state(RunState::Converting);
                    let t = Instant::now();
                    let produced = convert_blocking(&adapter, vec![loaded], options).await?;
                    stats.convert_duration_ms += elapsed_ms(t);

                    if let Some(ref cb) = progress {
                        cb.on_unit_complete(i, total, produced.len());
                    }
                    results.extend(produced);
                }
                results
            }
            // ── Whole batch: load all, convert once ──────────────────────
            AdapterScope::WholeBatch => {
                self.set_state(RunState::Loading);
                let t = Instant::now();
                let mut loaded = Vec::with_capacity(total);
                for (i, unit) in units.iter().enumerate() {
                    if let Some(ref cb) = progress {
                        cb.on_unit_start(i, total, unit.name());
                    }
                    loaded.push(loader::load(unit, kind).await?);
                    if let Some(ref cb) = progress {
                        cb.on_unit_complete(i, total, 0);
                    }
                }
                stats.load_duration_ms = elapsed_ms(t);

                self.set_state(RunState::Converting);
                let t = Instant::now();
                let results = convert_blocking(&adapter, loaded, options).await?;
                stats.convert_duration_ms = elapsed_ms(t);
                results
            }
        };
        stats.produced = results.len();
        debug!("Adapter produced {} results", results.len());

        // ── Packaging ────────────────────────────────────────────────────
        self.set_state(RunState::Packaging);
        let archives = self.collaborators.archives.clone();
        tokio::task::spawn_blocking(move || packaging::package(mode, results, archives.as_ref()))
            .await
            .map_err(|e| ConvertError::Internal(format!("Packaging task panicked: {e}")))?
    }
}

/// Run an adapter on the blocking pool and wait for it.
async fn convert_blocking(
    adapter: &Arc<dyn CodecAdapter>,
    units: Vec<loader::LoadedUnit>,
    options: &ConversionOptions,
) -> Result<Vec<ConversionResult>, ConvertError> {
    let adapter = Arc::clone(adapter);
    let options = options.clone();
    tokio::task::spawn_blocking(move || adapter.convert(units, &options))
        .await
        .map_err(|e| ConvertError::Internal(format!("Conversion task panicked: {e}")))?
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

// ── One-shot entry points ────────────────────────────────────────────────

/// Convert one batch with the default collaborators and return its artifacts.
///
/// An empty `units` list yields an empty result.
pub async fn convert(
    units: Vec<InputUnit>,
    mode: ConversionMode,
    options: ConversionOptions,
) -> Result<Vec<Artifact>, ConvertError> {
    let mut converter = BatchConverter::new();
    converter.select_batch(units, mode)?;
    converter.set_options(mode, options);
    let Some(run) = converter.run().await? else {
        return Ok(Vec::new());
    };
    Ok(run
        .artifacts
        .iter()
        .filter_map(|a| converter.take_artifact(a.handle))
        .collect())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    units: Vec<InputUnit>,
    mode: ConversionMode,
    options: ConversionOptions,
) -> Result<Vec<Artifact>, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert(units, mode, options))
}
