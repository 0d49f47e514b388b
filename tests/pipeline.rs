//! Integration tests for the batch pipeline.
//!
//! These exercise the orchestrator end to end with the real `image`, `lopdf`
//! and `zip` collaborators. Page rasterisation uses a lopdf-backed fake so
//! the suite runs without a pdfium shared library; the pdfium round trip
//! lives in `tests/e2e.rs`.

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use mediaconv::pipeline::document::{DocumentAssembler, DocumentSink, PdfAssembler};
use mediaconv::pipeline::render::{DocumentRasterizer, PagedDocument};
use mediaconv::{
    BatchConverter, Collaborators, ContentKind, ConversionMode, ConversionOptions,
    ConversionProgressCallback, ConvertError, InputUnit, RunState, RunStatus, TargetEncoding,
};
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs to the test harness; `RUST_LOG=mediaconv=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn png(name: &str, w: u32, h: u32) -> InputUnit {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
    .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
    .unwrap();
    InputUnit::from_bytes(name, buf)
}

/// Build a PDF with `pages` pages through the images-to-document mode.
async fn pdf_with_pages(pages: usize) -> Vec<u8> {
    let mut c = BatchConverter::with_collaborators(Collaborators::default());
    let units = (0..pages).map(|i| png(&format!("p{i}.png"), 40, 30)).collect();
    c.select_batch(units, ConversionMode::ImagesToDocument).unwrap();
    let run = c.run().await.unwrap().unwrap();
    c.artifact(run.artifacts[0].handle).unwrap().bytes().to_vec()
}

/// Counts pages with lopdf and renders each as a flat 20x30pt surface.
struct LopdfRasterizer {
    delay: Duration,
}

impl LopdfRasterizer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::ZERO,
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay })
    }
}

struct LopdfPages {
    count: usize,
    delay: Duration,
}

impl DocumentRasterizer for LopdfRasterizer {
    fn open<'a>(
        &'a self,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<Box<dyn PagedDocument + 'a>, ConvertError> {
        let doc = lopdf::Document::load_mem(&bytes).map_err(|e| {
            ConvertError::UnreadableDocument {
                name: name.to_string(),
                detail: e.to_string(),
            }
        })?;
        Ok(Box::new(LopdfPages {
            count: doc.get_pages().len(),
            delay: self.delay,
        }))
    }
}

impl PagedDocument for LopdfPages {
    fn page_count(&self) -> usize {
        self.count
    }

    fn page_size(&self, _index: usize) -> Result<(f32, f32), ConvertError> {
        Ok((20.0, 30.0))
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage, ConvertError> {
        std::thread::sleep(self.delay);
        let shade = (index * 40 % 256) as u8;
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            (20.0 * scale) as u32,
            (30.0 * scale) as u32,
            Rgb([shade, shade, shade]),
        )))
    }
}

fn converter_with_fake_rasterizer() -> BatchConverter {
    BatchConverter::with_collaborators(Collaborators::default().with_rasterizer(LopdfRasterizer::new()))
}

fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut f = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            f.read_to_end(&mut data).unwrap();
            (f.name().to_string(), data)
        })
        .collect()
}

#[derive(Default)]
struct Recorder {
    stages: Mutex<Vec<RunState>>,
    started: Mutex<Vec<String>>,
    failures: Mutex<Vec<String>>,
}

impl ConversionProgressCallback for Recorder {
    fn on_stage(&self, state: RunState) {
        self.stages.lock().unwrap().push(state);
    }

    fn on_unit_start(&self, _index: usize, _total: usize, name: &str) {
        self.started.lock().unwrap().push(name.to_string());
    }

    fn on_run_failed(&self, error: &str) {
        self.failures.lock().unwrap().push(error.to_string());
    }
}

// ── Mode behaviour ───────────────────────────────────────────────────────────

#[tokio::test]
async fn recode_png_to_jpeg_keeps_dimensions() {
    let mut c = BatchConverter::new();
    c.set_options(
        ConversionMode::ImageRecode,
        ConversionOptions::with_target(TargetEncoding::Jpeg),
    );
    c.select_batch(vec![png("photo.png", 100, 50)], ConversionMode::ImageRecode)
        .unwrap();

    let run = c.run().await.unwrap().expect("run should happen");
    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(run.artifact_names(), ["photo.jpeg"]);

    let artifact = c.artifact(run.artifacts[0].handle).unwrap();
    assert_eq!(artifact.kind(), ContentKind::Image);
    assert_eq!(
        image::guess_format(artifact.bytes()).unwrap(),
        image::ImageFormat::Jpeg
    );
    assert_eq!(
        image::load_from_memory(artifact.bytes()).unwrap().dimensions(),
        (100, 50)
    );
}

#[tokio::test]
async fn recode_batch_is_exposed_individually_in_order() {
    let mut c = BatchConverter::new();
    c.set_options(
        ConversionMode::ImageRecode,
        ConversionOptions::with_target(TargetEncoding::Png),
    );
    c.select_batch(
        vec![png("z.png", 4, 4), png("a.b.png", 5, 5), png("m.png", 6, 6)],
        ConversionMode::ImageRecode,
    )
    .unwrap();

    let run = c.run().await.unwrap().unwrap();
    assert_eq!(run.artifact_names(), ["z.png", "a.png", "m.png"]);
    assert_eq!(run.stats.units, 3);
    assert_eq!(run.stats.produced, 3);
}

#[tokio::test]
async fn images_become_one_page_each() {
    let mut c = BatchConverter::new();
    c.select_batch(
        vec![png("a.png", 200, 100), png("b.png", 100, 200)],
        ConversionMode::ImagesToDocument,
    )
    .unwrap();

    let run = c.run().await.unwrap().unwrap();
    assert_eq!(run.artifact_names(), ["converted_images.pdf"]);

    let artifact = c.artifact(run.artifacts[0].handle).unwrap();
    assert_eq!(artifact.kind(), ContentKind::Document);
    let doc = lopdf::Document::load_mem(artifact.bytes()).unwrap();
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 2);

    // 200x100 on A4 portrait: full width, centred vertically.
    let first = *pages.values().next().unwrap();
    let content = lopdf::content::Content::decode(&doc.get_page_content(first).unwrap()).unwrap();
    let cm = content
        .operations
        .iter()
        .find(|op| op.operator == "cm")
        .expect("image transform");
    let m: Vec<f32> = cm.operands.iter().map(|o| o.as_float().unwrap()).collect();
    let close = |a: f32, b: f32| (a - b).abs() < 0.05;
    assert!(close(m[0], 595.28), "width {}", m[0]);
    assert!(close(m[3], 297.64), "height {}", m[3]);
    assert!(close(m[4], 0.0), "x {}", m[4]);
    assert!(close(m[5], 272.125), "y {}", m[5]);
}

#[tokio::test]
async fn same_base_name_yields_distinct_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut c = BatchConverter::new();
    c.select_batch(
        vec![png("photo.png", 4, 4), png("photo.jpg", 4, 4)],
        ConversionMode::ImageRecode,
    )
    .unwrap();

    let run = c.run().await.unwrap().unwrap();
    assert!(run.succeeded());
    assert_eq!(run.artifact_names(), ["photo.jpeg", "photo (2).jpeg"]);

    let written = c.registry().write_all(dir.path()).await.unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[tokio::test]
async fn in_memory_names_cannot_leave_output_dir() {
    let root = tempfile::tempdir().unwrap();
    let out = root.path().join("out");
    let mut c = BatchConverter::new();
    c.select_batch(
        vec![png("../../escape.png", 4, 4)],
        ConversionMode::ImageRecode,
    )
    .unwrap();

    let run = c.run().await.unwrap().unwrap();
    assert_eq!(run.artifact_names(), ["escape.jpeg"]);

    let written = c.registry().write_all(&out).await.unwrap();
    assert_eq!(written, [out.join("escape.jpeg")]);
    assert!(!root.path().join("escape.jpeg").exists());
}

#[tokio::test]
async fn explicit_collaborators_cover_assembly_and_bundling() {
    let collaborators = Collaborators::none()
        .with_rasterizer(LopdfRasterizer::new())
        .with_documents(Arc::new(PdfAssembler::default()))
        .with_archives(Arc::new(mediaconv::pipeline::archive::ZipAssembler));

    let mut c = BatchConverter::with_collaborators(collaborators.clone());
    c.select_batch(
        vec![png("a.png", 8, 8), png("b.png", 8, 8)],
        ConversionMode::ImagesToDocument,
    )
    .unwrap();
    let run = c.run().await.unwrap().unwrap();
    let pdf = c.artifact(run.artifacts[0].handle).unwrap().bytes().to_vec();

    let mut c = BatchConverter::with_collaborators(collaborators);
    c.select_batch(
        vec![InputUnit::from_bytes("doc.pdf", pdf)],
        ConversionMode::DocumentToImages,
    )
    .unwrap();
    let run = c.run().await.unwrap().unwrap();
    assert_eq!(run.artifact_names(), ["converted_pages.zip"]);
}

#[tokio::test]
async fn multi_page_document_is_zipped() {
    init_tracing();
    let pdf = pdf_with_pages(3).await;

    let mut c = converter_with_fake_rasterizer();
    c.set_options(
        ConversionMode::DocumentToImages,
        ConversionOptions::with_target(TargetEncoding::Png),
    );
    c.select_batch(
        vec![InputUnit::from_bytes("doc.pdf", pdf)],
        ConversionMode::DocumentToImages,
    )
    .unwrap();

    let run = c.run().await.unwrap().unwrap();
    assert_eq!(run.artifact_names(), ["converted_pages.zip"]);
    assert_eq!(run.stats.produced, 3);

    let artifact = c.artifact(run.artifacts[0].handle).unwrap();
    assert_eq!(artifact.kind(), ContentKind::Archive);
    let entries = zip_entries(artifact.bytes());
    let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["page_1.png", "page_2.png", "page_3.png"]);
    for (_, data) in &entries {
        let page = image::load_from_memory(data).unwrap();
        assert_eq!(page.dimensions(), (30, 45));
    }
}

#[tokio::test]
async fn single_page_document_is_not_zipped() {
    let pdf = pdf_with_pages(1).await;

    let mut c = converter_with_fake_rasterizer();
    c.select_batch(
        vec![InputUnit::from_bytes("doc.pdf", pdf)],
        ConversionMode::DocumentToImages,
    )
    .unwrap();

    let run = c.run().await.unwrap().unwrap();
    assert_eq!(run.artifact_names(), ["page_1.jpeg"]);
    assert_eq!(run.artifacts[0].kind, ContentKind::Image);
}

// ── Failure handling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn one_bad_unit_fails_the_whole_run() {
    init_tracing();
    let rec = Arc::new(Recorder::default());
    let mut c = BatchConverter::new().with_progress(rec.clone());
    c.select_batch(
        vec![
            png("good.png", 8, 8),
            InputUnit::from_bytes("broken.png", b"definitely not a png".to_vec()),
            png("never.png", 8, 8),
        ],
        ConversionMode::ImageRecode,
    )
    .unwrap();

    let err = c.run().await.unwrap_err();
    match err {
        ConvertError::UnreadableInput { ref name, .. } => assert_eq!(name, "broken.png"),
        ref other => panic!("unexpected error: {other}"),
    }

    assert_eq!(c.state(), RunState::Failed);
    assert!(c.registry().is_empty());
    let last = c.last_run().unwrap();
    assert_eq!(last.status, RunStatus::Failed);
    assert!(last.artifacts.is_empty());
    assert_eq!(last.error.as_deref(), Some(err.to_string().as_str()));

    // Sequential with early exit: the third unit is never touched.
    assert_eq!(*rec.started.lock().unwrap(), ["good.png", "broken.png"]);
    assert_eq!(rec.failures.lock().unwrap().len(), 1);
    assert_eq!(rec.stages.lock().unwrap().last(), Some(&RunState::Failed));
}

#[tokio::test]
async fn missing_archiver_is_reported_at_packaging() {
    let pdf = pdf_with_pages(2).await;
    let mut c = BatchConverter::with_collaborators(
        Collaborators::none().with_rasterizer(LopdfRasterizer::new()),
    );
    c.select_batch(
        vec![InputUnit::from_bytes("doc.pdf", pdf)],
        ConversionMode::DocumentToImages,
    )
    .unwrap();

    let err = c.run().await.unwrap_err();
    assert!(matches!(err, ConvertError::ArchiveLibraryUnavailable(_)));
    assert_eq!(c.state(), RunState::Failed);
    assert!(c.registry().is_empty());
}

#[tokio::test]
async fn missing_document_builder_is_reported_on_first_use() {
    let mut c = BatchConverter::with_collaborators(Collaborators::none());
    c.select_batch(vec![png("a.png", 2, 2)], ConversionMode::ImagesToDocument)
        .unwrap();
    let err = c.run().await.unwrap_err();
    assert!(matches!(err, ConvertError::DocumentLibraryUnavailable(_)));
}

#[tokio::test]
async fn non_pdf_document_is_unreadable() {
    let mut c = converter_with_fake_rasterizer();
    c.select_batch(
        vec![png("not-a-doc.pdf", 4, 4)],
        ConversionMode::DocumentToImages,
    )
    .unwrap();
    let err = c.run().await.unwrap_err();
    assert!(matches!(err, ConvertError::UnreadableInput { .. }));
}

// ── Lifecycle ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reset_then_rerun_matches_fresh_run() {
    let batch = || vec![png("a.png", 30, 20), png("b.png", 10, 40)];
    let fingerprint = |c: &BatchConverter| {
        c.registry()
            .iter()
            .map(|a| (a.name().to_string(), a.bytes().len()))
            .collect::<Vec<_>>()
    };

    let mut reused = BatchConverter::new();
    reused
        .select_batch(batch(), ConversionMode::ImagesToDocument)
        .unwrap();
    reused.run().await.unwrap().unwrap();
    assert_eq!(reused.reset(), 1);
    assert!(reused.registry().is_empty());

    reused
        .select_batch(batch(), ConversionMode::ImagesToDocument)
        .unwrap();
    reused.run().await.unwrap().unwrap();

    let mut fresh = BatchConverter::new();
    fresh
        .select_batch(batch(), ConversionMode::ImagesToDocument)
        .unwrap();
    fresh.run().await.unwrap().unwrap();

    assert_eq!(fingerprint(&reused), fingerprint(&fresh));
}

#[tokio::test]
async fn stale_handles_stop_resolving_after_reset() {
    let mut c = BatchConverter::new();
    c.select_batch(vec![png("a.png", 3, 3)], ConversionMode::ImageRecode)
        .unwrap();
    let run = c.run().await.unwrap().unwrap();
    let handle = run.artifacts[0].handle;
    assert!(c.artifact(handle).is_some());

    c.reset();
    assert!(c.artifact(handle).is_none());
}

#[tokio::test]
async fn per_unit_mode_interleaves_loading_and_converting() {
    let rec = Arc::new(Recorder::default());
    let mut c = BatchConverter::new().with_progress(rec.clone());
    c.select_batch(
        vec![png("a.png", 2, 2), png("b.png", 2, 2)],
        ConversionMode::ImageRecode,
    )
    .unwrap();
    c.run().await.unwrap().unwrap();

    use RunState::*;
    assert_eq!(
        *rec.stages.lock().unwrap(),
        [Loading, Converting, Loading, Converting, Packaging, Done]
    );
}

#[tokio::test]
async fn abandoned_run_is_recovered_by_reset() {
    init_tracing();
    let pdf = pdf_with_pages(3).await;
    let mut c = BatchConverter::with_collaborators(
        Collaborators::default().with_rasterizer(LopdfRasterizer::slow(Duration::from_millis(150))),
    );
    c.select_batch(
        vec![InputUnit::from_bytes("doc.pdf", pdf)],
        ConversionMode::DocumentToImages,
    )
    .unwrap();

    let outcome = tokio::time::timeout(Duration::from_millis(20), c.run()).await;
    assert!(outcome.is_err(), "run should still be in flight");
    assert_ne!(c.state(), RunState::Idle);
    assert!(c.registry().is_empty());

    let err = c.run().await.unwrap_err();
    assert!(matches!(err, ConvertError::RunNotReset { .. }));

    c.reset();
    assert_eq!(c.state(), RunState::Idle);
    c.select_batch(vec![png("a.png", 2, 2)], ConversionMode::ImageRecode)
        .unwrap();
    let run = c.run().await.unwrap().unwrap();
    assert_eq!(run.artifact_names(), ["a.jpeg"]);
}

#[tokio::test]
async fn artifacts_are_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut c = BatchConverter::new();
    c.set_options(
        ConversionMode::ImageRecode,
        ConversionOptions::with_target(TargetEncoding::Webp),
    );
    c.select_batch(
        vec![png("one.png", 5, 5), png("two.png", 6, 6)],
        ConversionMode::ImageRecode,
    )
    .unwrap();
    c.run().await.unwrap().unwrap();

    let written = c.registry().write_all(dir.path()).await.unwrap();
    assert_eq!(written.len(), 2);
    assert!(dir.path().join("one.webp").exists());
    let two = std::fs::read(dir.path().join("two.webp")).unwrap();
    assert_eq!(image::load_from_memory(&two).unwrap().dimensions(), (6, 6));
}

#[tokio::test]
async fn run_record_serialises_to_json() {
    let mut c = BatchConverter::new();
    c.select_batch(vec![png("a.png", 2, 2)], ConversionMode::ImageRecode)
        .unwrap();
    let run = c.run().await.unwrap().unwrap();

    let json = serde_json::to_value(&run).unwrap();
    assert_eq!(json["mode"], "image-recode");
    assert_eq!(json["artifacts"][0]["name"], "a.jpeg");
}

#[test]
fn default_assembler_is_a4() {
    let a = PdfAssembler::default();
    let sink: Box<dyn DocumentSink> = a.new_document();
    let page = sink.page_size();
    assert!((page.width - 595.28).abs() < 0.01);
    assert!((page.height - 841.89).abs() < 0.01);
}
