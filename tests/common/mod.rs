//! Test doubles shared by the integration tests.
//!
//! `MockPdfBackend` simulates a PDF with fixed per-page native text and
//! renders each page as a tiny file containing `page-<n>`. The mock
//! extractors read those bytes back, so a page's text proves which image it
//! came from.

#![allow(dead_code)]

use async_trait::async_trait;
use docextract::config::RasterProfile;
use docextract::pipeline::pdf::BackendError;
use docextract::{
    DocExtractError, DocumentExtractor, ExtractionConfig, ExtractorError, ExtractorSet,
    PageTextExtractor, PdfBackend, ProcessingMode,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── PDF backend ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockPdfBackend {
    /// Native text per page; the page count is its length.
    pub texts: Vec<String>,
    /// `page_count` fails as if the PDF were corrupt.
    pub unreadable: bool,
    /// `page_count` fails as if no pdfium library could be bound.
    pub missing_library: bool,
    /// Pages whose rendering fails.
    pub fail_render: HashSet<usize>,
    /// Pages whose native text fetch fails.
    pub fail_text: HashSet<usize>,
    /// Pages passed to `page_texts`, flattened.
    pub text_requests: Mutex<Vec<usize>>,
    /// Every `(page, profile)` rendered.
    pub renders: Mutex<Vec<(usize, RasterProfile)>>,
}

impl MockPdfBackend {
    /// A scanned document: `pages` pages with no native text.
    pub fn scanned(pages: usize) -> Self {
        Self {
            texts: vec![String::new(); pages],
            ..Default::default()
        }
    }

    pub fn with_texts(texts: &[&str]) -> Self {
        Self {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn unreadable() -> Self {
        Self {
            unreadable: true,
            ..Default::default()
        }
    }

    pub fn without_pdfium() -> Self {
        Self {
            missing_library: true,
            ..Default::default()
        }
    }

    pub fn rendered_pages(&self) -> Vec<usize> {
        self.renders.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    pub fn rendered_profiles(&self) -> Vec<RasterProfile> {
        self.renders.lock().unwrap().iter().map(|(_, p)| *p).collect()
    }
}

#[async_trait]
impl PdfBackend for MockPdfBackend {
    async fn page_count(&self, pdf: &Path) -> Result<usize, DocExtractError> {
        if self.missing_library {
            return Err(DocExtractError::PdfiumBindingFailed(
                "libpdfium.so: cannot open shared object file".into(),
            ));
        }
        if self.unreadable {
            return Err(DocExtractError::CorruptPdf {
                path: pdf.to_path_buf(),
                detail: "invalid xref table".into(),
            });
        }
        Ok(self.texts.len())
    }

    async fn page_texts(&self, _pdf: &Path, pages: &[usize]) -> Vec<Result<String, BackendError>> {
        self.text_requests.lock().unwrap().extend_from_slice(pages);
        pages
            .iter()
            .map(|&p| {
                if self.fail_text.contains(&p) {
                    Err(BackendError::Pdf(format!("text layer of page {} unreadable", p)))
                } else {
                    Ok(self.texts[p - 1].clone())
                }
            })
            .collect()
    }

    async fn render_page(
        &self,
        _pdf: &Path,
        page: usize,
        profile: &RasterProfile,
        dest: &Path,
    ) -> Result<PathBuf, BackendError> {
        self.renders.lock().unwrap().push((page, *profile));
        if self.fail_render.contains(&page) {
            return Err(BackendError::Pdf(format!("cannot render page {}", page)));
        }
        std::fs::write(dest, format!("page-{}", page))
            .map_err(|e| BackendError::ImageWrite(e.to_string()))?;
        Ok(dest.to_path_buf())
    }
}

// ── Extractors ───────────────────────────────────────────────────────────────

/// Returns `"text of <image bytes>"`, optionally failing or sleeping per page.
#[derive(Default)]
pub struct EchoExtractor {
    /// Image payloads (`page-<n>`) that fail.
    pub fail_on: HashSet<String>,
    /// Per-page sleep keyed by page number.
    pub delays: Vec<(usize, Duration)>,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub models: Mutex<Vec<Option<String>>>,
    /// When set, records how many rendered files exist under this directory
    /// at the start of each call.
    pub watch_dir: Option<PathBuf>,
    pub files_seen: Mutex<Vec<usize>>,
}

impl EchoExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(pages: &[usize]) -> Self {
        Self {
            fail_on: pages.iter().map(|p| format!("page-{}", p)).collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageTextExtractor for EchoExtractor {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn extract(&self, image: &[u8], model: Option<&str>) -> Result<String, ExtractorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().unwrap().push(model.map(str::to_string));
        if let Some(ref dir) = self.watch_dir {
            self.files_seen.lock().unwrap().push(count_files(dir));
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let payload = String::from_utf8_lossy(image).to_string();
        let page: usize = payload
            .strip_prefix("page-")
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        if let Some((_, delay)) = self.delays.iter().find(|(p, _)| *p == page) {
            tokio::time::sleep(*delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on.contains(&payload) {
            return Err(ExtractorError::Engine(format!("cannot read {}", payload)));
        }
        Ok(format!("text of {}", payload))
    }
}

/// Never finishes within any sensible timeout.
pub struct StuckExtractor;

#[async_trait]
impl PageTextExtractor for StuckExtractor {
    fn name(&self) -> &'static str {
        "stuck"
    }

    async fn extract(&self, _image: &[u8], _model: Option<&str>) -> Result<String, ExtractorError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

/// Serves one page at a time, like a single engine behind a job queue, and
/// times each page from when its turn comes.
pub struct SingleLaneExtractor {
    pub per_page: Duration,
    pub limit: Duration,
    lane: tokio::sync::Mutex<()>,
}

impl SingleLaneExtractor {
    pub fn new(per_page: Duration, limit: Duration) -> Self {
        Self {
            per_page,
            limit,
            lane: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl PageTextExtractor for SingleLaneExtractor {
    fn name(&self) -> &'static str {
        "single-lane"
    }

    async fn extract(&self, image: &[u8], _model: Option<&str>) -> Result<String, ExtractorError> {
        let _turn = self.lane.lock().await;
        tokio::time::timeout(self.limit, tokio::time::sleep(self.per_page))
            .await
            .map_err(|_| ExtractorError::Timeout {
                secs: self.limit.as_secs(),
            })?;
        Ok(format!("text of {}", String::from_utf8_lossy(image)))
    }

    fn enforces_timeout(&self) -> bool {
        true
    }
}

/// Counts `shutdown` calls.
#[derive(Default)]
pub struct ShutdownProbe {
    pub shutdowns: AtomicUsize,
}

#[async_trait]
impl PageTextExtractor for ShutdownProbe {
    fn name(&self) -> &'static str {
        "probe"
    }

    async fn extract(&self, _image: &[u8], _model: Option<&str>) -> Result<String, ExtractorError> {
        Ok("probe".into())
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Regular files anywhere under `dir`.
pub fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|e| {
            let path = e.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

/// Config with scratch space under `work_dir` and a short page timeout.
pub fn test_config(work_dir: &Path) -> ExtractionConfig {
    ExtractionConfig::builder()
        .work_dir(work_dir)
        .page_timeout_secs(5)
        .build()
        .unwrap()
}

/// An extractor registered for every mode.
pub fn all_modes(extractor: Arc<dyn PageTextExtractor>) -> ExtractorSet {
    ExtractorSet::new()
        .with(ProcessingMode::Ocr, Arc::clone(&extractor))
        .with(ProcessingMode::Ollama, Arc::clone(&extractor))
        .with(ProcessingMode::OpenAi, extractor)
}

pub fn document_extractor(
    config: ExtractionConfig,
    backend: Arc<MockPdfBackend>,
    extractors: ExtractorSet,
) -> DocumentExtractor {
    DocumentExtractor::new(config, backend, extractors)
}
