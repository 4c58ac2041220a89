//! Document extraction entry points.
//!
//! [`DocumentExtractor`] drives one request through the pipeline:
//!
//! ```text
//! validate mode/model ─▶ open PDF ─▶ select pages ─▶ detect
//!                                                     │
//!             born-digital ◀──────────────────────────┤
//!                                                     ▼
//!                                  rasterise ─▶ page strategy ─▶ scanned
//! ```
//!
//! Request problems (unknown mode, bad model, unconfigured mode) are returned
//! as `Err` before any work starts. A PDF that cannot be opened produces
//! `Ok(DocumentResult { success: false, .. })`. Everything after that is
//! page-scoped: a failed page never fails the document.

use crate::config::{ExtractionConfig, ProcessingMode};
use crate::error::DocExtractError;
use crate::extractors::ExtractorSet;
use crate::output::DocumentResult;
use crate::pipeline::input::{self, DocumentKind};
use crate::pipeline::pdf::{PdfBackend, PdfiumBackend};
use crate::pipeline::strategy::ExtractionStrategy;
use crate::pipeline::{detect, pages, render};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Per-request options. Unset fields fall back to [`ExtractionConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionRequest {
    /// Process pages concurrently instead of one by one.
    pub parallel: Option<bool>,
    pub mode: Option<ProcessingMode>,
    /// Model name; must belong to the mode's known set. Ignored for `ocr`.
    pub model: Option<String>,
    /// `"start-end"` range; ignored when `selected_pages` is given.
    pub page_range: Option<String>,
    /// Comma-separated explicit page list.
    pub selected_pages: Option<String>,
}

impl ExtractionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    pub fn page_range(mut self, range: impl Into<String>) -> Self {
        self.page_range = Some(range.into());
        self
    }

    pub fn selected_pages(mut self, pages: impl Into<String>) -> Self {
        self.selected_pages = Some(pages.into());
        self
    }
}

/// The extraction service: configuration, PDF backend and page extractors.
#[derive(Clone)]
pub struct DocumentExtractor {
    config: ExtractionConfig,
    backend: Arc<dyn PdfBackend>,
    extractors: ExtractorSet,
}

impl DocumentExtractor {
    pub fn new(
        config: ExtractionConfig,
        backend: Arc<dyn PdfBackend>,
        extractors: ExtractorSet,
    ) -> Self {
        Self {
            config,
            backend,
            extractors,
        }
    }

    /// pdfium backend plus the standard extractor set.
    pub fn from_config(config: ExtractionConfig) -> Self {
        let backend = Arc::new(PdfiumBackend::new(config.pdfium_lib_path.clone()));
        let extractors = ExtractorSet::from_config(&config);
        Self::new(config, backend, extractors)
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn extractors(&self) -> &ExtractorSet {
        &self.extractors
    }

    /// Extract text from a PDF on disk.
    pub async fn extract_pdf(
        &self,
        pdf: &Path,
        request: &ExtractionRequest,
    ) -> Result<DocumentResult, DocExtractError> {
        let started = Instant::now();
        let mode = request.mode.unwrap_or(self.config.default_mode);
        let model = mode.resolve_model(request.model.as_deref(), &self.config)?;
        let extractor = self.extractors.get(mode)?;

        info!("Extracting text from {} (mode {})", pdf.display(), mode);

        let total_pages = match self.backend.page_count(pdf).await {
            Ok(n) => n,
            Err(e) if e.is_document_error() => {
                error!("Could not open {}: {}", pdf.display(), e);
                return Ok(DocumentResult::failure(e.to_string()));
            }
            Err(e) => return Err(e),
        };

        let selected = pages::resolve_pages(
            request.selected_pages.as_deref(),
            request.page_range.as_deref(),
            total_pages,
        );
        debug!("Selected pages: {:?}", selected);

        let report = detect::detect(
            self.backend.as_ref(),
            pdf,
            &selected,
            total_pages,
            self.config.scan_text_threshold,
        )
        .await;

        if !report.is_scanned {
            info!(
                "Born-digital document: {} page(s) from the native text layer in {}ms",
                report.pages.len(),
                started.elapsed().as_millis()
            );
            return Ok(DocumentResult::born_digital(
                report.full_text,
                report.pages,
                total_pages,
            ));
        }

        let scratch = self.scratch_dir()?;
        let profile = mode.raster_profile(&self.config);
        let rasterized = render::rasterize(
            self.backend.as_ref(),
            pdf,
            &selected,
            total_pages,
            &profile,
            scratch.path(),
        )
        .await;

        let strategy = ExtractionStrategy::from_flag(
            request.parallel.unwrap_or(self.config.default_parallel),
            self.config.concurrency,
        );
        let page_results = strategy
            .run(rasterized, extractor, model, self.page_timeout())
            .await;

        let result = DocumentResult::scanned(page_results, total_pages);
        info!(
            "Scanned document: {} page(s), {} failed, {}ms",
            selected.len(),
            result.failed_pages(),
            started.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Transcribe a standalone image in one call.
    pub async fn extract_image(
        &self,
        image: &[u8],
        request: &ExtractionRequest,
    ) -> Result<DocumentResult, DocExtractError> {
        let mode = request.mode.unwrap_or(self.config.default_mode);
        let model = mode.resolve_model(request.model.as_deref(), &self.config)?;
        let extractor = self.extractors.get(mode)?;

        info!("Extracting text from image ({} bytes, mode {})", image.len(), mode);

        let call = extractor.extract(image, model.as_deref());
        let text = match self.page_timeout() {
            Some(limit) if !extractor.enforces_timeout() => {
                tokio::time::timeout(limit, call).await.map_err(|_| {
                    DocExtractError::ImageExtractionFailed(format!(
                        "timed out after {}s",
                        limit.as_secs()
                    ))
                })?
            }
            _ => call.await,
        }
        .map_err(|e| DocExtractError::ImageExtractionFailed(e.to_string()))?;

        Ok(DocumentResult::image(text))
    }

    /// Extract from a file on disk, dispatching on its sniffed kind.
    pub async fn extract_file(
        &self,
        path: &Path,
        request: &ExtractionRequest,
    ) -> Result<DocumentResult, DocExtractError> {
        let resolved = input::resolve_local(path)?;
        self.extract_kind(resolved.path(), resolved.kind(), request)
            .await
    }

    /// Extract from a file whose kind is already known (e.g. from an upload's
    /// declared content type).
    pub async fn extract_kind(
        &self,
        path: &Path,
        kind: DocumentKind,
        request: &ExtractionRequest,
    ) -> Result<DocumentResult, DocExtractError> {
        match kind {
            DocumentKind::Pdf => self.extract_pdf(path, request).await,
            DocumentKind::Image => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    DocExtractError::Internal(format!("reading {}: {}", path.display(), e))
                })?;
                self.extract_image(&bytes, request).await
            }
        }
    }

    /// Shut down long-lived extractor resources (the OCR worker).
    pub async fn shutdown(&self) {
        self.extractors.shutdown().await;
    }

    fn page_timeout(&self) -> Option<Duration> {
        self.config.page_timeout_secs.map(Duration::from_secs)
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir, DocExtractError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("docextract-");
        match &self.config.work_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| {
                    DocExtractError::Internal(format!("creating {}: {}", dir.display(), e))
                })?;
                builder.tempdir_in(dir)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| DocExtractError::Internal(format!("scratch directory: {}", e)))
    }
}

impl std::fmt::Debug for DocumentExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentExtractor")
            .field("config", &self.config)
            .field("extractors", &self.extractors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_sets_fields() {
        let request = ExtractionRequest::new()
            .mode(ProcessingMode::Ocr)
            .parallel(true)
            .page_range("2-4");
        assert_eq!(request.mode, Some(ProcessingMode::Ocr));
        assert_eq!(request.parallel, Some(true));
        assert_eq!(request.page_range.as_deref(), Some("2-4"));
        assert_eq!(request.selected_pages, None);
    }
}
