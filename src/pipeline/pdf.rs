//! PDF backend: page count, native text layer and single-page rendering.
//!
//! [`PdfBackend`] is the seam between the pipeline and the PDF library. The
//! pipeline only ever asks three things of a PDF: how many pages it has, what
//! native text each page carries, and to render one page to an image file.
//! [`PdfiumBackend`] answers them with pdfium; tests substitute an in-memory
//! double.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is synchronous and not
//! safe to drive from async contexts. Every call runs on tokio's blocking
//! pool with a fresh `Pdfium` handle; the OS caches the `dlopen`, so repeat
//! binds are cheap.

use crate::config::RasterProfile;
use crate::error::DocExtractError;
use async_trait::async_trait;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// A failure reported by a [`PdfBackend`] for one operation.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("pdfium binding failed: {0}")]
    Bind(String),
    #[error("{0}")]
    Pdf(String),
    #[error("image write failed: {0}")]
    ImageWrite(String),
    #[error("backend task panicked: {0}")]
    TaskPanicked(String),
}

/// Read-only access to a PDF on disk.
#[async_trait]
pub trait PdfBackend: Send + Sync {
    /// Open the document and return its page count.
    async fn page_count(&self, pdf: &Path) -> Result<usize, DocExtractError>;

    /// Native text layer of each requested page (1-indexed), in request order.
    ///
    /// Exactly one entry per element of `pages`; a failure for one page never
    /// affects the others.
    async fn page_texts(&self, pdf: &Path, pages: &[usize]) -> Vec<Result<String, BackendError>>;

    /// Render one page (1-indexed) to an image file at `dest` and return the
    /// path actually written.
    async fn render_page(
        &self,
        pdf: &Path,
        page: usize,
        profile: &RasterProfile,
        dest: &Path,
    ) -> Result<PathBuf, BackendError>;
}

/// [`PdfBackend`] backed by Google pdfium through `pdfium-render`.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    lib_path: Option<PathBuf>,
}

impl PdfiumBackend {
    /// Create a backend. `lib_path` is an explicit library file; when `None`
    /// the binding falls back to `PDFIUM_LIB_PATH`, the executable's
    /// directory, then the system library.
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }

    /// Fail fast when no pdfium library can be bound.
    pub fn verify(&self) -> Result<(), DocExtractError> {
        bind_pdfium(self.lib_path.as_deref())
            .map(|_| ())
            .map_err(|e| DocExtractError::PdfiumBindingFailed(e.to_string()))
    }
}

#[async_trait]
impl PdfBackend for PdfiumBackend {
    async fn page_count(&self, pdf: &Path) -> Result<usize, DocExtractError> {
        let lib = self.lib_path.clone();
        let path = pdf.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let pdfium = bind_pdfium(lib.as_deref())
                .map_err(|e| DocExtractError::PdfiumBindingFailed(e.to_string()))?;
            let document =
                pdfium
                    .load_pdf_from_file(&path, None)
                    .map_err(|e| DocExtractError::CorruptPdf {
                        path: path.clone(),
                        detail: format!("{:?}", e),
                    })?;
            let count = document.pages().len() as usize;
            info!("PDF loaded: {} pages", count);
            Ok(count)
        })
        .await
        .map_err(|e| DocExtractError::Internal(format!("Load task panicked: {}", e)))?
    }

    async fn page_texts(&self, pdf: &Path, pages: &[usize]) -> Vec<Result<String, BackendError>> {
        let lib = self.lib_path.clone();
        let path = pdf.to_path_buf();
        let requested = pages.to_vec();
        let n = requested.len();

        let joined = tokio::task::spawn_blocking(move || {
            page_texts_blocking(lib.as_deref(), &path, &requested)
        })
        .await;

        match joined {
            Ok(texts) => texts,
            Err(e) => vec![Err(BackendError::TaskPanicked(e.to_string())); n],
        }
    }

    async fn render_page(
        &self,
        pdf: &Path,
        page: usize,
        profile: &RasterProfile,
        dest: &Path,
    ) -> Result<PathBuf, BackendError> {
        let lib = self.lib_path.clone();
        let path = pdf.to_path_buf();
        let dest = dest.to_path_buf();
        let profile = *profile;

        tokio::task::spawn_blocking(move || {
            render_page_blocking(lib.as_deref(), &path, page, &profile, &dest)
        })
        .await
        .map_err(|e| BackendError::TaskPanicked(e.to_string()))?
    }
}

fn page_texts_blocking(
    lib: Option<&Path>,
    pdf: &Path,
    pages: &[usize],
) -> Vec<Result<String, BackendError>> {
    let pdfium = match bind_pdfium(lib) {
        Ok(p) => p,
        Err(e) => return vec![Err(e); pages.len()],
    };
    let document = match pdfium.load_pdf_from_file(pdf, None) {
        Ok(d) => d,
        Err(e) => return vec![Err(BackendError::Pdf(format!("{:?}", e))); pages.len()],
    };
    let doc_pages = document.pages();

    pages
        .iter()
        .map(|&page| {
            let index = u16::try_from(page.saturating_sub(1))
                .map_err(|_| BackendError::Pdf(format!("page {} exceeds pdfium index", page)))?;
            let pdf_page = doc_pages
                .get(index)
                .map_err(|e| BackendError::Pdf(format!("{:?}", e)))?;
            let text = pdf_page
                .text()
                .map_err(|e| BackendError::Pdf(format!("{:?}", e)))?
                .all();
            debug!("Page {}: {} chars of native text", page, text.len());
            Ok(text)
        })
        .collect()
}

fn render_page_blocking(
    lib: Option<&Path>,
    pdf: &Path,
    page: usize,
    profile: &RasterProfile,
    dest: &Path,
) -> Result<PathBuf, BackendError> {
    let pdfium = bind_pdfium(lib)?;
    let document = pdfium
        .load_pdf_from_file(pdf, None)
        .map_err(|e| BackendError::Pdf(format!("{:?}", e)))?;

    let index = u16::try_from(page.saturating_sub(1))
        .map_err(|_| BackendError::Pdf(format!("page {} exceeds pdfium index", page)))?;
    let pdf_page = document
        .pages()
        .get(index)
        .map_err(|e| BackendError::Pdf(format!("{:?}", e)))?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(profile.target_width(pdf_page.width().value) as i32)
        .set_maximum_width(profile.max_width as i32)
        .set_maximum_height(profile.max_height as i32);

    let bitmap = pdf_page
        .render_with_config(&render_config)
        .map_err(|e| BackendError::Pdf(format!("{:?}", e)))?;

    // JPEG has no alpha channel.
    let image = bitmap.as_image().to_rgb8();
    debug!(
        "Rendered page {} → {}x{} px at {} DPI",
        page,
        image.width(),
        image.height(),
        profile.dpi
    );

    image
        .save_with_format(dest, ImageFormat::Jpeg)
        .map_err(|e| BackendError::ImageWrite(e.to_string()))?;

    Ok(dest.to_path_buf())
}

/// Bind to a pdfium shared library.
///
/// Discovery order:
/// 1. explicit `lib_path`
/// 2. `PDFIUM_LIB_PATH` env var
/// 3. alongside the running executable
/// 4. system library search paths
fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, BackendError> {
    let explicit = lib_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    if let Some(path) = explicit {
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            BackendError::Bind(format!("{}: {:?}", path.display(), e))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let candidate =
            Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&candidate) {
            debug!("Bound pdfium next to executable: {}", exe_dir.display());
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| BackendError::Bind(format!("system library: {:?}", e)))?;
    Ok(Pdfium::new(bindings))
}
