//! Rasterisation: render selected pages of a scanned PDF to image files.
//!
//! Each page is rendered on its own so one broken page cannot take the batch
//! down with it. The output keeps request order: entry `i` always describes
//! `pages[i]`, either as the path of a rendered image or as the page error
//! that prevented it.
//!
//! ## Why files, not in-memory images?
//!
//! A 300-page scan at 300 DPI would hold gigabytes of pixels in memory. Files
//! in a per-request scratch directory keep peak memory to one page, and the
//! page strategies delete each file as soon as its page is done.

use crate::config::RasterProfile;
use crate::error::PageError;
use crate::pipeline::pdf::PdfBackend;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One requested page after rasterisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterizedPage {
    /// 1-indexed page number as requested.
    pub page: usize,
    /// Image on disk, or the reason there is none.
    pub image: Result<PathBuf, PageError>,
}

/// Render every page in `pages` with `profile` into `out_dir`.
///
/// Never fails as a whole: out-of-range pages and per-page render failures
/// are recorded in the corresponding entry.
pub async fn rasterize(
    backend: &dyn PdfBackend,
    pdf: &Path,
    pages: &[usize],
    total_pages: usize,
    profile: &RasterProfile,
    out_dir: &Path,
) -> Vec<RasterizedPage> {
    info!(
        "Rasterising {} page(s) at {} DPI (max {}x{})",
        pages.len(),
        profile.dpi,
        profile.max_width,
        profile.max_height
    );

    let mut results = Vec::with_capacity(pages.len());

    for (i, &page) in pages.iter().enumerate() {
        if page > total_pages {
            warn!(
                "Skipping page {} (out of range, total={})",
                page, total_pages
            );
            results.push(RasterizedPage {
                page,
                image: Err(PageError::OutOfRange {
                    page,
                    total: total_pages,
                }),
            });
            continue;
        }

        // The index keeps names unique when an explicit list repeats a page.
        let dest = out_dir.join(format!("page.{}.{}.jpg", page, i));
        let image = render_one(backend, pdf, page, profile, &dest).await;
        if let Err(ref e) = image {
            warn!("{}", e);
        }
        results.push(RasterizedPage { page, image });
    }

    results
}

async fn render_one(
    backend: &dyn PdfBackend,
    pdf: &Path,
    page: usize,
    profile: &RasterProfile,
    dest: &Path,
) -> Result<PathBuf, PageError> {
    let path = backend
        .render_page(pdf, page, profile, dest)
        .await
        .map_err(|e| PageError::RenderFailed {
            page,
            detail: e.to_string(),
        })?;

    match tokio::fs::try_exists(&path).await {
        Ok(true) => {
            debug!("Page {} rendered to {}", page, path.display());
            Ok(path)
        }
        Ok(false) => Err(PageError::RenderFailed {
            page,
            detail: format!("no image produced at {}", path.display()),
        }),
        Err(e) => Err(PageError::RenderFailed {
            page,
            detail: format!("cannot stat {}: {}", path.display(), e),
        }),
    }
}
