//! Page extraction strategies: run a page-level extractor over rendered pages.
//!
//! Both strategies share one per-page contract, implemented in
//! [`attempt_page`]:
//!
//! 1. pages the rasteriser could not produce keep their original error;
//! 2. otherwise read the image, call the extractor (bounded by the optional
//!    per-page timeout, unless the extractor enforces it itself), and delete
//!    the image file whatever the outcome;
//! 3. always return exactly one [`PageResult`].
//!
//! A failure on one page never stops another page, and a failed deletion is
//! logged without touching the page's result.
//!
//! [`ExtractionStrategy::Sequential`] finishes each page, cleanup included,
//! before starting the next. [`ExtractionStrategy::Concurrent`] launches every
//! page (or up to `limit` at a time) and joins on all of them; results come
//! back in input order regardless of completion order.

use crate::error::{ExtractorError, PageError};
use crate::extractors::PageTextExtractor;
use crate::output::PageResult;
use crate::pipeline::render::RasterizedPage;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How the pages of one document are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// One page at a time, in order.
    Sequential,
    /// All pages at once, or at most `limit` in flight.
    Concurrent { limit: Option<usize> },
}

impl ExtractionStrategy {
    pub fn from_flag(parallel: bool, limit: Option<usize>) -> Self {
        if parallel {
            ExtractionStrategy::Concurrent { limit }
        } else {
            ExtractionStrategy::Sequential
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExtractionStrategy::Sequential => "sequential",
            ExtractionStrategy::Concurrent { .. } => "concurrent",
        }
    }

    /// Extract text from every page. Output has the same length and order as
    /// `pages`.
    pub async fn run(
        &self,
        pages: Vec<RasterizedPage>,
        extractor: Arc<dyn PageTextExtractor>,
        model: Option<String>,
        timeout: Option<Duration>,
    ) -> Vec<PageResult> {
        let started = Instant::now();
        let total = pages.len();
        info!(
            "Extracting {} page(s) with {} ({}{})",
            total,
            extractor.name(),
            self.name(),
            model
                .as_deref()
                .map(|m| format!(", model {}", m))
                .unwrap_or_default()
        );

        let results = match *self {
            ExtractionStrategy::Sequential => {
                process_sequential(pages, extractor.as_ref(), model.as_deref(), timeout).await
            }
            ExtractionStrategy::Concurrent { limit } => {
                process_concurrent(pages, extractor, model, timeout, limit).await
            }
        };

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        info!(
            "Extraction finished: {}/{} page(s) ok in {}ms",
            total - failed,
            total,
            started.elapsed().as_millis()
        );
        results
    }
}

async fn process_sequential(
    pages: Vec<RasterizedPage>,
    extractor: &dyn PageTextExtractor,
    model: Option<&str>,
    timeout: Option<Duration>,
) -> Vec<PageResult> {
    let mut results = Vec::with_capacity(pages.len());
    for page in pages {
        results.push(attempt_page(page, extractor, model, timeout).await);
    }
    results
}

async fn process_concurrent(
    pages: Vec<RasterizedPage>,
    extractor: Arc<dyn PageTextExtractor>,
    model: Option<String>,
    timeout: Option<Duration>,
    limit: Option<usize>,
) -> Vec<PageResult> {
    let limit = limit.unwrap_or(pages.len()).max(1);

    // `buffered` keeps input order while up to `limit` attempts run at once.
    stream::iter(pages.into_iter().map(|page| {
        let extractor = Arc::clone(&extractor);
        let model = model.clone();
        async move { attempt_page(page, extractor.as_ref(), model.as_deref(), timeout).await }
    }))
    .buffered(limit)
    .collect()
    .await
}

/// One page's complete extraction attempt, cleanup included.
pub async fn attempt_page(
    page: RasterizedPage,
    extractor: &dyn PageTextExtractor,
    model: Option<&str>,
    timeout: Option<Duration>,
) -> PageResult {
    let page_num = page.page;
    let path = match page.image {
        Ok(path) => path,
        Err(e) => return PageResult::failed(page_num, e),
    };

    let started = Instant::now();
    let outcome = read_and_extract(page_num, &path, extractor, model, timeout).await;
    remove_image(page_num, &path).await;

    match outcome {
        Ok(text) => {
            debug!(
                "Page {}: {} chars in {}ms",
                page_num,
                text.len(),
                started.elapsed().as_millis()
            );
            PageResult::ok(page_num, text)
        }
        Err(e) => {
            warn!("{}", e);
            PageResult::failed(page_num, e)
        }
    }
}

async fn read_and_extract(
    page: usize,
    path: &Path,
    extractor: &dyn PageTextExtractor,
    model: Option<&str>,
    timeout: Option<Duration>,
) -> Result<String, PageError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PageError::ReadFailed {
            page,
            detail: format!("{}: {}", path.display(), e),
        })?;

    let call = extractor.extract(&bytes, model);
    let result = match timeout {
        Some(limit) if !extractor.enforces_timeout() => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| PageError::Timeout {
                page,
                secs: limit.as_secs(),
            })?,
        _ => call.await,
    };

    result.map_err(|e| match e {
        ExtractorError::Timeout { secs } => PageError::Timeout { page, secs },
        other => PageError::ExtractionFailed {
            page,
            detail: other.to_string(),
        },
    })
}

async fn remove_image(page: usize, path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(
            "Page {}: could not delete temporary image {}: {}",
            page,
            path.display(),
            e
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Upper;

    #[async_trait]
    impl PageTextExtractor for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        async fn extract(&self, image: &[u8], _model: Option<&str>) -> Result<String, ExtractorError> {
            Ok(String::from_utf8_lossy(image).to_uppercase())
        }
    }

    #[tokio::test]
    async fn missing_image_keeps_original_error() {
        let page = RasterizedPage {
            page: 9,
            image: Err(PageError::OutOfRange { page: 9, total: 2 }),
        };
        let result = attempt_page(page, &Upper, None, None).await;
        assert_eq!(result.text, "");
        assert_eq!(result.error, Some(PageError::OutOfRange { page: 9, total: 2 }));
    }

    #[tokio::test]
    async fn unreadable_image_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let page = RasterizedPage {
            page: 1,
            image: Ok(dir.path().join("vanished.jpg")),
        };
        let result = attempt_page(page, &Upper, None, None).await;
        assert!(matches!(result.error, Some(PageError::ReadFailed { page: 1, .. })));
    }

    #[tokio::test]
    async fn successful_attempt_deletes_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p1.jpg");
        std::fs::write(&path, b"hola").unwrap();

        let page = RasterizedPage {
            page: 1,
            image: Ok(path.clone()),
        };
        let result = attempt_page(page, &Upper, None, None).await;
        assert_eq!(result, PageResult::ok(1, "HOLA"));
        assert!(!path.exists());
    }

    /// Takes longer than the caller's limit but keeps its own clock.
    struct SelfTimed {
        delay: Duration,
        expire: bool,
    }

    #[async_trait]
    impl PageTextExtractor for SelfTimed {
        fn name(&self) -> &'static str {
            "self-timed"
        }

        async fn extract(&self, _image: &[u8], _model: Option<&str>) -> Result<String, ExtractorError> {
            tokio::time::sleep(self.delay).await;
            if self.expire {
                return Err(ExtractorError::Timeout { secs: 7 });
            }
            Ok("finished".into())
        }

        fn enforces_timeout(&self) -> bool {
            true
        }
    }

    fn written_page(dir: &Path, page: usize) -> RasterizedPage {
        let path = dir.join(format!("page-{}.jpg", page));
        std::fs::write(&path, b"img").unwrap();
        RasterizedPage {
            page,
            image: Ok(path),
        }
    }

    #[tokio::test]
    async fn self_timed_extractor_is_not_cut_short() {
        let dir = tempfile::tempdir().unwrap();
        let slow = SelfTimed {
            delay: Duration::from_millis(150),
            expire: false,
        };
        let result = attempt_page(
            written_page(dir.path(), 1),
            &slow,
            None,
            Some(Duration::from_millis(20)),
        )
        .await;
        assert_eq!(result, PageResult::ok(1, "finished"));
    }

    #[tokio::test]
    async fn extractor_timeout_becomes_page_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let expired = SelfTimed {
            delay: Duration::ZERO,
            expire: true,
        };
        let result = attempt_page(
            written_page(dir.path(), 3),
            &expired,
            None,
            Some(Duration::from_secs(7)),
        )
        .await;
        assert_eq!(result.error, Some(PageError::Timeout { page: 3, secs: 7 }));
        assert!(!dir.path().join("page-3.jpg").exists());
    }

    #[test]
    fn strategy_from_flag() {
        assert_eq!(
            ExtractionStrategy::from_flag(false, Some(3)),
            ExtractionStrategy::Sequential
        );
        assert_eq!(
            ExtractionStrategy::from_flag(true, None),
            ExtractionStrategy::Concurrent { limit: None }
        );
    }
}
