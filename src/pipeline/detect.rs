//! Scan detection: decide whether a PDF is born-digital or scanned.
//!
//! A born-digital PDF carries a native text layer, so there is nothing to
//! rasterise. The heuristic is deliberately simple: if any single requested
//! page has more than `threshold` characters of trimmed native text, the
//! document is born-digital. Scanned PDFs usually have no text layer at all,
//! or only a few characters of stray metadata per page.

use crate::error::PageError;
use crate::output::PageResult;
use crate::pipeline::pdf::PdfBackend;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of scanning the native text layer of the selected pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub is_scanned: bool,
    /// Page texts in request order, joined by `\n`.
    pub full_text: String,
    /// One entry per requested page; out-of-range pages carry an error.
    pub pages: Vec<PageResult>,
}

/// Fetch the native text layer for `pages` and classify the document.
///
/// Out-of-range page numbers are never fetched. A failed fetch degrades to
/// empty text for that page.
pub async fn detect(
    backend: &dyn PdfBackend,
    pdf: &Path,
    pages: &[usize],
    total_pages: usize,
    threshold: usize,
) -> ScanReport {
    let in_range: Vec<usize> = pages
        .iter()
        .copied()
        .filter(|&p| p <= total_pages)
        .collect();

    let mut fetched = backend.page_texts(pdf, &in_range).await.into_iter();

    let results: Vec<PageResult> = pages
        .iter()
        .map(|&page| {
            if page > total_pages {
                return PageResult::failed(
                    page,
                    PageError::OutOfRange {
                        page,
                        total: total_pages,
                    },
                );
            }
            match fetched.next() {
                Some(Ok(text)) => PageResult::ok(page, text),
                Some(Err(e)) => {
                    warn!("Page {}: native text unavailable, treating as empty: {}", page, e);
                    PageResult::ok(page, String::new())
                }
                None => {
                    warn!("Page {}: backend returned no text entry", page);
                    PageResult::ok(page, String::new())
                }
            }
        })
        .collect();

    let is_scanned = classify(&results, threshold);
    let full_text = results
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    info!(
        "Scan detection: {} page(s), {} chars of native text, scanned={}",
        results.len(),
        full_text.len(),
        is_scanned
    );

    ScanReport {
        is_scanned,
        full_text,
        pages: results,
    }
}

/// True when no page exceeds `threshold` trimmed characters.
pub fn classify(pages: &[PageResult], threshold: usize) -> bool {
    !pages.iter().any(|p| {
        let len = p.text.trim().chars().count();
        debug!("Page {}: {} trimmed chars", p.page, len);
        len > threshold
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(texts: &[&str]) -> Vec<PageResult> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| PageResult::ok(i + 1, *t))
            .collect()
    }

    #[test]
    fn fifty_chars_is_still_scanned() {
        let fifty = "a".repeat(50);
        assert!(classify(&pages(&[&fifty, ""]), 50));
    }

    #[test]
    fn fifty_one_chars_is_born_digital() {
        let fifty_one = "a".repeat(51);
        assert!(!classify(&pages(&["", &fifty_one]), 50));
    }

    #[test]
    fn whitespace_does_not_count() {
        let padded = format!("   {}   \n\n", "b".repeat(50));
        assert!(classify(&pages(&[&padded]), 50));
    }

    #[test]
    fn threshold_is_per_page_not_cumulative() {
        let thirty = "c".repeat(30);
        assert!(classify(&pages(&[&thirty, &thirty, &thirty]), 50));
    }

    #[test]
    fn empty_selection_is_scanned() {
        assert!(classify(&[], 50));
    }
}
