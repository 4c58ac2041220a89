//! Page selection: turn the request's page options into page numbers.
//!
//! Two inputs are accepted. An explicit comma-separated list
//! (`selected_pages=1,5,3`) wins when present and is *not* clamped, so
//! out-of-range numbers survive and are later reported per page. Otherwise a
//! `start-end` range (`page_range=2-7`) is clamped into the document and
//! expanded; an absent range selects the whole document.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// An inclusive, 1-indexed page range already clamped to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    /// Parse a `start-end` string and clamp it to `[1, total_pages]`.
    ///
    /// A missing or non-numeric bound defaults to the document edge; `0` is
    /// treated as missing. Reversed bounds are swapped. Returns `None` for an
    /// empty document.
    pub fn parse(spec: Option<&str>, total_pages: usize) -> Option<Self> {
        if total_pages == 0 {
            return None;
        }

        let (start, end) = match spec.map(str::trim).filter(|s| !s.is_empty()) {
            None => (None, None),
            Some(s) => match s.split_once('-') {
                Some((a, b)) => (parse_positive(a), parse_positive(b)),
                None => (parse_positive(s), None),
            },
        };

        let start = start.unwrap_or(1).clamp(1, total_pages);
        let end = end.unwrap_or(total_pages).clamp(1, total_pages);
        let (start, end) = if end < start {
            (end, start)
        } else {
            (start, end)
        };

        Some(Self { start, end })
    }

    pub fn pages(&self) -> Vec<usize> {
        (self.start..=self.end).collect()
    }
}

/// Resolve the pages to process for a document of `total_pages` pages.
///
/// `selected_pages` takes precedence over `page_range`. The result is sorted
/// ascending; duplicates from an explicit list are kept.
pub fn resolve_pages(
    selected_pages: Option<&str>,
    page_range: Option<&str>,
    total_pages: usize,
) -> Vec<usize> {
    if let Some(list) = selected_pages.map(str::trim).filter(|s| !s.is_empty()) {
        let mut pages: Vec<usize> = list.split(',').filter_map(parse_positive).collect();
        pages.sort_unstable();
        debug!("Explicit page list resolved to {:?}", pages);
        return pages;
    }

    let pages = PageRange::parse(page_range, total_pages)
        .map(|r| r.pages())
        .unwrap_or_default();
    debug!(
        "Page range {:?} resolved to {} page(s) of {}",
        page_range,
        pages.len(),
        total_pages
    );
    pages
}

fn parse_positive(token: &str) -> Option<usize> {
    token.trim().parse::<usize>().ok().filter(|n| *n > 0)
}
