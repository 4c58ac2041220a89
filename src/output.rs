//! Result types returned by the extraction entry points.
//!
//! [`DocumentResult`] is the JSON body the HTTP service returns. It has three
//! shapes depending on the path taken:
//!
//! * born-digital PDF — `text`, `pages`, `isScanned: false`, `totalPages`
//! * scanned PDF — `pages`, `isScanned: true`, `totalPages`
//! * standalone image — `text`, `isImage: true`
//!
//! `success: false` with a top-level `error` is reserved for documents that
//! could not be opened at all. Partial success is visible through per-page
//! [`PageResult::error`] values.

use crate::error::PageError;
use serde::{Serialize, Serializer};

/// Outcome of one page's extraction attempt.
///
/// Exactly one `PageResult` exists per requested page number, whether the
/// attempt succeeded or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageResult {
    /// 1-indexed page number as requested.
    pub page: usize,
    /// Extracted text; empty when `error` is set.
    pub text: String,
    /// Page-scoped failure, serialised as a message string or `null`.
    #[serde(serialize_with = "serialize_page_error")]
    pub error: Option<PageError>,
}

impl PageResult {
    pub fn ok(page: usize, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
            error: None,
        }
    }

    pub fn failed(page: usize, error: PageError) -> Self {
        Self {
            page,
            text: String::new(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

fn serialize_page_error<S: Serializer>(
    error: &Option<PageError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_str(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Outcome of a whole document extraction request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_scanned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_image: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentResult {
    /// A PDF whose native text layer was sufficient.
    pub fn born_digital(text: String, pages: Vec<PageResult>, total_pages: usize) -> Self {
        Self {
            success: true,
            text: Some(text),
            is_scanned: Some(false),
            is_image: None,
            pages: Some(pages),
            total_pages: Some(total_pages),
            error: None,
        }
    }

    /// A PDF whose pages were rasterised and transcribed.
    pub fn scanned(pages: Vec<PageResult>, total_pages: usize) -> Self {
        Self {
            success: true,
            text: None,
            is_scanned: Some(true),
            is_image: None,
            pages: Some(pages),
            total_pages: Some(total_pages),
            error: None,
        }
    }

    /// A standalone image transcribed in one call.
    pub fn image(text: String) -> Self {
        Self {
            success: true,
            text: Some(text),
            is_scanned: None,
            is_image: Some(true),
            pages: None,
            total_pages: None,
            error: None,
        }
    }

    /// The document failed before any page was attempted.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            text: None,
            is_scanned: None,
            is_image: None,
            pages: None,
            total_pages: None,
            error: Some(error.into()),
        }
    }

    /// Number of pages that carry an error.
    pub fn failed_pages(&self) -> usize {
        self.pages
            .as_ref()
            .map(|p| p.iter().filter(|r| !r.is_ok()).count())
            .unwrap_or(0)
    }

    /// All page texts joined by `separator`, or `text` when there are no pages.
    pub fn joined_text(&self, separator: &str) -> String {
        match (&self.text, &self.pages) {
            (Some(text), _) => text.clone(),
            (None, Some(pages)) => pages
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join(separator),
            (None, None) => String::new(),
        }
    }
}
