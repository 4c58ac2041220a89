//! Error types for the docextract library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`DocExtractError`] — **Request / document level**: the request is
//!   malformed (unknown mode, model not valid for the mode, unsupported file
//!   type) or the document cannot be opened at all. Returned as
//!   `Err(DocExtractError)` from the [`crate::extract`] entry points, except
//!   for PDF load failures which are reported as a `success: false`
//!   [`crate::output::DocumentResult`].
//!
//! * [`PageError`] — **Page scoped**: one page could not be rendered, read or
//!   transcribed. Stored inside [`crate::output::PageResult`]; the document as
//!   a whole still succeeds.
//!
//! * [`ExtractorError`] — returned by a page-level capability
//!   ([`crate::extractors::PageTextExtractor`]). The page strategies wrap it
//!   into [`PageError::ExtractionFailed`].

use std::path::PathBuf;
use thiserror::Error;

/// Fatal and request-level errors returned by the docextract library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DocExtractError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The processing mode string is not one of `ollama`, `ocr`, `openai`.
    #[error("Unsupported processing mode '{0}' (expected one of: ollama, ocr, openai)")]
    UnknownMode(String),

    /// The requested model does not belong to the mode's known set.
    #[error("Model '{model}' is not valid for mode '{mode}' (expected one of: {known})")]
    InvalidModel {
        mode: String,
        model: String,
        known: String,
    },

    /// The uploaded file is neither a PDF nor an image.
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// The mode is known but no extractor was registered for it
    /// (e.g. `openai` without `OPENAI_API_KEY`).
    #[error("Processing mode '{mode}' is not configured.\n{hint}")]
    ModeNotConfigured { mode: String, hint: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt or the file is unreadable.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or place the library next to the executable."
    )]
    PdfiumBindingFailed(String),

    /// A standalone image could not be transcribed.
    #[error("Image extraction failed: {0}")]
    ImageExtractionFailed(String),

    // ── Output / config errors ────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocExtractError {
    /// True for errors caused by the caller's request rather than by the
    /// service or the document contents.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            DocExtractError::UnknownMode(_)
                | DocExtractError::InvalidModel { .. }
                | DocExtractError::UnsupportedFileType(_)
                | DocExtractError::InvalidInput { .. }
        )
    }

    /// True when the document itself could not be opened: missing,
    /// unreadable or not a valid PDF. Failures of the service (no pdfium
    /// library, a panicked task) are not document errors.
    pub fn is_document_error(&self) -> bool {
        matches!(
            self,
            DocExtractError::CorruptPdf { .. }
                | DocExtractError::FileNotFound { .. }
                | DocExtractError::PermissionDenied { .. }
        )
    }
}

/// A non-fatal error for a single page.
///
/// Serialised as its display string in the JSON `error` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    /// Requested page number exceeds the document's page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    OutOfRange { page: usize, total: usize },

    /// Page rasterisation failed or produced no image.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The rasterised image could not be read back from disk.
    #[error("Page {page}: could not read rasterised image: {detail}")]
    ReadFailed { page: usize, detail: String },

    /// The page-level extractor returned an error.
    #[error("Page {page}: text extraction failed: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    /// The page-level extractor did not finish within the per-page timeout.
    #[error("Page {page}: text extraction timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

/// Errors raised by a page-level text extraction capability.
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// The image bytes could not be decoded or re-encoded.
    #[error("image decode failed: {0}")]
    Decode(String),

    /// The engine could not be started (binary missing, bad install).
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine ran but reported a failure.
    #[error("engine failed: {0}")]
    Engine(String),

    /// The LLM provider failed after all retries.
    #[error("provider '{provider}' failed after {attempts} attempt(s): {detail}")]
    Provider {
        provider: String,
        attempts: u32,
        detail: String,
    },

    /// The engine did not finish the job within the time limit.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Unexpected internal error (task panic, closed channel).
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_display() {
        let e = PageError::OutOfRange { page: 5, total: 3 };
        let msg = e.to_string();
        assert!(msg.contains("Page 5"), "got: {msg}");
        assert!(msg.contains("3 pages"), "got: {msg}");
    }

    #[test]
    fn invalid_model_display_lists_known_models() {
        let e = DocExtractError::InvalidModel {
            mode: "ollama".into(),
            model: "gpt-4o".into(),
            known: "llama3.2-vision, llava".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("gpt-4o"));
        assert!(msg.contains("llava"));
    }

    #[test]
    fn request_errors_are_classified() {
        assert!(DocExtractError::UnknownMode("x".into()).is_request_error());
        assert!(DocExtractError::UnsupportedFileType("text/plain".into()).is_request_error());
        assert!(!DocExtractError::Internal("boom".into()).is_request_error());
        assert!(!DocExtractError::CorruptPdf {
            path: PathBuf::from("a.pdf"),
            detail: "bad xref".into()
        }
        .is_request_error());
    }

    #[test]
    fn only_unopenable_documents_are_document_errors() {
        assert!(DocExtractError::CorruptPdf {
            path: PathBuf::from("a.pdf"),
            detail: "bad xref".into()
        }
        .is_document_error());
        assert!(DocExtractError::FileNotFound {
            path: PathBuf::from("gone.pdf")
        }
        .is_document_error());
        assert!(!DocExtractError::PdfiumBindingFailed("libpdfium.so not found".into())
            .is_document_error());
        assert!(!DocExtractError::Internal("Load task panicked".into()).is_document_error());
    }

    #[test]
    fn provider_error_display() {
        let e = ExtractorError::Provider {
            provider: "openai".into(),
            attempts: 3,
            detail: "429".into(),
        };
        assert!(e.to_string().contains("3 attempt"));
    }
}
