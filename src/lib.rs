//! # docextract
//!
//! Extract per-page text from PDFs and standalone images.
//!
//! A PDF that carries a native text layer is answered from that layer
//! directly. A scanned PDF is rasterised page by page and each page image is
//! transcribed by one of three interchangeable capabilities: local Tesseract
//! OCR, a local Ollama vision model, or a remote OpenAI vision model. One bad
//! page never fails the document; its error is reported next to the other
//! pages' text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Select   page list or range → page numbers
//!  ├─ 2. Detect   native text layer; any page > 50 chars ⇒ born-digital
//!  ├─ 3. Render   scanned pages → JPEG files (pdfium, spawn_blocking)
//!  ├─ 4. Extract  sequential or concurrent, one PageResult per page,
//!  │              each image deleted as soon as its page is done
//!  └─ 5. Result   DocumentResult JSON
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docextract::{DocumentExtractor, ExtractionConfig, ExtractionRequest, ProcessingMode};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let extractor = DocumentExtractor::from_config(ExtractionConfig::default());
//!     let request = ExtractionRequest::new()
//!         .mode(ProcessingMode::Ocr)
//!         .page_range("1-3")
//!         .parallel(true);
//!     let result = extractor.extract_pdf(Path::new("scan.pdf"), &request).await?;
//!     for page in result.pages.unwrap_or_default() {
//!         println!("--- page {} ---\n{}", page.page, page.text);
//!     }
//!     extractor.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | The `docextract` binary (clap + anyhow + tracing-subscriber) |
//! | `server` | on      | The HTTP service in [`server`] (axum + tower-http) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod extractors;
pub mod output;
pub mod pipeline;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, ProcessingMode, RasterProfile,
    DEFAULT_SCAN_TEXT_THRESHOLD,
};
pub use error::{DocExtractError, ExtractorError, PageError};
pub use extract::{DocumentExtractor, ExtractionRequest};
pub use extractors::{ExtractorSet, PageTextExtractor};
pub use output::{DocumentResult, PageResult};
pub use pipeline::pdf::{PdfBackend, PdfiumBackend};
