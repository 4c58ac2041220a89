//! Pipeline stages for document text extraction.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the PDF library or page extractor can be swapped without touching
//! the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pages ──▶ detect ──┬──▶ (born-digital) native text
//! (path/URL) (select)  (scan?)  │
//!                               └──▶ render ──▶ strategy ──▶ per-page text
//!                                    (pdfium)   (seq / concurrent)
//! ```
//!
//! 1. [`input`]    — resolve a local path or URL and sniff PDF vs image
//! 2. [`pages`]    — turn `selected_pages` / `page_range` into page numbers
//! 3. [`pdf`]      — the [`pdf::PdfBackend`] seam and its pdfium implementation
//! 4. [`detect`]   — fetch the native text layer, classify scanned vs born-digital
//! 5. [`render`]   — rasterise scanned pages to image files
//! 6. [`strategy`] — run a page extractor over the images, deleting each one
//!    as soon as its page is done
//! 7. [`encode`]   — image preparation for vision models and OCR
//! 8. [`postprocess`] — cleanup of vision-model output

pub mod detect;
pub mod encode;
pub mod input;
pub mod pages;
pub mod pdf;
pub mod postprocess;
pub mod render;
pub mod strategy;
