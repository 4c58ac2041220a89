//! Page-level text extraction capabilities.
//!
//! The pipeline only needs one thing from an extractor: given the bytes of a
//! page image, return its text or fail. [`PageTextExtractor`] is that seam,
//! and [`ExtractorSet`] maps each [`ProcessingMode`] to the implementation
//! registered for it.
//!
//! | Mode     | Implementation                 |
//! |----------|--------------------------------|
//! | `ocr`    | [`ocr::OcrExtractor`] (Tesseract) |
//! | `ollama` | [`vision::VisionExtractor`] (local vision model) |
//! | `openai` | [`vision::VisionExtractor`] (remote vision model) |

pub mod ocr;
pub mod vision;

use crate::config::{ExtractionConfig, ProcessingMode};
use crate::error::{DocExtractError, ExtractorError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Extract text from a single page image.
#[async_trait]
pub trait PageTextExtractor: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Transcribe `image` (any format the `image` crate decodes).
    ///
    /// `model` is the already-validated model name for modes that take one.
    async fn extract(&self, image: &[u8], model: Option<&str>) -> Result<String, ExtractorError>;

    /// True when the extractor applies the per-page time limit itself,
    /// counted from when the page actually starts running, and reports
    /// expiry as [`ExtractorError::Timeout`]. Callers then skip their own
    /// timeout, which would also count time spent queued behind other pages.
    fn enforces_timeout(&self) -> bool {
        false
    }

    /// Release long-lived resources. Called once on service shutdown.
    async fn shutdown(&self) {}
}

/// The extractor registered for each processing mode.
#[derive(Clone, Default)]
pub struct ExtractorSet {
    extractors: HashMap<ProcessingMode, Arc<dyn PageTextExtractor>>,
}

impl ExtractorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `extractor` for `mode`, replacing any previous one.
    pub fn with(mut self, mode: ProcessingMode, extractor: Arc<dyn PageTextExtractor>) -> Self {
        self.extractors.insert(mode, extractor);
        self
    }

    /// Build the standard set from configuration.
    ///
    /// `ocr` and `ollama` are always registered. `openai` is registered only
    /// when `OPENAI_API_KEY` is set, so a request for it otherwise fails with
    /// [`DocExtractError::ModeNotConfigured`].
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let mut set = Self::new()
            .with(
                ProcessingMode::Ocr,
                Arc::new(ocr::OcrExtractor::new(config)),
            )
            .with(
                ProcessingMode::Ollama,
                Arc::new(vision::VisionExtractor::new(ProcessingMode::Ollama, config)),
            );

        let openai_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        if openai_key.trim().is_empty() {
            debug!("OPENAI_API_KEY not set; openai mode disabled");
        } else {
            set = set.with(
                ProcessingMode::OpenAi,
                Arc::new(vision::VisionExtractor::new(ProcessingMode::OpenAi, config)),
            );
        }

        info!("Registered processing modes: {}", set.modes().join(", "));
        set
    }

    /// The extractor for `mode`.
    pub fn get(&self, mode: ProcessingMode) -> Result<Arc<dyn PageTextExtractor>, DocExtractError> {
        self.extractors
            .get(&mode)
            .cloned()
            .ok_or_else(|| DocExtractError::ModeNotConfigured {
                mode: mode.as_str().to_string(),
                hint: match mode {
                    ProcessingMode::OpenAi => "Set OPENAI_API_KEY to enable it.".to_string(),
                    _ => "No extractor is registered for this mode.".to_string(),
                },
            })
    }

    /// Names of the registered modes, in [`ProcessingMode::ALL`] order.
    pub fn modes(&self) -> Vec<&'static str> {
        ProcessingMode::ALL
            .iter()
            .filter(|m| self.extractors.contains_key(m))
            .map(ProcessingMode::as_str)
            .collect()
    }

    /// Shut down every registered extractor.
    pub async fn shutdown(&self) {
        for mode in ProcessingMode::ALL {
            if let Some(extractor) = self.extractors.get(&mode) {
                extractor.shutdown().await;
            }
        }
    }
}

impl std::fmt::Debug for ExtractorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorSet")
            .field("modes", &self.modes())
            .finish()
    }
}
