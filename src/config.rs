//! Configuration types for document text extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Per-request choices (mode, model,
//! page selection, parallelism) live in [`crate::extract::ExtractionRequest`]
//! and fall back to the defaults held here.

use crate::error::DocExtractError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Minimum trimmed length a single page's native text must exceed for the
/// document to be treated as born-digital.
pub const DEFAULT_SCAN_TEXT_THRESHOLD: usize = 50;

/// Models accepted in `ollama` mode.
pub const OLLAMA_MODELS: &[&str] = &["llama3.2-vision", "llava"];

/// Models accepted in `openai` mode.
pub const OPENAI_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o"];

/// Which page-level capability transcribes rasterised pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    /// Local vision-capable model served by Ollama. (default)
    #[default]
    Ollama,
    /// Local Tesseract OCR engine.
    Ocr,
    /// Remote vision-capable model served by OpenAI.
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProcessingMode {
    pub const ALL: [ProcessingMode; 3] = [
        ProcessingMode::Ollama,
        ProcessingMode::Ocr,
        ProcessingMode::OpenAi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::Ollama => "ollama",
            ProcessingMode::Ocr => "ocr",
            ProcessingMode::OpenAi => "openai",
        }
    }

    /// Model names this mode accepts. Empty for modes that take no model.
    pub fn known_models(&self) -> &'static [&'static str] {
        match self {
            ProcessingMode::Ollama => OLLAMA_MODELS,
            ProcessingMode::OpenAi => OPENAI_MODELS,
            ProcessingMode::Ocr => &[],
        }
    }

    pub fn requires_model(&self) -> bool {
        !self.known_models().is_empty()
    }

    /// Raster profile used when this mode consumes rendered pages.
    pub fn raster_profile(&self, config: &ExtractionConfig) -> RasterProfile {
        match self {
            ProcessingMode::Ocr => config.ocr_profile,
            ProcessingMode::Ollama | ProcessingMode::OpenAi => RasterProfile::VISION,
        }
    }

    /// Validate `requested` against this mode and fill in the configured default.
    ///
    /// Returns `Ok(None)` for modes that take no model; the requested value is
    /// ignored there.
    pub fn resolve_model(
        &self,
        requested: Option<&str>,
        config: &ExtractionConfig,
    ) -> Result<Option<String>, DocExtractError> {
        if !self.requires_model() {
            return Ok(None);
        }
        match requested.map(str::trim).filter(|m| !m.is_empty()) {
            None => Ok(Some(self.default_model(config).to_string())),
            Some(model) if self.known_models().contains(&model) => Ok(Some(model.to_string())),
            Some(model) => Err(DocExtractError::InvalidModel {
                mode: self.as_str().to_string(),
                model: model.to_string(),
                known: self.known_models().join(", "),
            }),
        }
    }

    fn default_model<'a>(&self, config: &'a ExtractionConfig) -> &'a str {
        match self {
            ProcessingMode::Ollama => &config.ollama_model,
            ProcessingMode::OpenAi => &config.openai_model,
            ProcessingMode::Ocr => "",
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingMode {
    type Err = DocExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(ProcessingMode::Ollama),
            "ocr" => Ok(ProcessingMode::Ocr),
            "openai" => Ok(ProcessingMode::OpenAi),
            _ => Err(DocExtractError::UnknownMode(s.to_string())),
        }
    }
}

/// Rasterisation density and size cap for one downstream consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterProfile {
    /// Rendering density in dots per inch.
    pub dpi: u32,
    /// Maximum rendered width in pixels.
    pub max_width: u32,
    /// Maximum rendered height in pixels.
    pub max_height: u32,
}

impl RasterProfile {
    /// Profile for vision-model consumption. Not configurable.
    pub const VISION: RasterProfile = RasterProfile {
        dpi: 150,
        max_width: 1024,
        max_height: 1024,
    };

    /// Default profile for OCR consumption.
    pub const OCR_DEFAULT: RasterProfile = RasterProfile {
        dpi: 300,
        max_width: 2048,
        max_height: 2048,
    };

    /// Target width in pixels for a page `width_pts` points wide.
    pub fn target_width(&self, width_pts: f32) -> u32 {
        let px = (width_pts * self.dpi as f32 / 72.0).round() as u32;
        px.clamp(1, self.max_width)
    }
}

/// Configuration for document text extraction.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use docextract::{ExtractionConfig, ProcessingMode};
///
/// let config = ExtractionConfig::builder()
///     .default_mode(ProcessingMode::Ocr)
///     .ocr_language("eng")
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Mode used when a request does not name one. Default: `ollama`.
    pub default_mode: ProcessingMode,

    /// Whether pages are processed concurrently when a request does not say. Default: false.
    pub default_parallel: bool,

    /// Default model for `ollama` mode. Default: `llama3.2-vision`.
    pub ollama_model: String,

    /// Default model for `openai` mode. Default: `gpt-4o-mini`.
    pub openai_model: String,

    /// Maximum tokens a vision model may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Sampling temperature for vision models. Default: 0.1.
    pub temperature: f32,

    /// Retry attempts on a failed vision call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Tesseract language(s), e.g. `spa` or `eng+spa`. Default: `spa`.
    pub ocr_language: String,

    /// Tesseract page segmentation mode. Default: 3 (fully automatic).
    pub ocr_psm: u8,

    /// Tesseract executable. Default: `tesseract` (looked up on `PATH`).
    pub tesseract_binary: PathBuf,

    /// Raster profile for OCR mode. Default: 300 DPI, 2048×2048.
    ///
    /// Also bounds the size of images handed to the OCR engine.
    pub ocr_profile: RasterProfile,

    /// JPEG quality (1–100) of images sent to vision models. Default: 80.
    pub image_quality: u8,

    /// Scanned/born-digital threshold, see [`DEFAULT_SCAN_TEXT_THRESHOLD`].
    pub scan_text_threshold: usize,

    /// Maximum pages in flight in concurrent mode. `None` launches every page at once.
    pub concurrency: Option<usize>,

    /// Per-page extraction timeout in seconds. `None` waits indefinitely. Default: 300.
    pub page_timeout_secs: Option<u64>,

    /// Directory for per-request rasterisation scratch space. Default: system temp dir.
    pub work_dir: Option<PathBuf>,

    /// Explicit path to the pdfium shared library.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            default_mode: ProcessingMode::default(),
            default_parallel: false,
            ollama_model: OLLAMA_MODELS[0].to_string(),
            openai_model: OPENAI_MODELS[0].to_string(),
            max_tokens: 4096,
            temperature: 0.1,
            max_retries: 2,
            retry_backoff_ms: 500,
            ocr_language: "spa".to_string(),
            ocr_psm: 6,
            tesseract_binary: PathBuf::from("tesseract"),
            ocr_profile: RasterProfile::OCR_DEFAULT,
            image_quality: 80,
            scan_text_threshold: DEFAULT_SCAN_TEXT_THRESHOLD,
            concurrency: None,
            page_timeout_secs: Some(300),
            work_dir: None,
            pdfium_lib_path: None,
        }
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn default_mode(mut self, mode: ProcessingMode) -> Self {
        self.config.default_mode = mode;
        self
    }

    pub fn default_parallel(mut self, v: bool) -> Self {
        self.config.default_parallel = v;
        self
    }

    pub fn ollama_model(mut self, model: impl Into<String>) -> Self {
        self.config.ollama_model = model.into();
        self
    }

    pub fn openai_model(mut self, model: impl Into<String>) -> Self {
        self.config.openai_model = model.into();
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn ocr_psm(mut self, psm: u8) -> Self {
        self.config.ocr_psm = psm;
        self
    }

    pub fn tesseract_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_binary = path.into();
        self
    }

    pub fn ocr_profile(mut self, profile: RasterProfile) -> Self {
        self.config.ocr_profile = profile;
        self
    }

    pub fn image_quality(mut self, q: u8) -> Self {
        self.config.image_quality = q.clamp(1, 100);
        self
    }

    pub fn scan_text_threshold(mut self, n: usize) -> Self {
        self.config.scan_text_threshold = n;
        self
    }

    /// `0` means unbounded.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = (n > 0).then_some(n);
        self
    }

    /// `0` disables the per-page timeout.
    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = (secs > 0).then_some(secs);
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, DocExtractError> {
        let c = &self.config;
        let p = c.ocr_profile;
        if p.dpi < 72 || p.dpi > 600 {
            return Err(DocExtractError::InvalidConfig(format!(
                "OCR density must be 72–600 DPI, got {}",
                p.dpi
            )));
        }
        if p.max_width < 100 || p.max_height < 100 {
            return Err(DocExtractError::InvalidConfig(format!(
                "OCR image size must be at least 100×100, got {}×{}",
                p.max_width, p.max_height
            )));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(DocExtractError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.ocr_psm > 13 {
            return Err(DocExtractError::InvalidConfig(format!(
                "Tesseract PSM must be 0–13, got {}",
                c.ocr_psm
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("OCR".parse::<ProcessingMode>().unwrap(), ProcessingMode::Ocr);
        assert_eq!(
            " openai ".parse::<ProcessingMode>().unwrap(),
            ProcessingMode::OpenAi
        );
        assert!(matches!(
            "tesseract".parse::<ProcessingMode>(),
            Err(DocExtractError::UnknownMode(_))
        ));
    }

    #[test]
    fn mode_serialises_lowercase() {
        let json = serde_json::to_string(&ProcessingMode::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
    }

    #[test]
    fn resolve_model_uses_configured_default() {
        let config = ExtractionConfig::builder().ollama_model("llava").build().unwrap();
        let model = ProcessingMode::Ollama.resolve_model(None, &config).unwrap();
        assert_eq!(model.as_deref(), Some("llava"));
    }

    #[test]
    fn resolve_model_rejects_cross_mode_model() {
        let config = ExtractionConfig::default();
        let err = ProcessingMode::Ollama
            .resolve_model(Some("gpt-4o"), &config)
            .unwrap_err();
        assert!(matches!(err, DocExtractError::InvalidModel { .. }));
    }

    #[test]
    fn resolve_model_ignores_model_for_ocr() {
        let config = ExtractionConfig::default();
        let model = ProcessingMode::Ocr
            .resolve_model(Some("anything"), &config)
            .unwrap();
        assert_eq!(model, None);
    }

    #[test]
    fn raster_profile_depends_on_mode() {
        let config = ExtractionConfig::default();
        assert_eq!(
            ProcessingMode::Ocr.raster_profile(&config),
            RasterProfile::OCR_DEFAULT
        );
        assert_eq!(
            ProcessingMode::OpenAi.raster_profile(&config),
            RasterProfile::VISION
        );
    }

    #[test]
    fn target_width_is_capped() {
        // US Letter is 612pt wide: 300 DPI would be 2550px.
        assert_eq!(RasterProfile::OCR_DEFAULT.target_width(612.0), 2048);
        assert_eq!(RasterProfile::VISION.target_width(612.0), 1024);
        assert_eq!(RasterProfile::VISION.target_width(288.0), 600);
    }

    #[test]
    fn builder_rejects_bad_density() {
        let err = ExtractionConfig::builder()
            .ocr_profile(RasterProfile {
                dpi: 10,
                max_width: 2048,
                max_height: 2048,
            })
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn ocr_defaults_to_single_block_segmentation() {
        let config = ExtractionConfig::default();
        assert_eq!(config.ocr_psm, 6);
        assert_eq!(config.ocr_language, "spa");
    }

    #[test]
    fn zero_concurrency_means_unbounded() {
        let config = ExtractionConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(config.concurrency, None);
        let config = ExtractionConfig::builder().page_timeout_secs(0).build().unwrap();
        assert_eq!(config.page_timeout_secs, None);
    }
}
