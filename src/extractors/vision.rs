//! Vision-model page transcription (Ollama or OpenAI).
//!
//! The page image is shrunk to the vision profile, re-encoded as JPEG and
//! sent with the transcription prompts from [`crate::prompts`]. The reply
//! goes through [`clean_text`] before it is returned.
//!
//! ## Retry Strategy
//!
//! Rate-limit and overload errors are transient, especially when pages of one
//! document are sent concurrently. Each failed call is retried after
//! `retry_backoff_ms * 2^(attempt-1)`: with the defaults (500 ms, 2 retries)
//! the waits are 500 ms then 1 s.

use crate::config::{ExtractionConfig, ProcessingMode, RasterProfile};
use crate::error::ExtractorError;
use crate::extractors::PageTextExtractor;
use crate::pipeline::{encode, postprocess::clean_text};
use crate::prompts::{
    LOCAL_TRANSCRIPTION_PROMPT, REMOTE_TRANSCRIPTION_PROMPT, TRANSCRIPTION_SYSTEM_PROMPT,
};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// [`PageTextExtractor`] that asks a vision-capable LLM to transcribe the page.
pub struct VisionExtractor {
    mode: ProcessingMode,
    default_model: String,
    max_tokens: usize,
    temperature: f32,
    max_retries: u32,
    retry_backoff_ms: u64,
    image_quality: u8,
    providers: Mutex<HashMap<String, Arc<dyn LLMProvider>>>,
}

impl VisionExtractor {
    /// Create an extractor for `mode` (`ollama` or `openai`).
    ///
    /// Providers are created on first use of each model; credentials and
    /// hosts come from the environment (`OPENAI_API_KEY`, `OLLAMA_HOST`).
    pub fn new(mode: ProcessingMode, config: &ExtractionConfig) -> Self {
        let default_model = match mode {
            ProcessingMode::OpenAi => config.openai_model.clone(),
            _ => config.ollama_model.clone(),
        };
        Self {
            mode,
            default_model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            image_quality: config.image_quality,
            providers: Mutex::new(HashMap::new()),
        }
    }

    /// Use a pre-built provider for `model` instead of creating one.
    pub fn with_provider(self, model: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        if let Ok(mut providers) = self.providers.lock() {
            providers.insert(model.into(), provider);
        }
        self
    }

    fn provider_name(&self) -> &'static str {
        match self.mode {
            ProcessingMode::OpenAi => "openai",
            _ => "ollama",
        }
    }

    fn instruction(&self) -> &'static str {
        match self.mode {
            ProcessingMode::OpenAi => REMOTE_TRANSCRIPTION_PROMPT,
            _ => LOCAL_TRANSCRIPTION_PROMPT,
        }
    }

    fn provider_for(&self, model: &str) -> Result<Arc<dyn LLMProvider>, ExtractorError> {
        let mut providers = self
            .providers
            .lock()
            .map_err(|_| ExtractorError::Internal("provider cache poisoned".into()))?;

        if let Some(provider) = providers.get(model) {
            return Ok(Arc::clone(provider));
        }

        let provider = ProviderFactory::create_llm_provider(self.provider_name(), model)
            .map_err(|e| {
                ExtractorError::EngineUnavailable(format!("{} ({}): {}", self.provider_name(), model, e))
            })?;
        debug!("Created {} provider for model {}", self.provider_name(), model);
        providers.insert(model.to_string(), Arc::clone(&provider));
        Ok(provider)
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    fn build_messages(&self, image: ImageData) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(TRANSCRIPTION_SYSTEM_PROMPT),
            ChatMessage::user_with_images(self.instruction(), vec![image]),
        ]
    }
}

#[async_trait]
impl PageTextExtractor for VisionExtractor {
    fn name(&self) -> &'static str {
        self.provider_name()
    }

    async fn extract(&self, image: &[u8], model: Option<&str>) -> Result<String, ExtractorError> {
        let model = model.unwrap_or(&self.default_model).to_string();
        let provider = self.provider_for(&model)?;

        let bytes = image.to_vec();
        let quality = self.image_quality;
        let profile = RasterProfile::VISION;
        let image_data = tokio::task::spawn_blocking(move || {
            encode::encode_for_vision(&bytes, profile.max_width, profile.max_height, quality)
        })
        .await
        .map_err(|e| ExtractorError::Internal(format!("encode task panicked: {}", e)))?
        .map_err(|e| ExtractorError::Decode(e.to_string()))?;

        let messages = self.build_messages(image_data);
        let options = self.build_options();
        let start = Instant::now();
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{} ({}): retry {}/{} after {}ms",
                    self.provider_name(),
                    model,
                    attempt,
                    self.max_retries,
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "{} ({}): {} chars in {:?}",
                        self.provider_name(),
                        model,
                        response.content.len(),
                        start.elapsed()
                    );
                    return Ok(clean_text(&response.content));
                }
                Err(e) => {
                    warn!(
                        "{} ({}): attempt {} failed: {}",
                        self.provider_name(),
                        model,
                        attempt + 1,
                        e
                    );
                    last_err = Some(e.to_string());
                }
            }
        }

        Err(ExtractorError::Provider {
            provider: self.provider_name().to_string(),
            attempts: self.max_retries + 1,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_from_config() {
        let config = ExtractionConfig::default();
        let vision = VisionExtractor::new(ProcessingMode::Ollama, &config);
        let opts = vision.build_options();
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn mode_selects_provider_and_prompt() {
        let config = ExtractionConfig::default();
        let local = VisionExtractor::new(ProcessingMode::Ollama, &config);
        let remote = VisionExtractor::new(ProcessingMode::OpenAi, &config);
        assert_eq!(local.name(), "ollama");
        assert_eq!(remote.name(), "openai");
        assert_eq!(local.default_model, "llama3.2-vision");
        assert_eq!(remote.default_model, "gpt-4o-mini");
        assert_eq!(local.instruction(), LOCAL_TRANSCRIPTION_PROMPT);
        assert_eq!(remote.instruction(), REMOTE_TRANSCRIPTION_PROMPT);
    }

    #[test]
    fn request_has_system_and_image_turns() {
        let vision = VisionExtractor::new(ProcessingMode::OpenAi, &ExtractionConfig::default());
        let messages = vision.build_messages(ImageData::new("AAAA".to_string(), "image/jpeg"));
        assert_eq!(messages.len(), 2);
    }
}
