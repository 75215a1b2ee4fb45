//! Configuration types for PDF-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Every knob lives in one `Clone`
//! struct so a config can be shared across tasks and logged as a whole.

use crate::backend::Backends;
use crate::error::PdfSightError;
use crate::pipeline::caption::Captioner;
use crate::pipeline::text::{PdfExtractText, TextExtractor};
use crate::progress::ProgressCallback;
use crate::prompts::DEFAULT_CAPTION_PROMPT;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for a PDF-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`]. The default config captions nothing:
/// image enrichment starts only once a captioner, a provider or a provider
/// name is set.
///
/// # Example
/// ```rust
/// use pdfsight::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .provider_name("openai")
///     .model("gpt-4o")
///     .max_retries(3)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Pre-constructed captioner. Takes precedence over `provider` and `provider_name`.
    pub captioner: Option<Arc<dyn Captioner>>,

    /// Pre-constructed LLM provider, wrapped in an [`crate::LlmCaptioner`].
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// LLM provider name (e.g. "openai", "azure", "ollama"), created through
    /// `ProviderFactory` together with `model`.
    pub provider_name: Option<String>,

    /// Model or deployment identifier, e.g. "gpt-4o". Default when unset: "gpt-4o".
    pub model: Option<String>,

    /// Instruction sent with each image. If None, uses [`DEFAULT_CAPTION_PROMPT`].
    pub prompt: Option<String>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Low temperature keeps captions factual and repeatable.
    pub temperature: f32,

    /// Maximum tokens per caption. Default: 1024.
    pub max_tokens: usize,

    /// Retries after a failed provider call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubling per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Run the presence check before extraction. Default: true.
    ///
    /// When a captioner is configured and the check finds no significant
    /// image, extraction and captioning are skipped entirely. When false,
    /// extraction always runs.
    pub smart_detection: bool,

    /// Image backends to use. If None, uses the process-wide probe result.
    pub backends: Option<Arc<Backends>>,

    /// Base text extractor. If None, uses [`PdfExtractText`].
    pub text_extractor: Option<Arc<dyn TextExtractor>>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            captioner: None,
            provider: None,
            provider_name: None,
            model: None,
            prompt: None,
            temperature: 0.1,
            max_tokens: 1024,
            max_retries: 2,
            retry_backoff_ms: 500,
            smart_detection: true,
            backends: None,
            text_extractor: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("captioner", &self.captioner.as_ref().map(|_| "<dyn Captioner>"))
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("prompt", &self.prompt)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("smart_detection", &self.smart_detection)
            .field("backends", &self.backends)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The prompt actually sent with each image.
    pub fn effective_prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or(DEFAULT_CAPTION_PROMPT)
    }

    /// The backends in effect: the configured list, or the global probe.
    pub fn effective_backends(&self) -> Arc<Backends> {
        self.backends.clone().unwrap_or_else(Backends::global)
    }

    /// The text extractor in effect.
    pub fn effective_text_extractor(&self) -> Arc<dyn TextExtractor> {
        self.text_extractor
            .clone()
            .unwrap_or_else(|| Arc::new(PdfExtractText))
    }

    /// Whether anything in this config could produce a captioner.
    pub fn wants_captions(&self) -> bool {
        self.captioner.is_some() || self.provider.is_some() || self.provider_name.is_some()
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn captioner(mut self, captioner: Arc<dyn Captioner>) -> Self {
        self.config.captioner = Some(captioner);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
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

    pub fn smart_detection(mut self, v: bool) -> Self {
        self.config.smart_detection = v;
        self
    }

    pub fn backends(mut self, backends: Backends) -> Self {
        self.config.backends = Some(Arc::new(backends));
        self
    }

    pub fn text_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.config.text_extractor = Some(extractor);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, PdfSightError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(PdfSightError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(PdfSightError::InvalidConfig(
                "download timeout must be ≥ 1 second".into(),
            ));
        }
        if c.prompt.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(PdfSightError::InvalidConfig("prompt must not be blank".into()));
        }
        if c.provider_name.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(PdfSightError::InvalidConfig(
                "provider name must not be blank".into(),
            ));
        }
        Ok(self.config)
    }
}
