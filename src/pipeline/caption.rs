//! Captioning: one extracted image in, one text description out.
//!
//! [`Captioner`] is the seam between the pipeline and whatever describes the
//! images. [`LlmCaptioner`] drives any `edgequake-llm` vision provider; tests
//! and embedders plug in their own.
//!
//! ## Retry Strategy
//!
//! Provider errors (429, 5xx, timeouts) are retried with exponential backoff,
//! `retry_backoff_ms * 2^(attempt-1)`: with 500 ms base and 2 retries the
//! waits are 500 ms then 1 s. An empty answer is not retried.

use super::encode::image_data;
use super::extract::RenderedImage;
use super::postprocess::clean_caption;
use crate::config::ConversionConfig;
use crate::error::CaptionError;
use crate::output::Caption;
use crate::progress::ProgressCallback;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Something that can describe an image.
pub trait Captioner: Send + Sync {
    /// Describe `image`, following `prompt`.
    fn caption<'a>(
        &'a self,
        image: &'a RenderedImage,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<String, CaptionError>>;
}

/// [`Captioner`] backed by a vision-capable LLM provider.
#[derive(Clone)]
pub struct LlmCaptioner {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl fmt::Debug for LlmCaptioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmCaptioner")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl LlmCaptioner {
    /// Wrap `provider` with the default sampling and retry settings.
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self::from_config(provider, &ConversionConfig::default())
    }

    /// Wrap `provider`, taking sampling and retry settings from `config`.
    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &ConversionConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    async fn request(&self, image: &RenderedImage, prompt: &str) -> Result<String, CaptionError> {
        let messages = vec![ChatMessage::user_with_images(
            prompt,
            vec![image_data(&image.png)],
        )];
        let options = self.options();
        let start = Instant::now();

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Page {} image {}: retry {}/{} after {}ms",
                    image.page, image.index, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "Page {} image {}: {} input tokens, {} output tokens, {:?}",
                        image.page,
                        image.index,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    let text = clean_caption(&response.content);
                    if text.is_empty() {
                        return Err(CaptionError::Empty);
                    }
                    return Ok(text);
                }
                Err(e) => {
                    warn!(
                        "Page {} image {}: attempt {} failed: {}",
                        image.page,
                        image.index,
                        attempt + 1,
                        e
                    );
                    last_err = Some(e.to_string());
                }
            }
        }

        Err(CaptionError::Provider {
            retries: self.max_retries,
            detail: last_err.unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

impl Captioner for LlmCaptioner {
    fn caption<'a>(
        &'a self,
        image: &'a RenderedImage,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<String, CaptionError>> {
        Box::pin(self.request(image, prompt))
    }
}

/// Outcome of captioning a batch of images.
#[derive(Debug, Clone, Default)]
pub struct CaptionRun {
    /// Successful captions, in the order the images were given.
    pub captions: Vec<Caption>,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Caption `images` one after another, in order.
///
/// A failed image is logged, reported to `progress` and left out; it never
/// aborts the batch.
pub async fn caption_images(
    images: &[RenderedImage],
    captioner: &dyn Captioner,
    prompt: &str,
    progress: Option<&ProgressCallback>,
) -> CaptionRun {
    let start = Instant::now();
    let total = images.len();
    let mut run = CaptionRun::default();

    for (i, image) in images.iter().enumerate() {
        let position = i + 1;
        if let Some(cb) = progress {
            cb.on_image_start(position, total, image.page, image.index);
        }

        match captioner.caption(image, prompt).await {
            Ok(text) => {
                if let Some(cb) = progress {
                    cb.on_image_captioned(position, total, text.len());
                }
                run.captions.push(Caption {
                    page: image.page,
                    index: image.index,
                    text,
                });
            }
            Err(e) => {
                warn!(
                    "Page {} image {}: caption failed, image omitted: {}",
                    image.page, image.index, e
                );
                if let Some(cb) = progress {
                    cb.on_image_error(position, total, &e.to_string());
                }
                run.failed += 1;
            }
        }
    }

    run.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Captioned {}/{} image(s) in {}ms",
        run.captions.len(),
        total,
        run.duration_ms
    );
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn image(page: usize, index: usize) -> RenderedImage {
        RenderedImage {
            png: vec![0x89, b'P', b'N', b'G'],
            width: 64,
            height: 64,
            page,
            index,
        }
    }

    /// Fails the `fail_on`-th call (1-based), echoes coordinates otherwise.
    struct Echo {
        calls: AtomicUsize,
        fail_on: usize,
    }

    impl Captioner for Echo {
        fn caption<'a>(
            &'a self,
            image: &'a RenderedImage,
            prompt: &'a str,
        ) -> BoxFuture<'a, Result<String, CaptionError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move {
                if call == self.fail_on {
                    Err(CaptionError::Empty)
                } else {
                    Ok(format!("{prompt} p{} i{}", image.page, image.index))
                }
            })
        }
    }

    #[tokio::test]
    async fn captions_keep_document_order() {
        let echo = Echo { calls: AtomicUsize::new(0), fail_on: 0 };
        let images = [image(1, 1), image(1, 3), image(4, 1)];
        let run = caption_images(&images, &echo, "describe", None).await;

        let texts: Vec<_> = run.captions.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["describe p1 i1", "describe p1 i3", "describe p4 i1"]);
        assert_eq!(run.failed, 0);
    }

    #[tokio::test]
    async fn failed_caption_is_omitted() {
        let echo = Echo { calls: AtomicUsize::new(0), fail_on: 2 };
        let images = [image(1, 1), image(2, 1), image(3, 1)];
        let run = caption_images(&images, &echo, "x", None).await;

        let pages: Vec<_> = run.captions.iter().map(|c| c.page).collect();
        assert_eq!(pages, vec![1, 3]);
        assert_eq!(run.failed, 1);
    }

    #[tokio::test]
    async fn empty_batch() {
        let echo = Echo { calls: AtomicUsize::new(0), fail_on: 0 };
        let run = caption_images(&[], &echo, "x", None).await;
        assert!(run.captions.is_empty());
        assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    }
}
