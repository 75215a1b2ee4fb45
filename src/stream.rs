//! Streaming API: emit captions as they complete.
//!
//! Unlike the eager [`crate::convert::convert`], which returns only after
//! every image is captioned and the document is assembled,
//! [`caption_stream`] yields one item per extracted image as soon as the
//! captioner answers. Items always arrive in document order; captioning is
//! sequential.
//!
//! The stream carries captions only, not the text layer. Callers that want
//! both should use [`crate::convert::convert`].

use crate::config::ConversionConfig;
use crate::convert::{load_input, resolve_captioner, select_images};
use crate::error::{CaptionError, PdfSightError};
use crate::output::{Caption, ConversionStats};
use crate::pipeline::input::check_magic;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{info, warn};

/// An image that could not be captioned.
#[derive(Debug, thiserror::Error)]
#[error("page {page} image {index}: {error}")]
pub struct CaptionFailure {
    pub page: usize,
    pub index: usize,
    #[source]
    pub error: CaptionError,
}

/// A boxed stream of caption results.
pub type CaptionStream = Pin<Box<dyn Stream<Item = Result<Caption, CaptionFailure>> + Send>>;

/// Caption the images of a PDF file or URL, streaming results in order.
///
/// Detection and extraction finish before this returns; the stream then
/// drives one captioner call per item. Without a captioner, or when the
/// presence check finds nothing, the stream is empty.
///
/// # Returns
/// - `Ok(CaptionStream)`: a stream of `Result<Caption, CaptionFailure>`
/// - `Err(PdfSightError)`: fatal error (file not found, not a PDF, etc.)
pub async fn caption_stream(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<CaptionStream, PdfSightError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming captioning: {}", input_str);
    let pdf = load_input(input_str, config).await?;
    build_stream(pdf, config).await
}

/// Streaming equivalent of captioning PDF bytes already in memory.
///
/// # Example
/// ```rust,no_run
/// use pdfsight::{caption_stream_from_bytes, ConversionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("report.pdf")?;
/// let config = ConversionConfig::builder().provider_name("openai").build()?;
/// let mut captions = caption_stream_from_bytes(bytes, &config).await?;
/// while let Some(item) = captions.next().await {
///     match item {
///         Ok(c) => println!("Page {}, Image {}: {}", c.page, c.index, c.text),
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn caption_stream_from_bytes(
    bytes: Vec<u8>,
    config: &ConversionConfig,
) -> Result<CaptionStream, PdfSightError> {
    check_magic(&bytes, Path::new("<bytes>"))?;
    build_stream(Arc::new(bytes), config).await
}

async fn build_stream(
    pdf: Arc<Vec<u8>>,
    config: &ConversionConfig,
) -> Result<CaptionStream, PdfSightError> {
    let Some(captioner) = resolve_captioner(config) else {
        warn!("No captioner configured; caption stream is empty");
        return Ok(Box::pin(stream::empty()));
    };

    let mut stats = ConversionStats::default();
    let images = match select_images(pdf, config, &mut stats).await? {
        Some(extraction) => extraction.images,
        None => Vec::new(),
    };
    info!("Streaming captions for {} image(s)", images.len());

    let prompt = config.effective_prompt().to_string();
    let s = stream::iter(images).then(move |image| {
        let captioner = Arc::clone(&captioner);
        let prompt = prompt.clone();
        async move {
            match captioner.caption(&image, &prompt).await {
                Ok(text) => Ok(Caption {
                    page: image.page,
                    index: image.index,
                    text,
                }),
                Err(error) => Err(CaptionFailure {
                    page: image.page,
                    index: image.index,
                    error,
                }),
            }
        }
    });

    Ok(Box::pin(s))
}
