//! Eager (full-document) conversion entry points.
//!
//! These functions wait for the whole pipeline and return the assembled
//! Markdown. Use [`crate::stream::caption_stream`] instead to receive
//! captions one by one as the captioner produces them.
//!
//! Only input problems and a failed text layer are errors. Everything about
//! images degrades: no backend, no captioner, a provider that cannot be
//! built, an image that fails. Each of those yields plain-text Markdown or
//! fewer captions, never an `Err`.

use crate::config::ConversionConfig;
use crate::error::PdfSightError;
use crate::output::{Caption, ConversionResult, ConversionStats};
use crate::pipeline::assemble::assemble_markdown;
use crate::pipeline::caption::{caption_images, Captioner, LlmCaptioner};
use crate::pipeline::detect::detect_in_bytes;
use crate::pipeline::extract::{extract_from_bytes, Extraction};
use crate::pipeline::input;
use crate::source::{self, PdfSource, StreamInfo};
use edgequake_llm::ProviderFactory;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Model used with `provider_name` when no model is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// A configured PDF converter.
///
/// The document-converter plugin face of the library: [`accepts`] decides
/// whether a stream is a PDF, [`PdfConverter::convert`] turns it into
/// Markdown.
///
/// [`accepts`]: PdfConverter::accepts
#[derive(Debug, Clone, Default)]
pub struct PdfConverter {
    config: ConversionConfig,
}

impl PdfConverter {
    pub fn new(config: ConversionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Whether a stream described by `info` is a PDF this converter handles.
    pub fn accepts(info: &StreamInfo) -> bool {
        source::accepts(info)
    }

    /// Convert a seekable stream. Its cursor is left where it was.
    pub async fn convert<R: Read + Seek>(
        &self,
        reader: &mut R,
        info: &StreamInfo,
    ) -> Result<ConversionResult, PdfSightError> {
        convert_reader(reader, info, &self.config).await
    }

    /// Convert a file path or URL.
    pub async fn convert_input(&self, input: impl AsRef<str>) -> Result<ConversionResult, PdfSightError> {
        convert(input, &self.config).await
    }

    /// Presence check only, using this converter's backends.
    pub async fn detect_images(&self, input: impl AsRef<str>) -> Result<bool, PdfSightError> {
        let pdf = load_input(input.as_ref(), &self.config).await?;
        let backends = self.config.effective_backends();
        blocking("detection", move || detect_in_bytes(&pdf, &backends)).await
    }
}

/// Convert a PDF file or URL to Markdown.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(PdfSightError)` only for fatal errors:
/// - File not found / permission denied / download failed
/// - Not a PDF (by extension/MIME type or by magic bytes)
/// - The text layer could not be extracted
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionResult, PdfSightError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);
    let pdf = load_input(input_str, config).await?;
    run_pipeline(pdf, config).await
}

/// Convert any seekable byte stream.
///
/// The stream's cursor is restored to where it was before the call.
pub async fn convert_reader<R: Read + Seek>(
    reader: &mut R,
    info: &StreamInfo,
    config: &ConversionConfig,
) -> Result<ConversionResult, PdfSightError> {
    if !source::accepts(info) {
        return Err(unsupported(info));
    }

    let bytes = PdfSource::new(&mut *reader)
        .read_all()
        .map_err(PdfSightError::Stream)?;
    let label = info.filename.clone().unwrap_or_else(|| "<stream>".to_string());
    input::check_magic(&bytes, Path::new(&label))?;

    run_pipeline(Arc::new(bytes), config).await
}

/// Convert a PDF and write output directly to a file.
///
/// The Markdown is written to a temporary file next to `output_path` and
/// renamed into place, so readers never see a partial file.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, PdfSightError> {
    let output = convert(input_str, config).await?;
    let path = output_path.as_ref().to_path_buf();
    write_atomic(path, output.markdown).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionResult, PdfSightError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PdfSightError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Whether a PDF file or URL contains a significant image.
///
/// Does not require an LLM provider or API key. Uses the process-wide
/// backend probe.
pub async fn detect_images(input_str: impl AsRef<str>) -> Result<bool, PdfSightError> {
    PdfConverter::default().detect_images(input_str).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve `input`, check it is an accepted PDF and read it into memory.
pub(crate) async fn load_input(
    input_str: &str,
    config: &ConversionConfig,
) -> Result<Arc<Vec<u8>>, PdfSightError> {
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let info = resolved.stream_info().clone();
    if !source::accepts(&info) {
        return Err(unsupported(&info));
    }

    let path = resolved.path().to_path_buf();
    let read_path = path.clone();
    let bytes = blocking("read", move || PdfSource::open(&read_path)?.read_all())
        .await?
        .map_err(PdfSightError::Stream)?;
    input::check_magic(&bytes, &path)?;

    debug!("Loaded {} bytes from {}", bytes.len(), path.display());
    Ok(Arc::new(bytes))
}

fn unsupported(info: &StreamInfo) -> PdfSightError {
    PdfSightError::UnsupportedFormat {
        mimetype: info.mimetype.clone(),
        extension: info.extension.clone(),
    }
}

/// Run blocking work on the blocking pool.
async fn blocking<T, F>(stage: &str, f: F) -> Result<T, PdfSightError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PdfSightError::Internal(format!("{} task panicked: {}", stage, e)))
}

/// Build the captioner the config asks for, if any.
///
/// Most specific first: an explicit [`Captioner`], then a pre-built provider,
/// then a provider name (+ model) through [`ProviderFactory`]. A provider
/// that cannot be created is logged and treated as "no captioner".
pub fn resolve_captioner(config: &ConversionConfig) -> Option<Arc<dyn Captioner>> {
    if let Some(ref captioner) = config.captioner {
        return Some(Arc::clone(captioner));
    }

    if let Some(ref provider) = config.provider {
        return Some(Arc::new(LlmCaptioner::from_config(Arc::clone(provider), config)));
    }

    let name = config.provider_name.as_deref()?;
    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
    match ProviderFactory::create_llm_provider(name, model) {
        Ok(provider) => {
            info!("Captioning with {} / {}", name, model);
            Some(Arc::new(LlmCaptioner::from_config(provider, config)))
        }
        Err(e) => {
            warn!(
                "Could not create LLM provider '{}' ({}): {}; converting text only",
                name, model, e
            );
            None
        }
    }
}

/// The pipeline proper, over an in-memory document.
pub(crate) async fn run_pipeline(
    pdf: Arc<Vec<u8>>,
    config: &ConversionConfig,
) -> Result<ConversionResult, PdfSightError> {
    let total_start = Instant::now();
    let mut stats = ConversionStats::default();
    let progress = config.progress_callback.as_ref();

    // ── Step 1: Base text ────────────────────────────────────────────────
    let text_start = Instant::now();
    let extractor = config.effective_text_extractor();
    let text_pdf = Arc::clone(&pdf);
    let base = blocking("text extraction", move || extractor.extract(&text_pdf)).await??;
    stats.text_chars = base.chars().count();
    stats.text_duration_ms = text_start.elapsed().as_millis() as u64;
    info!("Text layer: {} chars in {}ms", stats.text_chars, stats.text_duration_ms);
    if let Some(cb) = progress {
        cb.on_text_extracted(stats.text_chars);
    }

    // ── Step 2: Captioner ────────────────────────────────────────────────
    let Some(captioner) = resolve_captioner(config) else {
        debug!("No captioner configured; skipping images");
        return Ok(finish(base, Vec::new(), stats, total_start, config));
    };
    stats.captioning_requested = true;

    // ── Step 3: Images ───────────────────────────────────────────────────
    let image_start = Instant::now();
    let Some(extraction) = select_images(pdf, config, &mut stats).await? else {
        stats.image_duration_ms = image_start.elapsed().as_millis() as u64;
        return Ok(finish(base, Vec::new(), stats, total_start, config));
    };
    stats.image_duration_ms = image_start.elapsed().as_millis() as u64;

    // ── Step 4: Captions ─────────────────────────────────────────────────
    let run = caption_images(
        &extraction.images,
        captioner.as_ref(),
        config.effective_prompt(),
        progress,
    )
    .await;
    stats.images_captioned = run.captions.len();
    stats.images_failed = run.failed;
    stats.caption_duration_ms = run.duration_ms;

    Ok(finish(base, run.captions, stats, total_start, config))
}

/// Presence check (if enabled) then extraction.
///
/// `None` means the presence check found nothing and extraction was skipped.
pub(crate) async fn select_images(
    pdf: Arc<Vec<u8>>,
    config: &ConversionConfig,
    stats: &mut ConversionStats,
) -> Result<Option<Extraction>, PdfSightError> {
    let backends = config.effective_backends();
    let progress = config.progress_callback.as_ref();

    if config.smart_detection {
        let detect_pdf = Arc::clone(&pdf);
        let detect_backends = Arc::clone(&backends);
        let found =
            blocking("detection", move || detect_in_bytes(&detect_pdf, &detect_backends)).await?;
        stats.detection_ran = true;
        stats.images_detected = Some(found);
        if let Some(cb) = progress {
            cb.on_detection_complete(found);
        }
        if !found {
            info!("No significant images; skipping extraction and captioning");
            return Ok(None);
        }
    }

    let extraction = blocking("extraction", move || extract_from_bytes(&pdf, &backends)).await?;
    stats.backend = extraction.backend.map(str::to_string);
    stats.images_extracted = extraction.images.len();
    stats.images_skipped = extraction.skipped;
    if let Some(cb) = progress {
        cb.on_extraction_complete(extraction.images.len());
    }
    Ok(Some(extraction))
}

fn finish(
    base: String,
    captions: Vec<Caption>,
    mut stats: ConversionStats,
    total_start: Instant,
    config: &ConversionConfig,
) -> ConversionResult {
    let markdown = assemble_markdown(&base, &captions);
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Conversion complete: {} caption(s), {} failed, {}ms total",
        stats.images_captioned, stats.images_failed, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(stats.images_captioned, stats.images_failed);
    }
    ConversionResult {
        markdown,
        captions,
        stats,
    }
}

async fn write_atomic(path: PathBuf, contents: String) -> Result<(), PdfSightError> {
    let target = path.clone();
    blocking("write", move || -> Result<(), PdfSightError> {
        let write_err = |source| PdfSightError::OutputWriteFailed {
            path: target.clone(),
            source,
        };
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
        tmp.write_all(contents.as_bytes()).map_err(write_err)?;
        tmp.persist(&target).map_err(|e| write_err(e.error))?;
        Ok(())
    })
    .await??;
    info!("Wrote {}", path.display());
    Ok(())
}
