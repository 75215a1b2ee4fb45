//! # pdfsight
//!
//! Convert PDF documents to Markdown and describe the pictures inside them.
//!
//! The text layer comes from a conventional extractor. When a vision-capable
//! LLM is configured, the embedded raster images are pulled out of the
//! document, each one is captioned, and the captions are appended under an
//! `## Images in PDF` heading. A cheap presence check runs first so
//! text-only documents never touch the network.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file or download from URL, check %PDF magic
//!  ├─ 2. Text     base Markdown from the text layer (spawn_blocking)
//!  ├─ 3. Detect   any image ≥ 50×50 px? first backend that opens the file decides
//!  ├─ 4. Extract  significant images → PNG, in document order
//!  ├─ 5. Caption  one provider call per image, sequential, failures skipped
//!  └─ 6. Output   base text + "## Images in PDF" section + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfsight::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .provider_name("openai")
//!         .model("gpt-4o")
//!         .build()?;
//!     let output = convert("report.pdf", &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!("{} image(s) captioned", output.stats.images_captioned);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `pdfsight` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `pdfium` | on      | Image backend on the pdfium native library, bound at runtime |
//! | `lopdf`  | on      | Pure-Rust image backend on lopdf |
//!
//! With neither backend compiled in, conversion still returns the text
//! layer; image enrichment is simply skipped.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod settings;
pub mod source;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{Backends, BackendStatus, EmbeddedImage, ImageSource};
pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{
    convert, convert_reader, convert_sync, convert_to_file, detect_images, resolve_captioner,
    PdfConverter,
};
pub use error::{BackendError, CaptionError, PdfSightError};
pub use output::{Caption, ConversionResult, ConversionStats};
pub use pipeline::caption::{Captioner, LlmCaptioner};
pub use pipeline::extract::RenderedImage;
pub use pipeline::text::{PdfExtractText, TextExtractor};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use settings::Settings;
pub use source::{accepts, PdfSource, StreamInfo};
pub use stream::{caption_stream, caption_stream_from_bytes, CaptionFailure, CaptionStream};
