//! Error types for the pdfsight library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`PdfSightError`] is **fatal**: the conversion cannot proceed at all
//!   (bad input file, unreadable stream, the base text layer could not be
//!   extracted). Returned as `Err(PdfSightError)` from the top-level
//!   `convert*` functions.
//!
//! * [`BackendError`] is **non-fatal**: one image backend could not open the
//!   document, or one embedded image could not be resolved. The pipeline
//!   absorbs these: detection falls through to the next backend, extraction
//!   skips the image.
//!
//! * [`CaptionError`] is **non-fatal**: the captioning service failed for a
//!   single image. That image is simply omitted from the output.
//!
//! Only the first kind ever reaches the caller. Everything else degrades
//! toward "less enriched but still valid" Markdown.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdfsight library.
#[derive(Debug, Error)]
pub enum PdfSightError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The stream metadata does not describe a PDF.
    #[error("Unsupported document format (mimetype: {mimetype:?}, extension: {extension:?})")]
    UnsupportedFormat {
        mimetype: Option<String>,
        extension: Option<String>,
    },

    /// Reading or rewinding the source stream failed.
    #[error("Failed to read PDF stream: {0}")]
    Stream(#[source] std::io::Error),

    // ── Text layer ────────────────────────────────────────────────────────
    /// The base text extraction failed. This is the one pipeline stage whose
    /// failure is never absorbed.
    #[error("Text extraction failed: {detail}")]
    TextExtraction { detail: String },

    // ── Output / settings ─────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Settings file could not be read or written.
    #[error("Settings file '{path}': {source}")]
    SettingsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file exists but is not valid JSON for [`crate::settings::Settings`].
    #[error("Settings file '{path}' is malformed: {detail}")]
    SettingsParse { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure inside one image backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend is not compiled in or its native library cannot be bound.
    #[error("{backend}: backend unavailable: {detail}")]
    Unavailable {
        backend: &'static str,
        detail: String,
    },

    /// The backend could not open the document at all.
    #[error("{backend}: failed to open document: {detail}")]
    OpenFailed {
        backend: &'static str,
        detail: String,
    },

    /// A page could not be loaded or its resources could not be walked.
    #[error("{backend}: page {page} failed: {detail}")]
    PageFailed {
        backend: &'static str,
        page: usize,
        detail: String,
    },

    /// One embedded image could not be resolved, decoded or converted.
    #[error("page {page}, image {index}: {detail}")]
    ImageFailed {
        page: usize,
        index: usize,
        detail: String,
    },

    /// The image uses a compression filter this backend cannot decode.
    #[error("page {page}, image {index}: unsupported image encoding {filter}")]
    UnsupportedEncoding {
        page: usize,
        index: usize,
        filter: String,
    },
}

/// A non-fatal failure while captioning one image.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum CaptionError {
    /// The provider call failed after all retries.
    #[error("captioning failed after {retries} retries: {detail}")]
    Provider { retries: u32, detail: String },

    /// The provider answered, but with no usable text.
    #[error("captioning returned an empty response")]
    Empty,

    /// The bitmap could not be prepared for upload.
    #[error("image could not be encoded for upload: {0}")]
    Encode(String),
}
