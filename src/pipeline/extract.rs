//! Image extraction: every significant embedded image as a standalone PNG.
//!
//! Runs the same significance filter as detection on the same
//! backend-reported dimensions, then decodes and PNG-encodes each survivor.
//! Failures are local: a bad image is skipped, a backend that cannot open the
//! document hands over to the next one, and a document nobody can open
//! yields no images. Nothing here returns an error.

use super::encode::encode_png;
use super::filter::is_significant;
use crate::backend::{Backends, EmbeddedImage, ImageSource};
use crate::error::BackendError;
use crate::source::PdfSource;
use std::fmt;
use std::io::{Read, Seek};
use std::ops::ControlFlow;
use tracing::{debug, info, warn};

/// One extracted image, PNG-encoded and ready for captioning.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// 1-based page number.
    pub page: usize,
    /// 1-based position among all images on the page, including the ones the
    /// significance filter dropped.
    pub index: usize,
}

impl RenderedImage {
    /// Conventional file name, e.g. `pdf_image_page3_2.png`.
    pub fn file_name(&self) -> String {
        format!("pdf_image_page{}_{}.png", self.page, self.index)
    }
}

impl fmt::Debug for RenderedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedImage")
            .field("page", &self.page)
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png", &format_args!("<{} bytes>", self.png.len()))
            .finish()
    }
}

/// Result of an extraction run.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Images in document order.
    pub images: Vec<RenderedImage>,
    /// Backend that produced `images`, if any backend managed to open the document.
    pub backend: Option<&'static str>,
    /// Significant images that could not be decoded or encoded.
    pub skipped: usize,
}

/// Extract every significant image from the PDF behind `source`.
///
/// The stream cursor is restored before returning.
pub fn extract_images<R: Read + Seek>(source: &mut PdfSource<R>, backends: &Backends) -> Extraction {
    if backends.is_empty() {
        debug!("No image backends available; nothing to extract");
        return Extraction::default();
    }

    match source.read_all() {
        Ok(bytes) => extract_from_bytes(&bytes, backends),
        Err(e) => {
            warn!("Could not read PDF stream for image extraction: {}", e);
            Extraction::default()
        }
    }
}

/// [`extract_images`] over an in-memory document.
pub fn extract_from_bytes(pdf: &[u8], backends: &Backends) -> Extraction {
    for backend in backends.sources() {
        let mut run = Extraction {
            backend: Some(backend.name()),
            ..Default::default()
        };

        match collect(backend.as_ref(), pdf, &mut run) {
            Ok(()) => {
                info!(
                    "Extracted {} image(s) via {} ({} skipped)",
                    run.images.len(),
                    backend.name(),
                    run.skipped
                );
                return run;
            }
            Err(e) if run.images.is_empty() => {
                warn!("Image extraction with {} failed, trying next backend: {}", backend.name(), e);
            }
            Err(e) => {
                // Restarting on another backend would duplicate what we already have.
                warn!(
                    "Image extraction with {} stopped early, keeping {} image(s): {}",
                    backend.name(),
                    run.images.len(),
                    e
                );
                return run;
            }
        }
    }

    warn!("No image backend could open the document; no images extracted");
    Extraction::default()
}

fn collect(backend: &dyn ImageSource, pdf: &[u8], run: &mut Extraction) -> Result<(), BackendError> {
    backend.scan(pdf, &mut |image: &dyn EmbeddedImage| {
        match render(image) {
            Ok(Some(rendered)) => run.images.push(rendered),
            Ok(None) => {}
            Err(e) => {
                warn!("Skipping image: {}", e);
                run.skipped += 1;
            }
        }
        ControlFlow::Continue(())
    })
}

/// Decode and encode one image, or `None` if it is not significant.
fn render(image: &dyn EmbeddedImage) -> Result<Option<RenderedImage>, BackendError> {
    let (width, height) = image.dimensions()?;
    if !is_significant(width, height) {
        debug!(
            "page {} image {}: {}x{} below threshold",
            image.page(),
            image.index(),
            width,
            height
        );
        return Ok(None);
    }

    let bitmap = image.decode()?;
    let png = encode_png(&bitmap).map_err(|e| BackendError::ImageFailed {
        page: image.page(),
        index: image.index(),
        detail: format!("PNG encoding failed: {e}"),
    })?;

    debug!(
        "page {} image {}: {}x{} → {} PNG bytes",
        image.page(),
        image.index(),
        width,
        height,
        png.len()
    );
    Ok(Some(RenderedImage {
        png,
        width,
        height,
        page: image.page(),
        index: image.index(),
    }))
}
