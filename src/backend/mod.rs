//! Image backends: interchangeable ways of finding embedded images in a PDF.
//!
//! Two implementations exist, tried in priority order:
//!
//! 1. [`pdfium_backend`] (feature `pdfium`): Google's PDF engine via
//!    `pdfium-render`. Most complete decoder, but needs the pdfium shared
//!    library at runtime.
//! 2. [`lopdf_backend`] (feature `lopdf`): pure-Rust object walker. Always
//!    available when compiled in; decodes JPEG and raw/Flate samples.
//!
//! A backend missing at build time or unbindable at load time is not an
//! error. It is simply absent from the [`Backends`] list, and a list with no
//! entries makes detection report "no images".
//!
//! ## Uniform capability
//!
//! Every backend implements [`ImageSource::scan`]: open the document and hand
//! each embedded image to a visitor, in document order, as an
//! [`EmbeddedImage`]. The visitor decides per image whether to look at its
//! dimensions, decode it, or stop the scan early.

#[cfg(feature = "lopdf")]
pub mod lopdf_backend;
#[cfg(feature = "pdfium")]
pub mod pdfium_backend;
pub mod raster;

use crate::error::BackendError;
use image::DynamicImage;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, info};

/// One embedded image reference, as seen during a scan.
///
/// Handed out by reference to the scan visitor; it cannot outlive the open
/// document.
pub trait EmbeddedImage {
    /// 1-based page number.
    fn page(&self) -> usize;

    /// 1-based position of this image among the images of its page.
    fn index(&self) -> usize;

    /// Pixel dimensions `(width, height)` without decoding the samples.
    fn dimensions(&self) -> Result<(u32, u32), BackendError>;

    /// Decode the image into a bitmap. CMYK data is returned as RGB.
    fn decode(&self) -> Result<DynamicImage, BackendError>;
}

/// Visitor callback driven by [`ImageSource::scan`].
pub type ImageVisitor<'v> = dyn FnMut(&dyn EmbeddedImage) -> ControlFlow<()> + 'v;

/// A PDF backend able to enumerate embedded images.
pub trait ImageSource: Send + Sync {
    /// Short stable name used in logs, stats and the CLI (`pdfium`, `lopdf`).
    fn name(&self) -> &'static str;

    /// Open `pdf` and visit every embedded image in document order.
    ///
    /// Returns `Ok(())` when the scan completed or the visitor stopped it.
    /// Errors mean the document (or a page) could not be walked; any images
    /// visited before the error have already been seen by the visitor.
    fn scan(&self, pdf: &[u8], visit: &mut ImageVisitor<'_>) -> Result<(), BackendError>;
}

/// Availability of one backend, as recorded by the probe.
#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub name: &'static str,
    pub available: bool,
    pub detail: String,
}

/// The ordered list of available image backends.
#[derive(Clone, Default)]
pub struct Backends {
    sources: Vec<Arc<dyn ImageSource>>,
    statuses: Vec<BackendStatus>,
}

static PROBED: Lazy<Arc<Backends>> = Lazy::new(|| Arc::new(Backends::probe()));

impl Backends {
    /// The process-wide probe result. The probe runs once, on first use.
    pub fn global() -> Arc<Backends> {
        Arc::clone(&PROBED)
    }

    /// Detect which compiled-in backends can actually be used right now.
    ///
    /// Prefer [`Backends::global`]; this re-runs the probe.
    pub fn probe() -> Self {
        let mut backends = Self::default();

        #[cfg(feature = "pdfium")]
        {
            match pdfium_backend::PdfiumSource::bind() {
                Ok(source) => backends.push_available(Arc::new(source), "pdfium library bound"),
                Err(e) => backends.push_missing("pdfium", e.to_string()),
            }
        }
        #[cfg(not(feature = "pdfium"))]
        {
            backends.push_missing("pdfium", "compiled without the `pdfium` feature".into());
        }

        #[cfg(feature = "lopdf")]
        {
            backends.push_available(Arc::new(lopdf_backend::LopdfSource), "built in");
        }
        #[cfg(not(feature = "lopdf"))]
        {
            backends.push_missing("lopdf", "compiled without the `lopdf` feature".into());
        }

        info!(
            "Image backends available: [{}]",
            backends.names().collect::<Vec<_>>().join(", ")
        );
        backends
    }

    /// A list with no backends: detection is always `false`.
    pub fn none() -> Self {
        Self::default()
    }

    /// Build a list from explicit sources, highest priority first.
    pub fn from_sources(sources: Vec<Arc<dyn ImageSource>>) -> Self {
        let statuses = sources
            .iter()
            .map(|s| BackendStatus {
                name: s.name(),
                available: true,
                detail: "provided by caller".into(),
            })
            .collect();
        Self { sources, statuses }
    }

    /// Keep only the backend called `name`, if it is available.
    pub fn only(&self, name: &str) -> Self {
        let sources: Vec<_> = self
            .sources
            .iter()
            .filter(|s| s.name() == name)
            .cloned()
            .collect();
        debug!("Restricting backends to '{}' ({} match)", name, sources.len());
        Self {
            sources,
            statuses: self.statuses.clone(),
        }
    }

    /// Available sources, highest priority first.
    pub fn sources(&self) -> &[Arc<dyn ImageSource>] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Names of the available sources, in priority order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sources.iter().map(|s| s.name())
    }

    /// What the probe found for every known backend, available or not.
    pub fn statuses(&self) -> &[BackendStatus] {
        &self.statuses
    }

    #[allow(dead_code)]
    fn push_available(&mut self, source: Arc<dyn ImageSource>, detail: &str) {
        self.statuses.push(BackendStatus {
            name: source.name(),
            available: true,
            detail: detail.to_string(),
        });
        self.sources.push(source);
    }

    #[allow(dead_code)]
    fn push_missing(&mut self, name: &'static str, detail: String) {
        debug!("Image backend '{}' unavailable: {}", name, detail);
        self.statuses.push(BackendStatus {
            name,
            available: false,
            detail,
        });
    }
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl ImageSource for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn scan(&self, _pdf: &[u8], _visit: &mut ImageVisitor<'_>) -> Result<(), BackendError> {
            Ok(())
        }
    }

    #[test]
    fn none_is_empty() {
        let b = Backends::none();
        assert!(b.is_empty());
        assert_eq!(b.names().count(), 0);
    }

    #[test]
    fn from_sources_keeps_priority_order() {
        let b = Backends::from_sources(vec![Arc::new(Named("first")), Arc::new(Named("second"))]);
        assert_eq!(b.names().collect::<Vec<_>>(), vec!["first", "second"]);
        assert!(b.statuses().iter().all(|s| s.available));
    }

    #[test]
    fn only_filters_by_name() {
        let b = Backends::from_sources(vec![Arc::new(Named("first")), Arc::new(Named("second"))]);
        assert_eq!(b.only("second").names().collect::<Vec<_>>(), vec!["second"]);
        assert!(b.only("missing").is_empty());
    }

    #[cfg(feature = "lopdf")]
    #[test]
    fn probe_always_finds_lopdf_when_compiled_in() {
        let b = Backends::probe();
        assert!(b.names().any(|n| n == "lopdf"));
        // lopdf is the fallback: it is never ahead of pdfium.
        assert_eq!(b.names().last(), Some("lopdf"));
    }

    #[test]
    fn probe_reports_every_known_backend() {
        let b = Backends::probe();
        let names: Vec<_> = b.statuses().iter().map(|s| s.name).collect();
        assert!(names.contains(&"pdfium"));
        assert!(names.contains(&"lopdf"));
    }
}
