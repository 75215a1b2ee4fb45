//! Primary image backend: Google's pdfium via [`pdfium_render`].
//!
//! pdfium is a native library loaded at runtime. [`PdfiumSource::bind`]
//! looks for it in this order:
//!
//! 1. `PDFIUM_LIB_PATH` (the library file, or a directory containing it)
//! 2. the platform library name in the current directory
//! 3. the system library search path
//!
//! The probe binds once and the bound instance is reused for every scan.
//! Page objects are walked in content order, descending into Form XObjects.

use super::{EmbeddedImage, ImageSource, ImageVisitor};
use crate::error::BackendError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::fmt;
use std::ops::ControlFlow;
use std::path::PathBuf;
use tracing::{debug, trace};

const NAME: &str = "pdfium";

/// Where the pdfium library was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfiumLibrary {
    Path(PathBuf),
    System,
}

/// The pdfium backend.
pub struct PdfiumSource {
    pdfium: Pdfium,
    library: PdfiumLibrary,
}

impl fmt::Debug for PdfiumSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfiumSource")
            .field("library", &self.library)
            .finish()
    }
}

impl PdfiumSource {
    /// Locate and bind the pdfium library.
    pub fn bind() -> Result<Self, BackendError> {
        bind_with(candidate_paths(), true)
    }

    pub fn library(&self) -> &PdfiumLibrary {
        &self.library
    }
}

fn bind_with(candidates: Vec<PathBuf>, try_system: bool) -> Result<PdfiumSource, BackendError> {
    let mut tried = Vec::new();

    for candidate in candidates {
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                debug!("pdfium bound from {}", candidate.display());
                return Ok(PdfiumSource {
                    pdfium: Pdfium::new(bindings),
                    library: PdfiumLibrary::Path(candidate),
                });
            }
            Err(e) => tried.push(format!("{}: {:?}", candidate.display(), e)),
        }
    }

    if try_system {
        match Pdfium::bind_to_system_library() {
            Ok(bindings) => {
                debug!("pdfium bound from system library path");
                return Ok(PdfiumSource {
                    pdfium: Pdfium::new(bindings),
                    library: PdfiumLibrary::System,
                });
            }
            Err(e) => tried.push(format!("system: {e:?}")),
        }
    }

    Err(BackendError::Unavailable {
        backend: NAME,
        detail: tried.join("; "),
    })
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(configured) = std::env::var_os("PDFIUM_LIB_PATH") {
        let configured = PathBuf::from(configured);
        if configured.is_dir() {
            paths.push(Pdfium::pdfium_platform_library_name_at_path(&configured));
        } else {
            paths.push(configured);
        }
    }
    paths.push(Pdfium::pdfium_platform_library_name_at_path("./"));
    paths
}

impl ImageSource for PdfiumSource {
    fn name(&self) -> &'static str {
        NAME
    }

    fn scan(&self, pdf: &[u8], visit: &mut ImageVisitor<'_>) -> Result<(), BackendError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| BackendError::OpenFailed {
                backend: NAME,
                detail: format!("{:?}", e),
            })?;

        let pages = document.pages();
        debug!("pdfium: {} pages", pages.len());

        for (position, page) in pages.iter().enumerate() {
            let mut walk = PageWalk {
                page: position + 1,
                index: 0,
                visit: &mut *visit,
            };
            if walk.objects(&mut page.objects().iter(), 0).is_break() {
                return Ok(());
            }
        }
        Ok(())
    }
}

/// Form XObjects nested deeper than this are not searched.
const MAX_FORM_DEPTH: usize = 16;

/// Per-page traversal state; `index` keeps counting through nested forms.
struct PageWalk<'v, 'w> {
    page: usize,
    index: usize,
    visit: &'w mut ImageVisitor<'v>,
}

impl PageWalk<'_, '_> {
    fn objects<'a>(
        &mut self,
        objects: &mut dyn Iterator<Item = PdfPageObject<'a>>,
        depth: usize,
    ) -> ControlFlow<()> {
        for object in objects {
            if let Some(image) = object.as_image_object() {
                self.index += 1;
                trace!("pdfium: page {} image object {}", self.page, self.index);
                let candidate = PdfiumImage {
                    image,
                    page: self.page,
                    index: self.index,
                };
                (self.visit)(&candidate)?;
            } else if let Some(form) = object.as_x_object_form_object() {
                if depth >= MAX_FORM_DEPTH {
                    debug!("pdfium: page {} form nested too deep, not searched", self.page);
                    continue;
                }
                self.objects(&mut form.iter(), depth + 1)?;
            }
        }
        ControlFlow::Continue(())
    }
}

struct PdfiumImage<'a, 'b> {
    image: &'a PdfPageImageObject<'b>,
    page: usize,
    index: usize,
}

impl PdfiumImage<'_, '_> {
    fn failed(&self, detail: String) -> BackendError {
        BackendError::ImageFailed {
            page: self.page,
            index: self.index,
            detail,
        }
    }
}

impl EmbeddedImage for PdfiumImage<'_, '_> {
    fn page(&self) -> usize {
        self.page
    }

    fn index(&self) -> usize {
        self.index
    }

    fn dimensions(&self) -> Result<(u32, u32), BackendError> {
        // Pixel size of the embedded bitmap, not its placement on the page.
        let width = PdfPageImageObject::width(self.image)
            .map_err(|e| self.failed(format!("width: {:?}", e)))?;
        let height = PdfPageImageObject::height(self.image)
            .map_err(|e| self.failed(format!("height: {:?}", e)))?;
        Ok((width.max(0) as u32, height.max(0) as u32))
    }

    fn decode(&self) -> Result<DynamicImage, BackendError> {
        let raw = self
            .image
            .get_raw_image()
            .map_err(|e| self.failed(format!("{:?}", e)))?;
        // pdfium hands back RGBA/BGRA; keep the alpha channel only if present.
        Ok(match raw {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => raw,
            other => DynamicImage::ImageRgba8(other.to_rgba8()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_paths_end_with_working_directory() {
        let paths = candidate_paths();
        assert_eq!(
            paths.last(),
            Some(&Pdfium::pdfium_platform_library_name_at_path("./"))
        );
    }

    #[test]
    fn unbindable_library_reports_unavailable() {
        let err = bind_with(vec![PathBuf::from("/nonexistent/libpdfium.so")], false).unwrap_err();
        match err {
            BackendError::Unavailable { backend, detail } => {
                assert_eq!(backend, "pdfium");
                assert!(detail.contains("/nonexistent/libpdfium.so"));
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn garbage_fails_to_open_when_bound() {
        // Only meaningful where the library is installed.
        let Ok(source) = PdfiumSource::bind() else {
            return;
        };
        let err = source
            .scan(b"definitely not a pdf", &mut |_img: &dyn EmbeddedImage| {
                std::ops::ControlFlow::Continue(())
            })
            .unwrap_err();
        assert!(matches!(err, BackendError::OpenFailed { backend: "pdfium", .. }));
    }
}
