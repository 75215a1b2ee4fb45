//! Image-presence detection: the cost gate in front of captioning.
//!
//! Answers one question, "does this PDF contain at least one significant
//! embedded image?", as cheaply as possible. Only dimensions are resolved;
//! nothing is decoded. The first significant image ends the scan.
//!
//! Every failure mode answers `false`. A PDF that cannot be inspected is
//! converted as text only rather than sent to a paid captioning service on
//! the off chance it has figures.

use super::filter::is_significant;
use crate::backend::{Backends, EmbeddedImage, ImageSource};
use crate::source::PdfSource;
use std::io::{Read, Seek};
use std::ops::ControlFlow;
use tracing::{debug, info, warn};

/// Whether the PDF behind `source` has a significant embedded image.
///
/// The stream cursor is restored before returning.
pub fn detect_presence<R: Read + Seek>(source: &mut PdfSource<R>, backends: &Backends) -> bool {
    if backends.is_empty() {
        debug!("No image backends available; assuming no images");
        return false;
    }

    match source.read_all() {
        Ok(bytes) => detect_in_bytes(&bytes, backends),
        Err(e) => {
            warn!("Could not read PDF stream for image detection: {}", e);
            false
        }
    }
}

/// [`detect_presence`] over an in-memory document.
pub fn detect_in_bytes(pdf: &[u8], backends: &Backends) -> bool {
    for backend in backends.sources() {
        match scan_for_significant(backend.as_ref(), pdf) {
            Ok(found) => {
                info!(
                    "Image detection via {}: {}",
                    backend.name(),
                    if found { "significant image found" } else { "no significant images" }
                );
                return found;
            }
            Err(e) => warn!("Image detection with {} failed, trying next backend: {}", backend.name(), e),
        }
    }

    warn!("All image backends failed; assuming no images");
    false
}

fn scan_for_significant(
    backend: &dyn ImageSource,
    pdf: &[u8],
) -> Result<bool, crate::error::BackendError> {
    let mut found = false;
    backend.scan(pdf, &mut |image: &dyn EmbeddedImage| match image.dimensions() {
        Ok((w, h)) if is_significant(w, h) => {
            debug!("page {} image {}: {}x{} is significant", image.page(), image.index(), w, h);
            found = true;
            ControlFlow::Break(())
        }
        Ok((w, h)) => {
            debug!("page {} image {}: {}x{} below threshold", image.page(), image.index(), w, h);
            ControlFlow::Continue(())
        }
        Err(e) => {
            debug!("Skipping image with unresolved dimensions: {}", e);
            ControlFlow::Continue(())
        }
    })?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use image::DynamicImage;
    use std::io::{Cursor, SeekFrom};
    use std::sync::Arc;

    struct Fake(u32, u32);

    impl EmbeddedImage for Fake {
        fn page(&self) -> usize {
            1
        }
        fn index(&self) -> usize {
            1
        }
        fn dimensions(&self) -> Result<(u32, u32), BackendError> {
            Ok((self.0, self.1))
        }
        fn decode(&self) -> Result<DynamicImage, BackendError> {
            Ok(DynamicImage::new_rgb8(self.0, self.1))
        }
    }

    /// Visits fixed-size images, or fails to open.
    struct Fixed {
        name: &'static str,
        sizes: Option<Vec<(u32, u32)>>,
    }

    impl ImageSource for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn scan(
            &self,
            _pdf: &[u8],
            visit: &mut crate::backend::ImageVisitor<'_>,
        ) -> Result<(), BackendError> {
            let Some(sizes) = &self.sizes else {
                return Err(BackendError::OpenFailed {
                    backend: self.name,
                    detail: "boom".into(),
                });
            };
            for &(w, h) in sizes {
                if visit(&Fake(w, h)).is_break() {
                    break;
                }
            }
            Ok(())
        }
    }

    fn backends(list: Vec<Fixed>) -> Backends {
        Backends::from_sources(list.into_iter().map(|f| Arc::new(f) as Arc<dyn ImageSource>).collect())
    }

    #[test]
    fn no_backends_means_no_images() {
        assert!(!detect_in_bytes(b"%PDF", &Backends::none()));
    }

    #[test]
    fn small_images_are_not_enough() {
        let b = backends(vec![Fixed { name: "a", sizes: Some(vec![(10, 10), (49, 400)]) }]);
        assert!(!detect_in_bytes(b"", &b));
    }

    #[test]
    fn significant_image_found() {
        let b = backends(vec![Fixed { name: "a", sizes: Some(vec![(10, 10), (50, 50)]) }]);
        assert!(detect_in_bytes(b"", &b));
    }

    #[test]
    fn failing_primary_falls_through() {
        let b = backends(vec![
            Fixed { name: "primary", sizes: None },
            Fixed { name: "fallback", sizes: Some(vec![(100, 100)]) },
        ]);
        assert!(detect_in_bytes(b"", &b));
    }

    #[test]
    fn completed_scan_does_not_fall_through() {
        let b = backends(vec![
            Fixed { name: "primary", sizes: Some(vec![]) },
            Fixed { name: "fallback", sizes: Some(vec![(100, 100)]) },
        ]);
        assert!(!detect_in_bytes(b"", &b));
    }

    #[test]
    fn all_backends_failing_is_false() {
        let b = backends(vec![
            Fixed { name: "primary", sizes: None },
            Fixed { name: "fallback", sizes: None },
        ]);
        assert!(!detect_in_bytes(b"", &b));
    }

    #[test]
    fn cursor_is_restored() {
        let b = backends(vec![Fixed { name: "a", sizes: Some(vec![(60, 60)]) }]);
        let mut source = PdfSource::new(Cursor::new(b"%PDF-1.4 ...".to_vec()));
        source.get_mut().seek(SeekFrom::Start(3)).unwrap();
        assert!(detect_presence(&mut source, &b));
        assert_eq!(source.position().unwrap(), 3);
    }
}
