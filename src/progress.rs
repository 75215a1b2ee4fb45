//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to follow a
//! conversion as it runs: the text layer, the presence check, then one
//! start/captioned/error triple per extracted image.
//!
//! # Example
//!
//! ```rust
//! use pdfsight::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     captioned: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_image_captioned(&self, position: usize, total: usize, caption_len: usize) {
//!         self.captioned.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Image {}/{} captioned ({} bytes)", position, total, caption_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { captioned: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events arrive from the task running the conversion,
/// one at a time.
pub trait ConversionProgressCallback: Send + Sync {
    /// The base text layer is ready.
    fn on_text_extracted(&self, chars: usize) {
        let _ = chars;
    }

    /// The presence check finished.
    fn on_detection_complete(&self, found: bool) {
        let _ = found;
    }

    /// Bitmaps are extracted; `total` images will be captioned.
    fn on_extraction_complete(&self, total: usize) {
        let _ = total;
    }

    /// About to caption image `position` of `total` (both 1-based counts),
    /// found at `page`/`index` in the document.
    fn on_image_start(&self, position: usize, total: usize, page: usize, index: usize) {
        let _ = (position, total, page, index);
    }

    /// Image `position` was captioned.
    fn on_image_captioned(&self, position: usize, total: usize, caption_len: usize) {
        let _ = (position, total, caption_len);
    }

    /// Image `position` could not be captioned and is left out.
    fn on_image_error(&self, position: usize, total: usize, error: &str) {
        let _ = (position, total, error);
    }

    /// The Markdown document is assembled.
    fn on_conversion_complete(&self, captioned: usize, failed: usize) {
        let _ = (captioned, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        captioned: AtomicUsize,
        errors: AtomicUsize,
        last_page: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_image_start(&self, _position: usize, _total: usize, page: usize, _index: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.last_page.store(page, Ordering::SeqCst);
        }

        fn on_image_captioned(&self, _position: usize, _total: usize, _caption_len: usize) {
            self.captioned.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_error(&self, _position: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_text_extracted(120);
        cb.on_detection_complete(true);
        cb.on_extraction_complete(2);
        cb.on_image_start(1, 2, 1, 1);
        cb.on_image_captioned(1, 2, 42);
        cb.on_image_error(2, 2, "rate limited");
        cb.on_conversion_complete(1, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_image_start(1, 3, 1, 1);
        tracker.on_image_captioned(1, 3, 100);
        tracker.on_image_start(2, 3, 2, 1);
        tracker.on_image_error(2, 3, "timeout");
        tracker.on_image_start(3, 3, 5, 2);
        tracker.on_image_captioned(3, 3, 80);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.captioned.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.last_page.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_detection_complete(false);
        cb.on_conversion_complete(0, 0);
    }
}
