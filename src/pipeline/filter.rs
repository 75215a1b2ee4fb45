//! Significance filter: tell real figures apart from decorative artefacts.
//!
//! Bullets, rules, logos in running headers and one-pixel spacer images are
//! all embedded as image objects. Captioning them costs money and produces
//! noise, so anything smaller than [`MIN_IMAGE_DIMENSION`] on either axis is
//! ignored. The same predicate runs in detection and extraction, on the same
//! backend-reported dimensions, so the two phases always agree.

/// Minimum width *and* height, in pixels, of a significant image.
pub const MIN_IMAGE_DIMENSION: u32 = 50;

/// Returns `true` iff both dimensions reach [`MIN_IMAGE_DIMENSION`].
#[inline]
pub fn is_significant(width: u32, height: u32) -> bool {
    width >= MIN_IMAGE_DIMENSION && height >= MIN_IMAGE_DIMENSION
}
