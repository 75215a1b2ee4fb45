//! Raw PDF image samples → `DynamicImage`.
//!
//! PDF stores uncompressed (or Flate/LZW compressed) images as packed
//! samples: `BitsPerComponent` bits per colour component, rows padded to a
//! whole byte. This module unpacks them and normalises the colour space so
//! that everything leaving a backend is Gray or RGB. CMYK never reaches the
//! PNG encoder.

use image::{DynamicImage, GrayImage, RgbImage};

/// Colour spaces the raw-sample path understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColourSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette image: each sample is an index into `lookup`, which holds
    /// `hival + 1` entries of `base.components()` bytes each.
    Indexed {
        base: Box<ColourSpace>,
        hival: u8,
        lookup: Vec<u8>,
    },
}

impl ColourSpace {
    /// Number of colour components per pixel in the sample stream.
    pub fn components(&self) -> usize {
        match self {
            ColourSpace::Gray | ColourSpace::Indexed { .. } => 1,
            ColourSpace::Rgb => 3,
            ColourSpace::Cmyk => 4,
        }
    }

    /// Map a component count (e.g. `/N` of an ICC profile) to a device space.
    pub fn from_component_count(n: i64) -> Option<Self> {
        match n {
            1 => Some(ColourSpace::Gray),
            3 => Some(ColourSpace::Rgb),
            4 => Some(ColourSpace::Cmyk),
            _ => None,
        }
    }
}

/// Upper bound on samples in one image, about a 16k × 16k CMYK scan.
const MAX_SAMPLES: usize = 1 << 30;

/// Naive device CMYK → RGB conversion.
#[inline]
pub fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let k = 255 - k as u16;
    let channel = |v: u8| ((255 - v as u16) * k / 255) as u8;
    [channel(c), channel(m), channel(y)]
}

/// Unpack `height` rows of `width * components` samples of `bpc` bits each.
///
/// Returns one raw (unscaled) value per sample. 16-bit samples are kept whole.
pub fn unpack_samples(
    data: &[u8],
    width: u32,
    height: u32,
    components: usize,
    bpc: u8,
) -> Result<Vec<u16>, String> {
    if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
        return Err(format!("unsupported BitsPerComponent {bpc}"));
    }
    if width == 0 || height == 0 || components == 0 {
        return Err(format!("empty image {width}x{height}"));
    }

    let too_large = || format!("image too large: {width}x{height}x{components} at {bpc} bpc");
    let samples_per_row = (width as usize).checked_mul(components).ok_or_else(too_large)?;
    let total_samples = samples_per_row
        .checked_mul(height as usize)
        .filter(|&n| n <= MAX_SAMPLES)
        .ok_or_else(too_large)?;
    let row_bytes = samples_per_row
        .checked_mul(bpc as usize)
        .ok_or_else(too_large)?
        .div_ceil(8);
    let needed = row_bytes.checked_mul(height as usize).ok_or_else(too_large)?;
    if data.len() < needed {
        return Err(format!(
            "short sample buffer: expected {needed} bytes, got {}",
            data.len()
        ));
    }

    let mut out = Vec::with_capacity(total_samples);
    for row in data.chunks_exact(row_bytes).take(height as usize) {
        match bpc {
            8 => out.extend(row[..samples_per_row].iter().map(|&b| b as u16)),
            16 => out.extend(
                row.chunks_exact(2)
                    .take(samples_per_row)
                    .map(|p| u16::from_be_bytes([p[0], p[1]])),
            ),
            _ => {
                let bits = bpc as usize;
                let mask = (1u16 << bits) - 1;
                for i in 0..samples_per_row {
                    let bit_offset = i * bits;
                    let byte = row[bit_offset / 8] as u16;
                    let shift = 8 - bits - (bit_offset % 8);
                    out.push((byte >> shift) & mask);
                }
            }
        }
    }
    Ok(out)
}

/// Scale a raw sample of `bpc` bits to the 0–255 range.
#[inline]
fn scale(value: u16, bpc: u8) -> u8 {
    match bpc {
        1 => (value * 255) as u8,
        2 => (value * 85) as u8,
        4 => (value * 17) as u8,
        16 => (value >> 8) as u8,
        _ => value as u8,
    }
}

/// Build a bitmap from packed samples in `space`.
pub fn samples_to_image(
    data: &[u8],
    width: u32,
    height: u32,
    bpc: u8,
    space: &ColourSpace,
) -> Result<DynamicImage, String> {
    let samples = unpack_samples(data, width, height, space.components(), bpc)?;

    let image = match space {
        ColourSpace::Gray => {
            let pixels = samples.iter().map(|&v| scale(v, bpc)).collect();
            GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
        }
        ColourSpace::Rgb => {
            let pixels = samples.iter().map(|&v| scale(v, bpc)).collect();
            RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
        ColourSpace::Cmyk => {
            let scaled: Vec<u8> = samples.iter().map(|&v| scale(v, bpc)).collect();
            let pixels = scaled
                .chunks_exact(4)
                .flat_map(|p| cmyk_to_rgb(p[0], p[1], p[2], p[3]))
                .collect();
            RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
        ColourSpace::Indexed {
            base,
            hival,
            lookup,
        } => {
            let n = base.components();
            let mut pixels = Vec::with_capacity(samples.len() * 3);
            for &index in &samples {
                let i = index.min(*hival as u16) as usize * n;
                let entry = lookup
                    .get(i..i + n)
                    .ok_or_else(|| format!("palette index {index} outside lookup table"))?;
                pixels.extend_from_slice(&palette_rgb(base, entry)?);
            }
            RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
    };

    image.ok_or_else(|| format!("sample buffer does not match {width}x{height}"))
}

fn palette_rgb(base: &ColourSpace, entry: &[u8]) -> Result<[u8; 3], String> {
    match base {
        ColourSpace::Gray => Ok([entry[0]; 3]),
        ColourSpace::Rgb => Ok([entry[0], entry[1], entry[2]]),
        ColourSpace::Cmyk => Ok(cmyk_to_rgb(entry[0], entry[1], entry[2], entry[3])),
        ColourSpace::Indexed { .. } => Err("nested Indexed colour space".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmyk_extremes() {
        assert_eq!(cmyk_to_rgb(0, 0, 0, 0), [255, 255, 255]);
        assert_eq!(cmyk_to_rgb(0, 0, 0, 255), [0, 0, 0]);
        assert_eq!(cmyk_to_rgb(255, 0, 0, 0), [0, 255, 255]);
        assert_eq!(cmyk_to_rgb(0, 255, 255, 0), [255, 0, 0]);
    }

    #[test]
    fn unpack_one_bit_rows_are_byte_padded() {
        // 3 pixels wide, 2 rows: each row uses one byte, top bits first.
        let data = [0b1010_0000, 0b0110_0000];
        let s = unpack_samples(&data, 3, 2, 1, 1).unwrap();
        assert_eq!(s, vec![1, 0, 1, 0, 1, 1]);
    }

    #[test]
    fn unpack_four_bit() {
        let data = [0xF0, 0x5A];
        let s = unpack_samples(&data, 4, 1, 1, 4).unwrap();
        assert_eq!(s, vec![15, 0, 5, 10]);
    }

    #[test]
    fn unpack_sixteen_bit() {
        let data = [0x12, 0x34, 0xFF, 0x00];
        let s = unpack_samples(&data, 2, 1, 1, 16).unwrap();
        assert_eq!(s, vec![0x1234, 0xFF00]);
    }

    #[test]
    fn unpack_rejects_short_buffer() {
        let err = unpack_samples(&[0u8; 5], 2, 1, 3, 8).unwrap_err();
        assert!(err.contains("short sample buffer"), "got: {err}");
    }

    #[test]
    fn huge_dimensions_are_an_error_not_a_panic() {
        let err = samples_to_image(&[0; 16], u32::MAX, u32::MAX, 16, &ColourSpace::Cmyk).unwrap_err();
        assert!(err.contains("image too large"), "got: {err}");
        let err = unpack_samples(&[0; 16], 100_000, 100_000, 3, 8).unwrap_err();
        assert!(err.contains("image too large"), "got: {err}");
    }

    #[test]
    fn unpack_rejects_odd_depth() {
        assert!(unpack_samples(&[0u8; 8], 1, 1, 1, 3).is_err());
    }

    #[test]
    fn gray_one_bit_scales_to_full_range() {
        let img = samples_to_image(&[0b1000_0000], 2, 1, 1, &ColourSpace::Gray).unwrap();
        let gray = img.to_luma8();
        assert_eq!(gray.get_pixel(0, 0).0, [255]);
        assert_eq!(gray.get_pixel(1, 0).0, [0]);
    }

    #[test]
    fn cmyk_image_becomes_rgb() {
        let data = [0, 0, 0, 255, 0, 255, 255, 0];
        let img = samples_to_image(&data, 2, 1, 8, &ColourSpace::Cmyk).unwrap();
        assert!(matches!(img, DynamicImage::ImageRgb8(_)));
        let rgb = img.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 0, 0]);
    }

    #[test]
    fn indexed_rgb_palette() {
        let space = ColourSpace::Indexed {
            base: Box::new(ColourSpace::Rgb),
            hival: 1,
            lookup: vec![10, 20, 30, 200, 210, 220],
        };
        let img = samples_to_image(&[1, 0], 2, 1, 8, &space).unwrap();
        let rgb = img.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [200, 210, 220]);
        assert_eq!(rgb.get_pixel(1, 0).0, [10, 20, 30]);
    }

    #[test]
    fn indexed_out_of_range_clamps_to_hival() {
        let space = ColourSpace::Indexed {
            base: Box::new(ColourSpace::Gray),
            hival: 0,
            lookup: vec![77],
        };
        let img = samples_to_image(&[9], 1, 1, 8, &space).unwrap();
        assert_eq!(img.to_rgb8().get_pixel(0, 0).0, [77, 77, 77]);
    }

    #[test]
    fn component_count_mapping() {
        assert_eq!(ColourSpace::from_component_count(4), Some(ColourSpace::Cmyk));
        assert_eq!(ColourSpace::from_component_count(2), None);
    }
}
