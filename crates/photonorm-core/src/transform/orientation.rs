//! EXIF orientation correction.
//!
//! Only the three pure rotations are acted upon: code 3 (180°), code 6
//! (90° clockwise) and code 8 (90° counter-clockwise). Mirrored codes and
//! anything unrecognized leave the raster untouched.
//!
//! Every rotation remaps into a freshly allocated buffer and consumes the
//! input, so exactly one buffer is live afterwards.

use crate::decode::{rgb_len, Orientation, RasterBuffer, RGB_CHANNELS};

/// Rotate `raster` upright according to `orientation`.
///
/// # Arguments
///
/// * `raster` - Decoded raster, consumed
/// * `orientation` - Orientation recorded for the source
///
/// # Returns
///
/// The corrected raster; the input itself for orientations that are not
/// acted upon.
pub fn apply_orientation(raster: RasterBuffer, orientation: Orientation) -> RasterBuffer {
    match orientation {
        Orientation::Rotate180 => rotate_180(raster),
        Orientation::Rotate90CW => rotate_90_cw(raster),
        Orientation::Rotate270CW => rotate_90_ccw(raster),
        _ => raster,
    }
}

/// Rebuild a raster by pulling each destination pixel from `source_index`.
fn remap<F>(src: RasterBuffer, dst_width: u32, dst_height: u32, source_index: F) -> RasterBuffer
where
    F: Fn(usize, usize) -> usize,
{
    let pixels = src.pixels();
    let mut out = Vec::with_capacity(rgb_len(dst_width, dst_height));
    for y in 0..dst_height as usize {
        for x in 0..dst_width as usize {
            let idx = source_index(x, y) * RGB_CHANNELS;
            out.extend_from_slice(&pixels[idx..idx + RGB_CHANNELS]);
        }
    }
    drop(src);

    RasterBuffer::from_exact(dst_width, dst_height, out)
}

/// Rotate 180°: dst(x, y) = src(w-1-x, h-1-y).
pub fn rotate_180(src: RasterBuffer) -> RasterBuffer {
    let (w, h) = (src.width() as usize, src.height() as usize);
    let (width, height) = src.dimensions();
    remap(src, width, height, |x, y| (h - 1 - y) * w + (w - 1 - x))
}

/// Rotate 90° clockwise: dst is h×w, dst(x, y) = src(y, h-1-x).
pub fn rotate_90_cw(src: RasterBuffer) -> RasterBuffer {
    let (w, h) = (src.width() as usize, src.height() as usize);
    let (width, height) = src.dimensions();
    remap(src, height, width, |x, y| (h - 1 - x) * w + y)
}

/// Rotate 90° counter-clockwise: dst is h×w, dst(x, y) = src(w-1-y, x).
pub fn rotate_90_ccw(src: RasterBuffer) -> RasterBuffer {
    let w = src.width() as usize;
    let (width, height) = src.dimensions();
    remap(src, height, width, |x, y| x * w + (w - 1 - y))
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy for generating a raster with random content.
    fn raster_strategy() -> impl Strategy<Value = RasterBuffer> {
        (1u32..=24, 1u32..=24).prop_flat_map(|(w, h)| {
            let size = rgb_len(w, h);
            prop::collection::vec(any::<u8>(), size..=size)
                .prop_map(move |pixels| RasterBuffer::from_raw(w, h, pixels).unwrap())
        })
    }

    proptest! {
        /// Property: Four clockwise quarter turns restore the original.
        #[test]
        fn prop_four_quarter_turns_are_identity(raster in raster_strategy()) {
            let mut out = raster.clone();
            for _ in 0..4 {
                out = apply_orientation(out, Orientation::Rotate90CW);
            }
            prop_assert_eq!(out, raster);
        }

        /// Property: Quarter turns swap dimensions, half turns keep them.
        #[test]
        fn prop_rotation_dimensions(raster in raster_strategy()) {
            let (w, h) = raster.dimensions();
            prop_assert_eq!(apply_orientation(raster.clone(), Orientation::Rotate90CW).dimensions(), (h, w));
            prop_assert_eq!(apply_orientation(raster.clone(), Orientation::Rotate270CW).dimensions(), (h, w));
            prop_assert_eq!(apply_orientation(raster, Orientation::Rotate180).dimensions(), (w, h));
        }

        /// Property: Two half turns restore the original.
        #[test]
        fn prop_double_180_is_identity(raster in raster_strategy()) {
            let out = rotate_180(rotate_180(raster.clone()));
            prop_assert_eq!(out, raster);
        }

        /// Property: Output buffer length always matches its dimensions.
        #[test]
        fn prop_buffer_matches_dimensions(raster in raster_strategy(), code in 0u32..10) {
            let out = apply_orientation(raster, Orientation::from(code));
            prop_assert_eq!(out.byte_size(), rgb_len(out.width(), out.height()));
        }
    }
}
