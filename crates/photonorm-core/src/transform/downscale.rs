//! Resolution reduction.
//!
//! Two reduction strategies coexist and are selected per route:
//!
//! - [`DownscaleStrategy::DecodeTimeHalf`]: the JPEG codec already decoded at
//!   half width and half height, so nothing is done here
//! - [`DownscaleStrategy::NearestHalf`]: generic rasters are decoded at full
//!   resolution and halved afterwards by nearest-neighbor sampling
//!
//! They produce visibly different results (IDCT scaling filters, nearest
//! neighbor aliases) and are kept apart on purpose.

use serde::{Deserialize, Serialize};

use crate::decode::{rgb_len, RasterBuffer, RGB_CHANNELS};

/// How a route reduces resolution after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownscaleStrategy {
    /// Keep the decoded resolution.
    #[default]
    None,
    /// Resolution was already halved by the decoder.
    DecodeTimeHalf,
    /// Halve now: dst(x, y) = src(2x, 2y).
    NearestHalf,
}

/// Apply `strategy` to `raster`, consuming it.
pub fn apply_downscale(raster: RasterBuffer, strategy: DownscaleStrategy) -> RasterBuffer {
    match strategy {
        DownscaleStrategy::None | DownscaleStrategy::DecodeTimeHalf => raster,
        DownscaleStrategy::NearestHalf => halve_nearest(raster),
    }
}

/// Dimensions produced by [`halve_nearest`]: floor of half, at least 1.
#[inline]
pub fn halved_dimensions(width: u32, height: u32) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

/// Halve both dimensions by keeping every second pixel of every second row.
///
/// Odd trailing rows and columns are dropped; a 1-pixel dimension stays 1.
pub fn halve_nearest(src: RasterBuffer) -> RasterBuffer {
    if src.is_empty() {
        return src;
    }

    let (dst_width, dst_height) = halved_dimensions(src.width(), src.height());
    let src_width = src.width() as usize;
    let pixels = src.pixels();

    let mut out = Vec::with_capacity(rgb_len(dst_width, dst_height));
    for y in 0..dst_height as usize {
        let row = y * 2 * src_width;
        for x in 0..dst_width as usize {
            let idx = (row + x * 2) * RGB_CHANNELS;
            out.extend_from_slice(&pixels[idx..idx + RGB_CHANNELS]);
        }
    }
    drop(src);

    RasterBuffer::from_exact(dst_width, dst_height, out)
}


// ============================================================================
// Property-Based Tests
// ============================================================================
