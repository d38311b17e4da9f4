//! Geometric normalization: orientation correction and resolution reduction.
//!
//! # Transform Order
//!
//! 1. Orientation (JPEG sources only, codes 3, 6 and 8)
//! 2. Downscale (strategy chosen by route)
//!
//! Each step consumes its input raster and returns a new one, so the caller
//! always holds exactly one live buffer.

mod downscale;
mod orientation;

pub use downscale::{apply_downscale, halve_nearest, halved_dimensions, DownscaleStrategy};
pub use orientation::{apply_orientation, rotate_180, rotate_90_ccw, rotate_90_cw};

use crate::decode::{Orientation, RasterBuffer};

/// Run both geometric steps in order.
///
/// # Arguments
///
/// * `raster` - Decoded raster, consumed
/// * `orientation` - Orientation to correct; pass [`Orientation::Normal`] for
///   routes that do not honor EXIF orientation
/// * `strategy` - Reduction strategy of the route
pub fn normalize_geometry(
    raster: RasterBuffer,
    orientation: Orientation,
    strategy: DownscaleStrategy,
) -> RasterBuffer {
    let upright = apply_orientation(raster, orientation);
    apply_downscale(upright, strategy)
}
