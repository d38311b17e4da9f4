//! JPEG re-encoding of the normalized raster.

use tracing::debug;

use crate::backend::JpegCodec;
use crate::decode::RasterBuffer;
use crate::error::{guarded, ErrorKind, PipelineError, Result};
use crate::pipeline::Stage;

/// Encode the live raster to JPEG, consuming it.
///
/// The codec always writes 4:4:4 sampling. The raster is released as soon
/// as the codec returns, whether or not encoding succeeded.
///
/// # Arguments
///
/// * `codec` - JPEG codec service
/// * `raster` - Normalized raster, consumed
/// * `quality` - JPEG quality (1-100), clamped by the codec
///
/// # Quality Guidelines
///
/// * 90: fidelity-preserving re-compression (JPEG and generic raster sources)
/// * 75: size-sensitive paths (RAW, compact JPEG)
pub fn encode_raster(codec: &dyn JpegCodec, raster: RasterBuffer, quality: u8) -> Result<Vec<u8>> {
    if raster.is_empty() {
        return Err(PipelineError::new(
            Stage::GeometryNormalized,
            ErrorKind::EncodeFailure,
            format!(
                "Invalid dimensions: width ({}) and height ({}) must be non-zero",
                raster.width(),
                raster.height()
            ),
        ));
    }

    let encoded = guarded(
        Stage::GeometryNormalized,
        ErrorKind::EncodeFailure,
        "JPEG compress",
        || codec.compress(&raster, quality),
    );
    let (width, height) = raster.dimensions();
    drop(raster);

    let bytes = encoded?;
    debug!(
        "Encoded {}x{} at quality {} into {} bytes",
        width,
        height,
        quality,
        bytes.len()
    );
    Ok(bytes)
}


// ============================================================================
// Property-Based Tests
// ============================================================================
