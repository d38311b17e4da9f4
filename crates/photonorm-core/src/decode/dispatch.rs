//! Route selection and per-route decoding.

use std::time::Instant;

use tracing::debug;

use super::RasterBuffer;
use crate::backend::{
    DecodeScale, JpegCodec, JpegHeader, RasterDecoder, RawCapture, RawDecoder, RawParams,
};
use crate::error::{guarded, ErrorKind, PipelineError, Result};
use crate::pipeline::Stage;

/// Hint appended to RAW unpack failures of DNG files.
const DNG_HINT: &str =
    "DNG files written by mobile devices often use non-standard variants the decoder cannot unpack";

/// Which decoder handles an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeRoute {
    /// JPEG codec at the given resolution.
    Jpeg(DecodeScale),
    /// Generic raster decoder.
    Raster,
    /// RAW decoder with its processing parameters.
    Raw {
        params: RawParams,
        /// Input is known to be a DNG file (only affects error messages).
        dng: bool,
    },
}

/// Source-specific facts learned while decoding.
#[derive(Debug, Clone)]
pub enum DecodeSource {
    Jpeg(JpegHeader),
    Raster {
        /// Channel count before conversion to RGB.
        channels: u8,
    },
    /// Capture metadata from the RAW decoder, if it exposed any.
    Raw(Option<RawCapture>),
}

/// Output of the dispatcher: the live raster plus the source geometry.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub raster: RasterBuffer,
    /// Width of the source before any reduction (sensor size for RAW).
    pub source_width: u32,
    pub source_height: u32,
    pub source: DecodeSource,
}

/// Decode `bytes` along `route`.
///
/// # Arguments
///
/// * `jpeg` - JPEG codec, used by the JPEG route
/// * `raster` - Generic raster decoder, used by the raster route
/// * `raw` - RAW decoder, used by the RAW route
/// * `bytes` - Encoded input
/// * `route` - Decoder to use
pub fn decode(
    jpeg: &dyn JpegCodec,
    raster: &dyn RasterDecoder,
    raw: &dyn RawDecoder,
    bytes: &[u8],
    route: DecodeRoute,
) -> Result<Decoded> {
    let start = Instant::now();
    let decoded = match route {
        DecodeRoute::Jpeg(scale) => decode_jpeg(jpeg, bytes, scale),
        DecodeRoute::Raster => decode_raster(raster, bytes),
        DecodeRoute::Raw { params, dng } => decode_raw(raw, bytes, &params, dng),
    }?;

    debug!(
        "Decoded {:?} to {}x{} in {:?}",
        route,
        decoded.raster.width(),
        decoded.raster.height(),
        start.elapsed()
    );
    Ok(decoded)
}

/// Decode a JPEG through the codec, at full or half resolution.
pub fn decode_jpeg(codec: &dyn JpegCodec, bytes: &[u8], scale: DecodeScale) -> Result<Decoded> {
    let header = guarded(Stage::Sniffed, ErrorKind::DecodeFailure, "JPEG header", || {
        codec.decompress_header(bytes)
    })?;

    if header.width == 0 || header.height == 0 {
        return Err(PipelineError::new(
            Stage::Sniffed,
            ErrorKind::DecodeFailure,
            format!("JPEG header declares an empty image ({}x{})", header.width, header.height),
        ));
    }

    let raster = guarded(Stage::Sniffed, ErrorKind::DecodeFailure, "JPEG decompress", || {
        codec.decompress(bytes, scale)
    })?;

    if scale == DecodeScale::Full && raster.dimensions() != (header.width, header.height) {
        return Err(PipelineError::new(
            Stage::Sniffed,
            ErrorKind::DecodeFailure,
            format!(
                "JPEG decompressed to {}x{}, header declares {}x{}",
                raster.width(),
                raster.height(),
                header.width,
                header.height
            ),
        ));
    }
    if raster.is_empty() {
        return Err(PipelineError::new(
            Stage::Sniffed,
            ErrorKind::DecodeFailure,
            "JPEG decompressed to an empty image",
        ));
    }

    Ok(Decoded {
        raster,
        source_width: header.width,
        source_height: header.height,
        source: DecodeSource::Jpeg(header),
    })
}

/// Decode any other raster format, forced to RGB.
pub fn decode_raster(decoder: &dyn RasterDecoder, bytes: &[u8]) -> Result<Decoded> {
    let decoded = guarded(Stage::Sniffed, ErrorKind::DecodeFailure, "raster decode", || {
        decoder.decode(bytes)
    })?;

    if decoded.raster.is_empty() {
        return Err(PipelineError::new(
            Stage::Sniffed,
            ErrorKind::DecodeFailure,
            "raster decoder produced an empty image",
        ));
    }

    let (width, height) = decoded.raster.dimensions();
    Ok(Decoded {
        raster: decoded.raster,
        source_width: width,
        source_height: height,
        source: DecodeSource::Raster {
            channels: decoded.source_channels,
        },
    })
}

/// Drive the RAW decoder through all of its steps.
///
/// The session is dropped before returning, whichever step failed.
pub fn decode_raw(
    decoder: &dyn RawDecoder,
    bytes: &[u8],
    params: &RawParams,
    dng: bool,
) -> Result<Decoded> {
    let stage = Stage::Sniffed;
    let mut session = guarded(stage, ErrorKind::OpenFailure, "RAW open", || {
        decoder.open(bytes, params)
    })?;

    let unpacked = guarded(stage, ErrorKind::UnpackFailure, "RAW unpack", || {
        session.unpack()
    });
    if let Err(mut err) = unpacked {
        if dng && err.kind == ErrorKind::UnpackFailure {
            err.message = format!("{} ({})", err.message, DNG_HINT);
        }
        return Err(err);
    }

    guarded(stage, ErrorKind::UnpackFailure, "RAW process", || {
        session.process()
    })?;

    let capture = session.capture();
    let image = guarded(stage, ErrorKind::DecodeFailure, "RAW materialize", || {
        session.materialize()
    })?;
    drop(session);

    if image.colors != 3 || image.bits != 8 {
        return Err(PipelineError::new(
            stage,
            ErrorKind::UnsupportedFormat,
            format!(
                "RAW decoder produced {} channels at {} bits; expected 3 channels at 8 bits",
                image.colors, image.bits
            ),
        ));
    }

    let (width, height) = (image.width, image.height);
    let raster = RasterBuffer::from_raw(width, height, image.data).ok_or_else(|| {
        PipelineError::new(
            stage,
            ErrorKind::DecodeFailure,
            format!("RAW image data does not match {}x{} RGB", width, height),
        )
    })?;
    if raster.is_empty() {
        return Err(PipelineError::new(
            stage,
            ErrorKind::DecodeFailure,
            "RAW decoder produced an empty image",
        ));
    }

    let (source_width, source_height) = capture
        .as_ref()
        .filter(|c| c.raw_width > 0 && c.raw_height > 0)
        .map(|c| (c.raw_width, c.raw_height))
        .unwrap_or((width, height));

    Ok(Decoded {
        raster,
        source_width,
        source_height,
        source: DecodeSource::Raw(capture),
    })
}
