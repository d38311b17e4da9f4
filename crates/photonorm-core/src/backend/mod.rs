//! External codec services.
//!
//! The pipeline talks to four opaque services through narrow traits:
//!
//! - [`JpegCodec`] - JPEG header parsing, decompression and compression
//! - [`RasterDecoder`] - any other raster format, forced to RGB
//! - [`RawDecoder`] - camera RAW, driven as open / unpack / process / materialize
//! - [`ExifParser`] - EXIF extraction from a JPEG or TIFF container
//!
//! Every service reports failure as [`BackendError`]; the orchestrator maps
//! those (and panics) onto the pipeline's error taxonomy. Default
//! implementations built on `jpeg-decoder`, `image`, `rawloader` and
//! `kamadak-exif` are provided and used by [`Pipeline::default`].
//!
//! [`Pipeline::default`]: crate::Pipeline

pub(crate) mod exif;
mod jpeg;
mod raster;
mod raw;

use serde::{Deserialize, Serialize};

use crate::decode::RasterBuffer;
use crate::error::BackendResult;

pub use exif::KamadakExifParser;
pub use jpeg::{read_sampling_factors, StandardJpegCodec};
pub use raster::{raster_format_label, ImageRasterDecoder};
pub use raw::RawloaderDecoder;

/// JPEG chroma subsampling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChromaSubsampling {
    /// No chroma downsampling.
    Chroma444,
    Chroma422,
    Chroma420,
    Chroma440,
    Chroma411,
    Gray,
    Unknown,
}

/// Color space of a JPEG stream as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JpegColorSpace {
    Gray,
    YCbCr,
    Cmyk,
}

/// Information read from a JPEG header without decoding pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegHeader {
    pub width: u32,
    pub height: u32,
    pub subsampling: ChromaSubsampling,
    pub color_space: JpegColorSpace,
}

/// Resolution at which a JPEG is decompressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeScale {
    #[default]
    Full,
    /// Half width and half height, produced by the codec during decode.
    Half,
}

/// JPEG codec service.
pub trait JpegCodec: Send + Sync {
    /// Read dimensions, subsampling and color space.
    fn decompress_header(&self, bytes: &[u8]) -> BackendResult<JpegHeader>;

    /// Decompress to RGB at the requested scale.
    fn decompress(&self, bytes: &[u8], scale: DecodeScale) -> BackendResult<RasterBuffer>;

    /// Compress an RGB raster with 4:4:4 sampling at `quality` (1-100).
    fn compress(&self, raster: &RasterBuffer, quality: u8) -> BackendResult<Vec<u8>>;
}

/// Output of the generic raster decoder.
#[derive(Debug, Clone)]
pub struct DecodedRaster {
    /// Pixels forced to 3-channel RGB.
    pub raster: RasterBuffer,
    /// Channel count of the source before conversion.
    pub source_channels: u8,
}

/// Generic raster decoder service (PNG, TIFF, BMP, WebP, GIF, ...).
pub trait RasterDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> BackendResult<DecodedRaster>;
}

/// White balance applied by the RAW decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhiteBalance {
    /// Multipliers recorded by the camera.
    #[default]
    Camera,
    /// Gray-world estimate from the image itself.
    Auto,
    /// Raw sensor response.
    None,
}

/// Output color space of the RAW decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputColorSpace {
    /// Camera native primaries, linear.
    Raw,
    #[default]
    Srgb,
}

/// Processing parameters handed to the RAW decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawParams {
    /// Bits per output sample (8 or 16). The pipeline itself only accepts
    /// 8; 16-bit output is for callers driving a [`RawDecoder`] directly.
    pub output_bits: u8,
    pub color_space: OutputColorSpace,
    pub white_balance: WhiteBalance,
    pub use_camera_matrix: bool,
    pub auto_brightness: bool,
    /// Emit one pixel per 2x2 sensor cell (a quarter of the pixel count).
    pub half_size: bool,
}

impl Default for RawParams {
    fn default() -> Self {
        Self {
            output_bits: 8,
            color_space: OutputColorSpace::Srgb,
            white_balance: WhiteBalance::Camera,
            use_camera_matrix: true,
            auto_brightness: false,
            half_size: true,
        }
    }
}

/// Capture metadata exposed by the RAW decoder once processing succeeded.
///
/// All text is owned, so the capture outlives the decoder session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCapture {
    pub make: String,
    pub model: String,
    pub software: Option<String>,
    pub date_taken: Option<String>,
    pub lens: Option<String>,
    pub description: Option<String>,
    pub artist: Option<String>,
    pub iso_speed: u32,
    /// Exposure time in seconds.
    pub shutter: f64,
    pub aperture: f64,
    pub focal_length: f64,
    pub max_aperture: f64,
    pub focal_length_35mm: u32,
    /// Sensor dimensions before any reduction.
    pub raw_width: u32,
    pub raw_height: u32,
    /// Color filter pattern id, 0 when not applicable.
    pub color_filter: u32,
    pub cam_mul: [f64; 4],
}

/// Image materialized by the RAW decoder.
///
/// `data` holds `width * height * colors` samples of `bits` each, big-endian
/// for 16-bit output.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub width: u32,
    pub height: u32,
    pub colors: u16,
    pub bits: u16,
    pub data: Vec<u8>,
}

/// RAW decoder service.
pub trait RawDecoder: Send + Sync {
    /// Open a RAW container. The session borrows the input bytes.
    fn open<'a>(
        &self,
        bytes: &'a [u8],
        params: &RawParams,
    ) -> BackendResult<Box<dyn RawSession + 'a>>;
}

/// One RAW decode, driven step by step. Dropping the session releases it.
pub trait RawSession {
    /// Decode sensor data.
    fn unpack(&mut self) -> BackendResult<()>;

    /// Demosaic and color-process the unpacked data.
    fn process(&mut self) -> BackendResult<()>;

    /// Capture metadata; `None` until [`process`](Self::process) succeeded.
    fn capture(&self) -> Option<RawCapture>;

    /// Hand over the processed image.
    fn materialize(&mut self) -> BackendResult<ProcessedImage>;
}

/// Fields the EXIF parser exposes on success.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifFields {
    pub make: Option<String>,
    pub model: Option<String>,
    pub software: Option<String>,
    pub date_taken: Option<String>,
    pub lens: Option<String>,
    pub description: Option<String>,
    pub artist: Option<String>,
    pub iso: Option<u32>,
    /// Exposure time in seconds.
    pub exposure_time: Option<f64>,
    pub f_number: Option<f64>,
    pub focal_length: Option<f64>,
    pub focal_length_35mm: Option<u32>,
    /// Maximum aperture as an f-number.
    pub max_aperture: Option<f64>,
    pub orientation: Option<u32>,
}

/// EXIF parser service.
pub trait ExifParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> BackendResult<ExifFields>;
}
