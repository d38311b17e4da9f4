//! Decode dispatch.
//!
//! Routes input bytes to one of three decoders and normalizes whatever they
//! produce into a single owned [`RasterBuffer`] plus the source geometry:
//!
//! - **JPEG**: header via the JPEG codec, then decompression at full or half
//!   resolution (the half variant is reduced inside the codec, not resampled)
//! - **Generic raster**: the raster decoder, forced to RGB
//! - **RAW**: the RAW decoder driven through open, unpack, process and
//!   materialize; each step fails with its own error kind
//!
//! # Examples
//!
//! ```ignore
//! use photonorm_core::backend::{DecodeScale, StandardJpegCodec};
//! use photonorm_core::decode::decode_jpeg;
//!
//! let bytes = std::fs::read("photo.jpg").unwrap();
//! let decoded = decode_jpeg(&StandardJpegCodec, &bytes, DecodeScale::Full).unwrap();
//! println!("Decoded {}x{}", decoded.raster.width(), decoded.raster.height());
//! ```

mod dispatch;
mod types;

pub use dispatch::{
    decode, decode_jpeg, decode_raster, decode_raw, DecodeRoute, DecodeSource, Decoded,
};
pub use types::{rgb_len, Orientation, RasterBuffer, RGB_CHANNELS};
