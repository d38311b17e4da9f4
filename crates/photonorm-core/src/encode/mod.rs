//! Encoding and output validation.
//!
//! This module provides functionality for:
//! - Re-encoding the normalized raster to JPEG at a route-dependent quality
//! - Validating the encoded stream and enforcing an output size ceiling
//!
//! # Examples
//!
//! ```ignore
//! use photonorm_core::backend::StandardJpegCodec;
//! use photonorm_core::decode::RasterBuffer;
//! use photonorm_core::encode::{encode_raster, validate_output};
//!
//! let raster = RasterBuffer::filled(100, 100, [128, 128, 128]);
//! let jpeg = encode_raster(&StandardJpegCodec, raster, 90).unwrap();
//! validate_output(&jpeg, Some(2 * 1024 * 1024)).unwrap();
//! ```

mod jpeg;
mod validate;

pub use jpeg::encode_raster;
pub use validate::validate_output;
