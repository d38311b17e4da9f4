//! Photonorm Core - Image normalization library
//!
//! This crate turns JPEG, PNG, other raster formats and camera RAW files into
//! a canonical JPEG plus a unified metadata record, including RAW decoding,
//! EXIF reconciliation, orientation correction, and downscaling.

pub mod backend;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod sniff;
pub mod transform;

use std::path::Path;

pub use config::{ConfigError, JpegMode, PipelineConfig};
pub use error::{ErrorKind, PipelineError, Result, STATUS_SUCCESS};
pub use metadata::MetadataRecord;
pub use pipeline::{InputKind, NormalizedImage, Pipeline, Stage};
pub use sniff::{
    can_process_file, file_info, file_type, is_image_file, is_raw_file, is_supported_file,
    sniff_format, FileType, SourceFormat,
};

/// Normalize `input` into a JPEG at `output` with the default pipeline.
pub fn normalize_image(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<MetadataRecord> {
    Pipeline::default().normalize_file(input, output)
}
