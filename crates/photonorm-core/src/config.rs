//! Pipeline policy settings.
//!
//! The defaults reproduce the fixed policy of the normalizer: quality 90 for
//! fidelity-preserving re-compression, 75 for size-sensitive paths, and a
//! 2 MiB ceiling on RAW output. Settings can be loaded from TOML with every
//! field optional.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::RawParams;

/// Quality used when re-compressing JPEG sources at full resolution.
pub const FIDELITY_QUALITY: u8 = 90;

/// Quality used by size-sensitive paths (RAW, compact JPEG).
pub const COMPACT_QUALITY: u8 = 75;

/// Maximum encoded size accepted on the RAW path.
pub const RAW_MAX_OUTPUT_BYTES: usize = 2 * 1024 * 1024;

/// How JPEG sources are re-compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JpegMode {
    /// Full-resolution decode, high quality re-encode.
    #[default]
    Fidelity,
    /// Decode directly at half width and half height, lower quality re-encode.
    Compact,
}

/// Error raised when a configuration document cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid pipeline configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// The pipeline only carries 8-bit RGB; 16-bit RAW output is rejected.
    #[error("Unsupported raw.output_bits {0}: the pipeline encodes 8-bit samples only")]
    OutputBits(u8),
}

/// Settings for a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub jpeg_mode: JpegMode,
    pub fidelity_quality: u8,
    pub compact_quality: u8,
    /// Quality for PNG and other generic raster sources.
    pub raster_quality: u8,
    pub raw_quality: u8,
    pub raw_max_output_bytes: usize,
    pub raw: RawParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            jpeg_mode: JpegMode::Fidelity,
            fidelity_quality: FIDELITY_QUALITY,
            compact_quality: COMPACT_QUALITY,
            raster_quality: FIDELITY_QUALITY,
            raw_quality: COMPACT_QUALITY,
            raw_max_output_bytes: RAW_MAX_OUTPUT_BYTES,
            raw: RawParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from TOML text. Missing fields keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.raw.output_bits != 8 {
            return Err(ConfigError::OutputBits(self.raw.output_bits));
        }
        Ok(())
    }

    /// Quality applied to JPEG sources for the configured mode.
    pub fn jpeg_quality(&self) -> u8 {
        match self.jpeg_mode {
            JpegMode::Fidelity => self.fidelity_quality,
            JpegMode::Compact => self.compact_quality,
        }
    }
}
