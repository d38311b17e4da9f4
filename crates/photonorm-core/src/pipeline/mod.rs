//! Pipeline orchestration.
//!
//! One run takes an image through a fixed sequence of states:
//!
//! `Start -> Sniffed -> Decoded -> MetadataExtracted -> GeometryNormalized
//! -> Encoded -> Validated -> Done`
//!
//! Any step can fail; the run then stops with a [`PipelineError`] naming the
//! last state reached. Nothing is retried. The live raster is moved from
//! stage to stage, so it is released exactly once on every path, and each
//! run reports its own result (there is no shared error state), which makes
//! one [`Pipeline`] safe to use from several threads at once.

mod files;
#[cfg(test)]
pub(crate) mod mock;

use std::fmt;
use std::time::Instant;

use tracing::{debug, info, info_span, warn};

use crate::backend::{
    raster_format_label, DecodeScale, ExifParser, ImageRasterDecoder, JpegCodec,
    KamadakExifParser, RasterDecoder, RawDecoder, RawloaderDecoder, StandardJpegCodec,
};
use crate::config::{JpegMode, PipelineConfig};
use crate::decode::{decode, DecodeRoute, DecodeSource, Orientation};
use crate::encode::{encode_raster, validate_output};
use crate::error::{ErrorKind, PipelineError, Result};
use crate::metadata::{extract_exif, MetadataRecord, Reconciler, SourceKind};
use crate::sniff::{sniff_format, SourceFormat};
use crate::transform::{normalize_geometry, DownscaleStrategy};

/// States of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Start,
    Sniffed,
    Decoded,
    MetadataExtracted,
    GeometryNormalized,
    Encoded,
    Validated,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How the caller wants an input interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputKind {
    /// Sniff the leading bytes (JPEG, PNG, or other raster).
    #[default]
    Auto,
    /// Camera RAW; never inferred from the bytes.
    Raw,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    /// The canonical JPEG.
    pub jpeg: Vec<u8>,
    pub metadata: MetadataRecord,
}

/// Everything a run needs to know about its route, decided up front.
#[derive(Debug, Clone, Copy)]
struct RoutePlan {
    route: DecodeRoute,
    source: SourceKind,
    downscale: DownscaleStrategy,
    quality: u8,
    max_output_bytes: Option<usize>,
}

/// The normalizer: four backend services plus a policy.
///
/// # Example
///
/// ```ignore
/// use photonorm_core::Pipeline;
///
/// let pipeline = Pipeline::default();
/// let image = pipeline.normalize_bytes(&std::fs::read("photo.png")?)?;
/// println!("{} ({})", image.metadata.camera_model, image.metadata.formatted_dimensions());
/// ```
pub struct Pipeline {
    jpeg: Box<dyn JpegCodec>,
    raster: Box<dyn RasterDecoder>,
    raw: Box<dyn RawDecoder>,
    exif: Box<dyn ExifParser>,
    config: PipelineConfig,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Pipeline with the default backends and the given policy.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_backends(
            Box::new(StandardJpegCodec),
            Box::new(ImageRasterDecoder),
            Box::new(RawloaderDecoder),
            Box::new(KamadakExifParser),
            config,
        )
    }

    /// Pipeline with caller-supplied backends.
    pub fn with_backends(
        jpeg: Box<dyn JpegCodec>,
        raster: Box<dyn RasterDecoder>,
        raw: Box<dyn RawDecoder>,
        exif: Box<dyn ExifParser>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            jpeg,
            raster,
            raw,
            exif,
            config,
        }
    }

    pub fn with_jpeg_codec(mut self, jpeg: Box<dyn JpegCodec>) -> Self {
        self.jpeg = jpeg;
        self
    }

    pub fn with_raster_decoder(mut self, raster: Box<dyn RasterDecoder>) -> Self {
        self.raster = raster;
        self
    }

    pub fn with_raw_decoder(mut self, raw: Box<dyn RawDecoder>) -> Self {
        self.raw = raw;
        self
    }

    pub fn with_exif_parser(mut self, exif: Box<dyn ExifParser>) -> Self {
        self.exif = exif;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Normalize an in-memory JPEG, PNG or other raster (sniffed).
    pub fn normalize_bytes(&self, bytes: &[u8]) -> Result<NormalizedImage> {
        self.run(bytes, InputKind::Auto, false)
    }

    /// Normalize an in-memory camera RAW file.
    pub fn normalize_raw_bytes(&self, bytes: &[u8]) -> Result<NormalizedImage> {
        self.run(bytes, InputKind::Raw, false)
    }

    /// Normalize into a caller-owned buffer.
    ///
    /// `out` is cleared first and stays empty if the run fails.
    pub fn normalize_into(
        &self,
        bytes: &[u8],
        kind: InputKind,
        out: &mut Vec<u8>,
    ) -> Result<MetadataRecord> {
        out.clear();
        let image = self.run(bytes, kind, false)?;
        out.extend_from_slice(&image.jpeg);
        Ok(image.metadata)
    }

    fn plan(&self, bytes: &[u8], kind: InputKind, dng: bool) -> RoutePlan {
        let config = &self.config;
        if kind == InputKind::Raw {
            return RoutePlan {
                route: DecodeRoute::Raw {
                    params: config.raw,
                    dng,
                },
                source: SourceKind::Raw,
                // Size reduction happens inside the RAW decoder (half size)
                downscale: DownscaleStrategy::None,
                quality: config.raw_quality,
                max_output_bytes: Some(config.raw_max_output_bytes),
            };
        }

        match sniff_format(bytes) {
            SourceFormat::Jpeg => {
                let (scale, downscale) = match config.jpeg_mode {
                    JpegMode::Fidelity => (DecodeScale::Full, DownscaleStrategy::None),
                    JpegMode::Compact => (DecodeScale::Half, DownscaleStrategy::DecodeTimeHalf),
                };
                RoutePlan {
                    route: DecodeRoute::Jpeg(scale),
                    source: SourceKind::Jpeg,
                    downscale,
                    quality: config.jpeg_quality(),
                    max_output_bytes: None,
                }
            }
            format => RoutePlan {
                route: DecodeRoute::Raster,
                source: if format == SourceFormat::Png {
                    SourceKind::Png
                } else {
                    SourceKind::Raster(raster_format_label(bytes))
                },
                downscale: DownscaleStrategy::NearestHalf,
                quality: config.raster_quality,
                max_output_bytes: None,
            },
        }
    }

    /// Run one image through every stage.
    fn run(&self, bytes: &[u8], kind: InputKind, dng: bool) -> Result<NormalizedImage> {
        let span = info_span!("normalize", bytes = bytes.len(), kind = ?kind);
        let _enter = span.enter();
        let start = Instant::now();

        let result = self.run_stages(bytes, kind, dng);
        match &result {
            Ok(image) => info!(
                "Normalized to {}x{} JPEG ({} bytes) in {:?}",
                image.metadata.output_width,
                image.metadata.output_height,
                image.jpeg.len(),
                start.elapsed()
            ),
            Err(err) => warn!(
                stage = %err.stage,
                code = err.status_code(),
                "Normalization failed: {}",
                err
            ),
        }
        result
    }

    fn run_stages(&self, bytes: &[u8], kind: InputKind, dng: bool) -> Result<NormalizedImage> {
        if bytes.is_empty() {
            return Err(PipelineError::new(
                Stage::Start,
                ErrorKind::OpenFailure,
                "input is empty",
            ));
        }

        let plan = self.plan(bytes, kind, dng);
        debug!("Route {:?}, quality {}", plan.route, plan.quality);
        let mut reconciler = Reconciler::new(plan.source);

        // Sniffed -> Decoded
        let decoded = decode(
            self.jpeg.as_ref(),
            self.raster.as_ref(),
            self.raw.as_ref(),
            bytes,
            plan.route,
        )?;
        reconciler.set_source_geometry(decoded.source_width, decoded.source_height);

        // Decoded -> MetadataExtracted
        let mut orientation = Orientation::Normal;
        match &decoded.source {
            DecodeSource::Jpeg(_) => {
                if let Some(fields) = extract_exif(self.exif.as_ref(), bytes, Stage::Decoded)? {
                    orientation = fields.orientation.map(Orientation::from).unwrap_or_default();
                    reconciler.merge_exif(&fields);
                }
            }
            DecodeSource::Raw(Some(capture)) => reconciler.merge_capture(capture),
            DecodeSource::Raw(None) | DecodeSource::Raster { .. } => {}
        }
        debug!("Metadata extracted, orientation {:?}", orientation);

        // MetadataExtracted -> GeometryNormalized
        let raster = normalize_geometry(decoded.raster, orientation, plan.downscale);
        let (output_width, output_height) = raster.dimensions();
        debug!("Geometry normalized to {}x{}", output_width, output_height);

        // GeometryNormalized -> Encoded -> Validated
        let jpeg = encode_raster(self.jpeg.as_ref(), raster, plan.quality)?;
        validate_output(&jpeg, plan.max_output_bytes)?;

        // Second metadata pass over what a reader of the output will see.
        // Output EXIF wins outright; the source record is only the fallback.
        if plan.source == SourceKind::Jpeg {
            if let Some(fields) = extract_exif(self.exif.as_ref(), &jpeg, Stage::Validated)? {
                reconciler.replace_exif(&fields);
            }
        }

        let metadata = reconciler.finalize(output_width, output_height);
        Ok(NormalizedImage { jpeg, metadata })
    }
}
