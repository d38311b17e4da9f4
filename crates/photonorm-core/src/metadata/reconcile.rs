//! Metadata reconciliation.
//!
//! A record is seeded with synthetic labels before any extraction, then
//! filled from at most one metadata source per route:
//!
//! - **JPEG**: EXIF of the input, replaced wholesale by EXIF of the
//!   re-encoded output when the output carries any
//! - **RAW**: the RAW decoder's capture side channel
//! - **Generic raster**: nothing; the synthetic label stands
//!
//! Finalization always runs last and overwrites geometry and color fields
//! from the buffer that was actually encoded.

use tracing::debug;

use super::record::{fixed_text, MetadataRecord, CONVERSION_SUFFIX, JPEG_IMAGE_LABEL, UNKNOWN};
use crate::backend::{ExifFields, ExifParser, RawCapture};
use crate::error::{guarded, ErrorKind, Result};
use crate::pipeline::Stage;

/// Origin of the image, which decides labels and finalization rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Jpeg,
    Png,
    /// Generic raster, with its container name when it could be identified.
    Raster(Option<&'static str>),
    Raw,
}

impl SourceKind {
    /// Camera model placeholder used until (or unless) metadata is found.
    pub fn model_label(self) -> String {
        match self {
            SourceKind::Jpeg => JPEG_IMAGE_LABEL.to_string(),
            SourceKind::Png => format!("PNG{}", CONVERSION_SUFFIX),
            SourceKind::Raster(name) => {
                format!("{}{}", name.unwrap_or("Image"), CONVERSION_SUFFIX)
            }
            SourceKind::Raw => UNKNOWN.to_string(),
        }
    }
}

/// Builds one [`MetadataRecord`] over the course of a pipeline run.
#[derive(Debug, Clone)]
pub struct Reconciler {
    kind: SourceKind,
    record: MetadataRecord,
    source_geometry_set: bool,
}

impl Reconciler {
    /// Start a record with the synthetic labels for `kind`.
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            record: MetadataRecord::with_labels(UNKNOWN, &kind.model_label()),
            source_geometry_set: false,
        }
    }

    /// Record the geometry of the first decode. Later calls are ignored.
    pub fn set_source_geometry(&mut self, width: u32, height: u32) {
        if self.source_geometry_set {
            return;
        }
        self.record.raw_width = width;
        self.record.raw_height = height;
        self.source_geometry_set = true;
    }

    /// Lay EXIF fields over the record; absent fields leave it unchanged.
    pub fn merge_exif(&mut self, fields: &ExifFields) {
        let record = &mut self.record;

        if let Some(make) = non_empty(fields.make.as_deref()) {
            record.camera_make = fixed_text(make);
        }
        if let Some(model) = non_empty(fields.model.as_deref()) {
            record.camera_model = fixed_text(model);
        }

        overlay(&mut record.software, &fields.software);
        overlay(&mut record.date_taken, &fields.date_taken);
        overlay(&mut record.lens, &fields.lens);
        overlay(&mut record.description, &fields.description);
        overlay(&mut record.artist, &fields.artist);

        if let Some(iso) = fields.iso {
            record.iso_speed = iso;
        }
        if let Some(value) = positive(fields.exposure_time) {
            record.shutter = value;
        }
        if let Some(value) = positive(fields.f_number) {
            record.aperture = value;
        }
        if let Some(value) = positive(fields.focal_length) {
            record.focal_length = value;
        }
        if let Some(value) = positive(fields.max_aperture) {
            record.max_aperture = value;
        }
        if let Some(value) = fields.focal_length_35mm {
            record.focal_length_35mm = value;
        }
    }

    /// Rebuild the camera and capture fields from `fields` alone.
    ///
    /// Used for the EXIF of the delivered JPEG: a reader of the output sees
    /// only what it embeds, so nothing from the source survives. Source
    /// geometry is kept.
    pub fn replace_exif(&mut self, fields: &ExifFields) {
        let labels = MetadataRecord::with_labels(UNKNOWN, &self.kind.model_label());
        self.record = MetadataRecord {
            raw_width: self.record.raw_width,
            raw_height: self.record.raw_height,
            ..labels
        };
        self.merge_exif(fields);
    }

    /// Copy the RAW decoder's capture metadata into the record.
    ///
    /// Everything is copied into owned fields, so the record does not depend
    /// on the decoder session that produced `capture`.
    pub fn merge_capture(&mut self, capture: &RawCapture) {
        let record = &mut self.record;

        if let Some(make) = non_empty(Some(&capture.make)) {
            record.camera_make = fixed_text(make);
        }
        if let Some(model) = non_empty(Some(&capture.model)) {
            record.camera_model = fixed_text(model);
        }

        overlay(&mut record.software, &capture.software);
        overlay(&mut record.date_taken, &capture.date_taken);
        overlay(&mut record.lens, &capture.lens);
        overlay(&mut record.description, &capture.description);
        overlay(&mut record.artist, &capture.artist);

        record.iso_speed = capture.iso_speed;
        record.shutter = finite_or_zero(capture.shutter);
        record.aperture = finite_or_zero(capture.aperture);
        record.focal_length = finite_or_zero(capture.focal_length);
        record.max_aperture = finite_or_zero(capture.max_aperture);
        record.focal_length_35mm = capture.focal_length_35mm;
        record.color_filter = capture.color_filter;
        record.cam_mul = capture.cam_mul;

        if capture.raw_width > 0 && capture.raw_height > 0 {
            self.set_source_geometry(capture.raw_width, capture.raw_height);
        }
    }

    /// Finalize against the raster that was encoded and hand out the record.
    ///
    /// Geometry and color fields are overwritten unconditionally.
    pub fn finalize(&mut self, output_width: u32, output_height: u32) -> MetadataRecord {
        let record = &mut self.record;
        record.output_width = output_width;
        record.output_height = output_height;
        record.colors = 3;
        if self.kind != SourceKind::Raw {
            record.color_filter = 0;
        }
        if !self.source_geometry_set {
            record.raw_width = output_width;
            record.raw_height = output_height;
        }

        record.camera_make = fixed_text(&record.camera_make);
        record.camera_model = fixed_text(&record.camera_model);
        if record.camera_make.is_empty() {
            record.camera_make = UNKNOWN.to_string();
        }
        if record.camera_model.is_empty() {
            record.camera_model = self.kind.model_label();
        }

        for mul in &mut record.cam_mul {
            if !mul.is_finite() || *mul == 0.0 {
                *mul = 1.0;
            }
        }

        record.clone()
    }
}

/// Parse EXIF from `bytes`, treating a parse failure as "no metadata".
///
/// A panic inside the parser is still fatal and surfaces as
/// [`ErrorKind::UnknownFailure`].
pub fn extract_exif(
    parser: &dyn ExifParser,
    bytes: &[u8],
    stage: Stage,
) -> Result<Option<ExifFields>> {
    match guarded(stage, ErrorKind::DecodeFailure, "EXIF parse", || parser.parse(bytes)) {
        Ok(fields) => Ok(Some(fields)),
        Err(err) if err.kind == ErrorKind::UnknownFailure => Err(err),
        Err(err) => {
            debug!("No usable EXIF: {}", err.message);
            Ok(None)
        }
    }
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

fn overlay(target: &mut Option<String>, value: &Option<String>) {
    if let Some(text) = non_empty(value.as_deref()) {
        *target = Some(text.to_string());
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
