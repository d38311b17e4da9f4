//! The unified metadata record.

use serde::{Deserialize, Serialize};

/// Maximum number of characters kept in `camera_make` and `camera_model`.
pub const CAMERA_TEXT_CAPACITY: usize = 63;

/// Placeholder used when no camera make is known.
pub const UNKNOWN: &str = "Unknown";

/// Model label for JPEG sources without camera metadata.
pub const JPEG_IMAGE_LABEL: &str = "JPEG Image";

/// Suffix of model labels for converted non-JPEG sources ("PNG->JPEG Conversion").
pub const CONVERSION_SUFFIX: &str = "->JPEG Conversion";

/// Camera, capture and geometry attributes of one normalized image.
///
/// Numeric capture fields use 0 for "unknown". Geometry fields always
/// describe the delivered JPEG, and `cam_mul` never contains 0.0 once the
/// record leaves the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub camera_make: String,
    pub camera_model: String,
    pub software: Option<String>,
    pub date_taken: Option<String>,
    pub lens: Option<String>,
    pub description: Option<String>,
    pub artist: Option<String>,

    pub iso_speed: u32,
    /// Exposure time in seconds.
    pub shutter: f64,
    /// Aperture as an f-number.
    pub aperture: f64,
    /// Focal length in millimetres.
    pub focal_length: f64,
    pub max_aperture: f64,
    pub focal_length_35mm: u32,

    /// Dimensions of the source raster as first decoded.
    pub raw_width: u32,
    pub raw_height: u32,
    /// Dimensions of the encoded output.
    pub output_width: u32,
    pub output_height: u32,

    pub colors: u32,
    /// Sensor color filter pattern id, 0 when not applicable.
    pub color_filter: u32,
    /// White-balance multipliers (R, G, B, G2).
    pub cam_mul: [f64; 4],
}

impl Default for MetadataRecord {
    fn default() -> Self {
        Self {
            camera_make: UNKNOWN.to_string(),
            camera_model: UNKNOWN.to_string(),
            software: None,
            date_taken: None,
            lens: None,
            description: None,
            artist: None,
            iso_speed: 0,
            shutter: 0.0,
            aperture: 0.0,
            focal_length: 0.0,
            max_aperture: 0.0,
            focal_length_35mm: 0,
            raw_width: 0,
            raw_height: 0,
            output_width: 0,
            output_height: 0,
            colors: 0,
            color_filter: 0,
            cam_mul: [0.0; 4],
        }
    }
}

/// Truncate to [`CAMERA_TEXT_CAPACITY`] characters.
pub(crate) fn fixed_text(text: &str) -> String {
    text.chars().take(CAMERA_TEXT_CAPACITY).collect()
}

impl MetadataRecord {
    /// A record carrying only the synthetic camera labels.
    pub fn with_labels(make: &str, model: &str) -> Self {
        Self {
            camera_make: fixed_text(make),
            camera_model: fixed_text(model),
            ..Self::default()
        }
    }

    /// True if make and model came from real camera metadata rather than
    /// placeholders.
    pub fn has_camera_info(&self) -> bool {
        !self.camera_make.is_empty()
            && !self.camera_model.is_empty()
            && self.camera_make != UNKNOWN
            && self.camera_model != UNKNOWN
            && self.camera_model != JPEG_IMAGE_LABEL
            && !self.camera_model.ends_with(CONVERSION_SUFFIX)
    }

    /// True if any of ISO, aperture or shutter speed is known.
    pub fn has_exposure_info(&self) -> bool {
        self.iso_speed > 0 || self.aperture > 0.0 || self.shutter > 0.0
    }

    /// Shutter speed as "1/250s" or "2.0s".
    pub fn formatted_shutter_speed(&self) -> String {
        if self.shutter > 0.0 {
            if self.shutter >= 1.0 {
                format!("{:.1}s", self.shutter)
            } else {
                format!("1/{:.0}s", 1.0 / self.shutter)
            }
        } else {
            UNKNOWN.to_string()
        }
    }

    /// Aperture as "f/2.8".
    pub fn formatted_aperture(&self) -> String {
        if self.aperture > 0.0 {
            format!("f/{:.1}", self.aperture)
        } else {
            UNKNOWN.to_string()
        }
    }

    /// Output size, followed by the source size when known.
    pub fn formatted_dimensions(&self) -> String {
        if self.raw_width > 0 && self.raw_height > 0 {
            format!(
                "{}x{} (RAW: {}x{})",
                self.output_width, self.output_height, self.raw_width, self.raw_height
            )
        } else if self.output_width > 0 && self.output_height > 0 {
            format!("{}x{}", self.output_width, self.output_height)
        } else {
            UNKNOWN.to_string()
        }
    }
}
