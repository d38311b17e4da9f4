//! EXIF extraction using `kamadak-exif`.

use std::io::Cursor;

use exif::{Exif, In, Reader, Tag, Value};

use super::{ExifFields, ExifParser};
use crate::error::{BackendError, BackendResult};

/// EXIF parser reading the primary IFD of JPEG, TIFF-based RAW, PNG and WebP
/// containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct KamadakExifParser;

impl ExifParser for KamadakExifParser {
    fn parse(&self, bytes: &[u8]) -> BackendResult<ExifFields> {
        let mut cursor = Cursor::new(bytes);
        let exif = Reader::new()
            .read_from_container(&mut cursor)
            .map_err(|e| BackendError::new(format!("Failed to read EXIF: {}", e)))?;

        Ok(fields_from_exif(&exif))
    }
}

fn fields_from_exif(exif: &Exif) -> ExifFields {
    ExifFields {
        make: ascii(exif, Tag::Make),
        model: ascii(exif, Tag::Model),
        software: ascii(exif, Tag::Software),
        date_taken: ascii(exif, Tag::DateTimeOriginal).or_else(|| ascii(exif, Tag::DateTime)),
        lens: ascii(exif, Tag::LensModel),
        description: ascii(exif, Tag::ImageDescription),
        artist: ascii(exif, Tag::Artist),
        iso: uint(exif, Tag::PhotographicSensitivity),
        exposure_time: rational(exif, Tag::ExposureTime),
        f_number: rational(exif, Tag::FNumber),
        focal_length: rational(exif, Tag::FocalLength),
        focal_length_35mm: uint(exif, Tag::FocalLengthIn35mmFilm),
        // Stored as an APEX value: N = sqrt(2)^Av
        max_aperture: rational(exif, Tag::MaxApertureValue).map(|av| 2f64.powf(av / 2.0)),
        orientation: uint(exif, Tag::Orientation),
    }
}

fn ascii(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(parts) => {
            let joined = parts
                .iter()
                .map(|part| String::from_utf8_lossy(part).into_owned())
                .collect::<Vec<_>>()
                .join(" ");
            let trimmed = joined.trim_matches(|c: char| c == '\0' || c.is_whitespace());
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => None,
    }
}

fn uint(exif: &Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)?.value.get_uint(0)
}

fn rational(exif: &Exif, tag: Tag) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let value = match &field.value {
        Value::Rational(values) => values.first().map(|r| r.to_f64()),
        Value::SRational(values) => values.first().map(|r| r.to_f64()),
        _ => None,
    }?;
    value.is_finite().then_some(value)
}
