//! Camera RAW decoding using the rawloader library.
//!
//! rawloader parses the container and unpacks the sensor data; the
//! development step here turns the mosaic into an RGB image:
//!
//! 1. Crop to the active area and normalize by black/white levels
//! 2. Demosaic, either one pixel per 2x2 cell (half size) or a 3x3
//!    neighborhood average (full size)
//! 3. White balance (camera multipliers, gray world, or none)
//! 4. Camera-to-sRGB matrix
//! 5. Optional auto-brightness, then the sRGB transfer curve
//!
//! The result is intentionally simple: a bounded-latency preview quality
//! develop, not a full raw converter.

use std::io::Cursor;
use std::ops::Range;

use rawloader::{RawImage, RawImageData as RawloaderImageData};
use tracing::debug;

use super::{
    ExifFields, ExifParser, KamadakExifParser, OutputColorSpace, ProcessedImage, RawCapture,
    RawDecoder, RawParams, RawSession, WhiteBalance,
};
use crate::error::{BackendError, BackendResult};

/// Standard XYZ to linear sRGB (D65) matrix.
const XYZ_TO_SRGB: [[f32; 3]; 3] = [
    [3.2404542, -1.5371385, -0.4985314],
    [-0.9692660, 1.8760108, 0.0415560],
    [0.0556434, -0.2040259, 1.0572252],
];

/// Percentile of the brightest channel mapped to full scale by auto-brightness.
const AUTO_BRIGHT_PERCENTILE: f32 = 0.99;

/// dcraw-style filter id reported for X-Trans sensors.
const XTRANS_FILTERS: u32 = 9;

// Sensor color indices as reported by rawloader's CFA
const RED: u8 = 0;
const GREEN: u8 = 1;
const BLUE: u8 = 2;

/// Default [`RawDecoder`] built on rawloader.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawloaderDecoder;

impl RawDecoder for RawloaderDecoder {
    fn open<'a>(
        &self,
        bytes: &'a [u8],
        params: &RawParams,
    ) -> BackendResult<Box<dyn RawSession + 'a>> {
        if bytes.is_empty() {
            return Err(BackendError::new("RAW input is empty"));
        }
        if !is_raw_container(bytes) {
            return Err(BackendError::new("Unrecognized RAW container signature"));
        }

        Ok(Box::new(RawloaderSession {
            bytes,
            params: *params,
            image: None,
            developed: None,
            capture: None,
        }))
    }
}

/// Check the leading bytes for one of the RAW container signatures.
pub(crate) fn is_raw_container(bytes: &[u8]) -> bool {
    const PREFIXES: &[&[u8]] = &[
        b"II*\0",     // TIFF little-endian (CR2, NEF, ARW, DNG, PEF, ...)
        b"MM\0*",     // TIFF big-endian
        b"IIRO",      // Olympus ORF
        b"IIRS",      // Olympus ORF
        b"MMOR",      // Olympus ORF
        b"IIU\0",     // Panasonic RW2
        b"FUJIFILM",  // Fujifilm RAF
        b"\0MRM",     // Minolta MRW
        b"FOVb",      // Sigma X3F
    ];

    PREFIXES.iter().any(|prefix| bytes.starts_with(prefix))
        || bytes.get(6..14) == Some(b"HEAPCCDR".as_slice()) // Canon CRW
        || bytes.get(4..11) == Some(b"ftypcrx".as_slice()) // Canon CR3
}

struct RawloaderSession<'a> {
    bytes: &'a [u8],
    params: RawParams,
    image: Option<RawImage>,
    developed: Option<ProcessedImage>,
    capture: Option<RawCapture>,
}

impl RawSession for RawloaderSession<'_> {
    fn unpack(&mut self) -> BackendResult<()> {
        debug!("Unpacking RAW sensor data, {} bytes", self.bytes.len());

        let image = rawloader::decode(&mut Cursor::new(self.bytes))
            .map_err(|e| BackendError::new(format!("Failed to unpack RAW data: {}", e)))?;

        if image.cpp != 1 {
            return Err(BackendError::new(format!(
                "Unsupported RAW layout: {} components per pixel",
                image.cpp
            )));
        }

        debug!(
            "Unpacked {} {}: {}x{} sensor, CFA {}",
            image.clean_make, image.clean_model, image.width, image.height, image.cfa.name
        );
        self.image = Some(image);
        Ok(())
    }

    fn process(&mut self) -> BackendResult<()> {
        let image = self
            .image
            .as_ref()
            .ok_or_else(|| BackendError::new("RAW data has not been unpacked"))?;

        let frame = SensorFrame::from_rawloader(image)?;
        let developed = develop(&frame, &self.params);
        debug!(
            "Developed RAW to {}x{} ({}-bit)",
            developed.width, developed.height, developed.bits
        );

        let exif = KamadakExifParser.parse(self.bytes).ok();
        self.capture = Some(capture_from(image, &frame, exif));
        self.developed = Some(developed);
        Ok(())
    }

    fn capture(&self) -> Option<RawCapture> {
        self.capture.clone()
    }

    fn materialize(&mut self) -> BackendResult<ProcessedImage> {
        self.developed
            .take()
            .ok_or_else(|| BackendError::new("RAW image has not been processed"))
    }
}

/// Repeating color filter pattern, expressed relative to the active area.
#[derive(Debug, Clone)]
struct CfaPattern {
    width: usize,
    height: usize,
    colors: Vec<u8>,
}

impl CfaPattern {
    fn monochrome() -> Self {
        Self {
            width: 1,
            height: 1,
            colors: vec![GREEN],
        }
    }

    fn from_rawloader(cfa: &rawloader::CFA, top: usize, left: usize) -> Self {
        if cfa.width == 0 || cfa.height == 0 {
            return Self::monochrome();
        }
        let mut colors = Vec::with_capacity(cfa.width * cfa.height);
        for row in 0..cfa.height {
            for col in 0..cfa.width {
                colors.push(cfa.color_at(row + top, col + left) as u8);
            }
        }
        Self {
            width: cfa.width,
            height: cfa.height,
            colors,
        }
    }

    #[inline]
    fn color_at(&self, row: usize, col: usize) -> u8 {
        self.colors[(row % self.height) * self.width + (col % self.width)]
    }

    /// Pattern id in dcraw's packed `filters` encoding (0 when not a mosaic).
    fn filters(&self) -> u32 {
        match (self.width, self.height) {
            (1, 1) => 0,
            (6, 6) => XTRANS_FILTERS,
            _ => {
                let mut filters = 0u32;
                for row in 0..8 {
                    for col in 0..2 {
                        let shift = ((((row << 1) & 14) | (col & 1)) << 1) as u32;
                        filters |= u32::from(self.color_at(row, col) & 3) << shift;
                    }
                }
                filters
            }
        }
    }
}

/// Normalized sensor samples of the active area, one per photosite.
#[derive(Debug, Clone)]
struct SensorFrame {
    width: usize,
    height: usize,
    /// Linear values, 0.0 = black level, 1.0 = white level.
    samples: Vec<f32>,
    cfa: CfaPattern,
    wb_coeffs: [f32; 4],
    cam_to_xyz: Option<[[f32; 3]; 3]>,
}

impl SensorFrame {
    fn from_rawloader(image: &RawImage) -> BackendResult<Self> {
        let [top, right, bottom, left] = image.crops;
        let width = image.width.saturating_sub(left + right);
        let height = image.height.saturating_sub(top + bottom);
        if width == 0 || height == 0 {
            return Err(BackendError::new(format!(
                "RAW active area is empty ({}x{} sensor, crops {:?})",
                image.width, image.height, image.crops
            )));
        }

        let cfa = CfaPattern::from_rawloader(&image.cfa, top, left);
        let levels: [(f32, f32); 4] = std::array::from_fn(|c| {
            let black = f32::from(image.blacklevels[c]);
            let white = f32::from(image.whitelevels[c]);
            (black, (white - black).max(1.0))
        });

        let mut samples = Vec::with_capacity(width * height);
        match &image.data {
            RawloaderImageData::Integer(values) => {
                for row in 0..height {
                    let offset = (row + top) * image.width + left;
                    let line = values.get(offset..offset + width).ok_or_else(|| {
                        BackendError::new("RAW sensor data is shorter than its dimensions")
                    })?;
                    for (col, &v) in line.iter().enumerate() {
                        let (black, range) = levels[usize::from(cfa.color_at(row, col) & 3)];
                        samples.push(((f32::from(v) - black) / range).max(0.0));
                    }
                }
            }
            // Floating point sensors are already normalized
            RawloaderImageData::Float(values) => {
                for row in 0..height {
                    let offset = (row + top) * image.width + left;
                    let line = values.get(offset..offset + width).ok_or_else(|| {
                        BackendError::new("RAW sensor data is shorter than its dimensions")
                    })?;
                    samples.extend(line.iter().map(|&v| v.max(0.0)));
                }
            }
        }

        let m = image.cam_to_xyz();
        let cam_to_xyz = [
            [m[0][0], m[0][1], m[0][2]],
            [m[1][0], m[1][1], m[1][2]],
            [m[2][0], m[2][1], m[2][2]],
        ];

        Ok(Self {
            width,
            height,
            samples,
            cfa,
            wb_coeffs: image.wb_coeffs,
            cam_to_xyz: Some(cam_to_xyz),
        })
    }
}

/// Map a CFA color to an output channel (the second green folds into green).
#[inline]
fn channel_of(color: u8) -> usize {
    match color {
        RED => 0,
        BLUE => 2,
        _ => 1,
    }
}

/// Average the photosites of a window into one RGB pixel.
///
/// Channels absent from the window take the mean of the channels present.
fn average_window(frame: &SensorFrame, rows: Range<usize>, cols: Range<usize>) -> [f32; 3] {
    let mut sum = [0.0f32; 3];
    let mut count = [0u32; 3];
    for row in rows {
        let line = &frame.samples[row * frame.width..(row + 1) * frame.width];
        for col in cols.clone() {
            let ch = channel_of(frame.cfa.color_at(row, col));
            sum[ch] += line[col];
            count[ch] += 1;
        }
    }

    let (total, present) = (0..3)
        .filter(|&c| count[c] > 0)
        .fold((0.0f32, 0u32), |(total, n), c| {
            (total + sum[c] / count[c] as f32, n + 1)
        });
    let fallback = if present == 0 {
        0.0
    } else {
        total / present as f32
    };

    std::array::from_fn(|c| {
        if count[c] > 0 {
            sum[c] / count[c] as f32
        } else {
            fallback
        }
    })
}

fn demosaic(frame: &SensorFrame, half_size: bool) -> (usize, usize, Vec<[f32; 3]>) {
    if half_size {
        let out_w = (frame.width / 2).max(1);
        let out_h = (frame.height / 2).max(1);
        let mut out = Vec::with_capacity(out_w * out_h);
        for oy in 0..out_h {
            let rows = (oy * 2)..(oy * 2 + 2).min(frame.height);
            for ox in 0..out_w {
                let cols = (ox * 2)..(ox * 2 + 2).min(frame.width);
                out.push(average_window(frame, rows.clone(), cols));
            }
        }
        (out_w, out_h, out)
    } else {
        let mut out = Vec::with_capacity(frame.width * frame.height);
        for y in 0..frame.height {
            let rows = y.saturating_sub(1)..(y + 2).min(frame.height);
            for x in 0..frame.width {
                let cols = x.saturating_sub(1)..(x + 2).min(frame.width);
                out.push(average_window(frame, rows.clone(), cols));
            }
        }
        (frame.width, frame.height, out)
    }
}

/// Per-channel multipliers, normalized so green is 1.0.
fn white_balance(mode: WhiteBalance, wb_coeffs: &[f32; 4], pixels: &[[f32; 3]]) -> [f32; 3] {
    let neutral = [1.0; 3];
    let valid = |v: f32| v.is_finite() && v > 0.0;

    match mode {
        WhiteBalance::None => neutral,
        WhiteBalance::Camera => {
            let [r, g, b, _] = *wb_coeffs;
            if valid(r) && valid(g) && valid(b) {
                [r / g, 1.0, b / g]
            } else {
                neutral
            }
        }
        WhiteBalance::Auto => {
            let mut mean = [0.0f64; 3];
            for px in pixels {
                for c in 0..3 {
                    mean[c] += f64::from(px[c]);
                }
            }
            if mean.iter().all(|&m| m > 0.0) {
                [(mean[1] / mean[0]) as f32, 1.0, (mean[1] / mean[2]) as f32]
            } else {
                neutral
            }
        }
    }
}

/// Combined camera-to-sRGB matrix with rows normalized to preserve white.
fn camera_to_srgb(cam_to_xyz: &[[f32; 3]; 3]) -> Option<[[f32; 3]; 3]> {
    let mut out = [[0.0f32; 3]; 3];
    for r in 0..3 {
        for c in 0..3 {
            out[r][c] = (0..3).map(|k| XYZ_TO_SRGB[r][k] * cam_to_xyz[k][c]).sum();
        }
        let row_sum: f32 = out[r].iter().sum();
        if !row_sum.is_finite() || row_sum.abs() < 1e-6 {
            return None;
        }
        for value in &mut out[r] {
            *value /= row_sum;
        }
    }
    Some(out)
}

#[inline]
fn srgb_gamma(linear: f32) -> f32 {
    if linear <= 0.0031308 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

/// Turn a normalized sensor frame into an RGB image.
fn develop(frame: &SensorFrame, params: &RawParams) -> ProcessedImage {
    let (width, height, mut pixels) = demosaic(frame, params.half_size);

    let wb = white_balance(params.white_balance, &frame.wb_coeffs, &pixels);
    for px in &mut pixels {
        for c in 0..3 {
            px[c] *= wb[c];
        }
    }

    let srgb_output = params.color_space == OutputColorSpace::Srgb;
    if params.use_camera_matrix && srgb_output {
        if let Some(matrix) = frame.cam_to_xyz.as_ref().and_then(camera_to_srgb) {
            for px in &mut pixels {
                let [r, g, b] = *px;
                *px = std::array::from_fn(|row| {
                    matrix[row][0] * r + matrix[row][1] * g + matrix[row][2] * b
                });
            }
        }
    }

    if params.auto_brightness {
        let mut peaks: Vec<f32> = pixels.iter().map(|px| px[0].max(px[1]).max(px[2])).collect();
        if !peaks.is_empty() {
            let idx = ((peaks.len() - 1) as f32 * AUTO_BRIGHT_PERCENTILE) as usize;
            let (_, &mut level, _) = peaks.select_nth_unstable_by(idx, f32::total_cmp);
            if level > 0.0 {
                for px in &mut pixels {
                    for value in px.iter_mut() {
                        *value /= level;
                    }
                }
            }
        }
    }

    let transfer = |v: f32| {
        let v = v.clamp(0.0, 1.0);
        if srgb_output {
            srgb_gamma(v)
        } else {
            v
        }
    };

    let sixteen_bit = params.output_bits > 8;
    let mut data = Vec::with_capacity(width * height * 3 * if sixteen_bit { 2 } else { 1 });
    for px in &pixels {
        for &value in px {
            let v = transfer(value);
            if sixteen_bit {
                data.extend_from_slice(&((v * 65535.0).round() as u16).to_be_bytes());
            } else {
                data.push((v * 255.0).round() as u8);
            }
        }
    }

    ProcessedImage {
        width: width as u32,
        height: height as u32,
        colors: 3,
        bits: if sixteen_bit { 16 } else { 8 },
        data,
    }
}

fn capture_from(image: &RawImage, frame: &SensorFrame, exif: Option<ExifFields>) -> RawCapture {
    let exif = exif.unwrap_or_default();
    let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.trim().to_string());

    RawCapture {
        make: non_empty(&image.clean_make)
            .or(exif.make)
            .unwrap_or_default(),
        model: non_empty(&image.clean_model)
            .or(exif.model)
            .unwrap_or_default(),
        software: exif.software,
        date_taken: exif.date_taken,
        lens: exif.lens,
        description: exif.description,
        artist: exif.artist,
        iso_speed: exif.iso.unwrap_or(0),
        shutter: exif.exposure_time.unwrap_or(0.0),
        aperture: exif.f_number.unwrap_or(0.0),
        focal_length: exif.focal_length.unwrap_or(0.0),
        max_aperture: exif.max_aperture.unwrap_or(0.0),
        focal_length_35mm: exif.focal_length_35mm.unwrap_or(0),
        raw_width: frame.width as u32,
        raw_height: frame.height as u32,
        color_filter: frame.cfa.filters(),
        cam_mul: image.wb_coeffs.map(f64::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rggb() -> CfaPattern {
        CfaPattern {
            width: 2,
            height: 2,
            colors: vec![RED, GREEN, GREEN, BLUE],
        }
    }

    /// Uniform frame whose R, G and B photosites hold the given values.
    fn frame(width: usize, height: usize, rgb: [f32; 3]) -> SensorFrame {
        let cfa = rggb();
        let mut samples = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                samples.push(rgb[channel_of(cfa.color_at(row, col))]);
            }
        }
        SensorFrame {
            width,
            height,
            samples,
            cfa,
            wb_coeffs: [1.0, 1.0, 1.0, f32::NAN],
            cam_to_xyz: None,
        }
    }

    fn linear_params() -> RawParams {
        RawParams {
            color_space: OutputColorSpace::Raw,
            white_balance: WhiteBalance::None,
            use_camera_matrix: false,
            ..RawParams::default()
        }
    }

    /// 6x5 RGGB sensor with a one-photosite crop on top, left and right.
    ///
    /// Active photosites sit 500 above their channel's black level (0.5 after
    /// normalization); the cropped border is saturated.
    fn sensor_image() -> RawImage {
        let (width, height) = (6, 5);
        let cfa = rawloader::CFA::new("RGGB");
        let blacklevels = [100, 50, 80, 50];
        let mut data = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                let border = row == 0 || col == 0 || col == width - 1;
                data.push(if border {
                    u16::MAX
                } else {
                    blacklevels[cfa.color_at(row, col)] + 500
                });
            }
        }

        RawImage {
            make: "NIKON CORPORATION".into(),
            model: "NIKON Z 6".into(),
            clean_make: String::new(),
            clean_model: "Z 6".into(),
            width,
            height,
            cpp: 1,
            wb_coeffs: [2.0, 1.0, 1.5, f32::NAN],
            whitelevels: [1100, 1050, 1080, 1050],
            blacklevels,
            xyz_to_cam: [
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [0.0, 0.0, 0.0],
            ],
            cfa,
            crops: [1, 1, 0, 1],
            blackareas: Vec::new(),
            orientation: rawloader::Orientation::Normal,
            data: RawloaderImageData::Integer(data),
        }
    }

    #[test]
    fn test_sensor_frame_crops_and_normalizes() {
        let frame = SensorFrame::from_rawloader(&sensor_image()).unwrap();

        assert_eq!((frame.width, frame.height), (4, 4));
        assert_eq!(frame.samples.len(), 16);
        assert!(frame.samples.iter().all(|&v| v == 0.5), "{:?}", frame.samples);
        // The crop starts on an odd row and column, so the pattern is BGGR
        assert_eq!(frame.cfa.color_at(0, 0), BLUE);
        assert_eq!(frame.cfa.color_at(1, 1), RED);
    }

    #[test]
    fn test_sensor_frame_clamps_below_black() {
        let mut image = sensor_image();
        if let RawloaderImageData::Integer(data) = &mut image.data {
            data[2 * 6 + 3] = 0;
        }
        let frame = SensorFrame::from_rawloader(&image).unwrap();
        assert_eq!(frame.samples[4 + 2], 0.0);
        assert_eq!(frame.samples[4 + 1], 0.5);
    }

    #[test]
    fn test_sensor_frame_short_data_is_error() {
        let mut image = sensor_image();
        image.data = RawloaderImageData::Integer(vec![0; 10]);
        assert!(SensorFrame::from_rawloader(&image).is_err());
    }

    #[test]
    fn test_sensor_frame_rejects_empty_active_area() {
        let mut image = sensor_image();
        image.crops = [3, 3, 3, 3];
        assert!(SensorFrame::from_rawloader(&image).is_err());
    }

    #[test]
    fn test_capture_maps_rawloader_fields() {
        let image = sensor_image();
        let frame = SensorFrame::from_rawloader(&image).unwrap();
        let exif = ExifFields {
            make: Some("NIKON CORPORATION".into()),
            model: Some("NIKON Z 6 (EXIF)".into()),
            iso: Some(800),
            exposure_time: Some(0.004),
            f_number: Some(5.6),
            lens: Some("NIKKOR Z 50mm f/1.8 S".into()),
            ..ExifFields::default()
        };

        let capture = capture_from(&image, &frame, Some(exif));

        // Empty clean make falls back to EXIF; clean model wins over EXIF
        assert_eq!(capture.make, "NIKON CORPORATION");
        assert_eq!(capture.model, "Z 6");
        assert_eq!(capture.iso_speed, 800);
        assert_eq!(capture.shutter, 0.004);
        assert_eq!(capture.aperture, 5.6);
        assert_eq!(capture.lens.as_deref(), Some("NIKKOR Z 50mm f/1.8 S"));
        assert_eq!((capture.raw_width, capture.raw_height), (4, 4));
        assert_eq!(capture.color_filter, frame.cfa.filters());
        assert_eq!(&capture.cam_mul[..3], &[2.0, 1.0, 1.5]);
        assert!(capture.cam_mul[3].is_nan());
    }

    #[test]
    fn test_capture_without_exif() {
        let image = sensor_image();
        let frame = SensorFrame::from_rawloader(&image).unwrap();
        let capture = capture_from(&image, &frame, None);

        assert_eq!(capture.make, "");
        assert_eq!(capture.model, "Z 6");
        assert_eq!(capture.iso_speed, 0);
        assert_eq!(capture.shutter, 0.0);
    }

    #[test]
    fn test_container_signatures() {
        assert!(is_raw_container(b"II*\0\x08\0\0\0"));
        assert!(is_raw_container(b"MM\0*\0\0\0\x08"));
        assert!(is_raw_container(b"IIRO\x08\0\0\0"));
        assert!(is_raw_container(b"FUJIFILMCCD-RAW"));
        assert!(is_raw_container(b"\0\0\0\x18ftypcrx \0\0\0\x01"));
        assert!(is_raw_container(b"II\x1a\0\0\0HEAPCCDR"));
        assert!(!is_raw_container(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(!is_raw_container(b"GIF89a"));
        assert!(!is_raw_container(&[]));
    }

    #[test]
    fn test_open_rejects_empty_and_unknown() {
        let params = RawParams::default();
        assert!(RawloaderDecoder.open(&[], &params).is_err());
        assert!(RawloaderDecoder.open(b"not a raw file", &params).is_err());
    }

    #[test]
    fn test_unpack_fails_on_bare_tiff_header() {
        let bytes = b"II*\0\x08\0\0\0\0\0\0\0\0\0";
        let mut session = RawloaderDecoder.open(bytes, &RawParams::default()).unwrap();
        assert!(session.unpack().is_err());
        assert!(session.capture().is_none());
    }

    #[test]
    fn test_steps_out_of_order_fail() {
        let bytes = b"II*\0\x08\0\0\0\0\0\0\0\0\0";
        let mut session = RawloaderDecoder.open(bytes, &RawParams::default()).unwrap();
        assert!(session.process().is_err());
        assert!(session.materialize().is_err());
    }

    #[test]
    fn test_half_size_halves_dimensions() {
        let out = develop(&frame(8, 6, [0.5, 0.5, 0.5]), &linear_params());
        assert_eq!((out.width, out.height), (4, 3));
        assert_eq!(out.colors, 3);
        assert_eq!(out.bits, 8);
        assert_eq!(out.data.len(), 4 * 3 * 3);
        assert!(out.data.iter().all(|&v| v == 128));
    }

    #[test]
    fn test_full_size_keeps_dimensions() {
        let params = RawParams {
            half_size: false,
            ..linear_params()
        };
        let out = develop(&frame(6, 4, [0.2, 0.4, 0.6]), &params);
        assert_eq!((out.width, out.height), (6, 4));
        // Every 3x3 (or edge-clipped) window of an RGGB mosaic sees all colors
        assert_eq!(&out.data[0..3], &[51, 102, 153]);
    }

    #[test]
    fn test_half_size_separates_channels() {
        let out = develop(&frame(4, 4, [1.0, 0.5, 0.0]), &linear_params());
        assert_eq!(&out.data[0..3], &[255, 128, 0]);
    }

    #[test]
    fn test_camera_white_balance_normalized_to_green() {
        let mut f = frame(2, 2, [0.25, 0.5, 0.25]);
        f.wb_coeffs = [4.0, 2.0, 3.0, f32::NAN];
        let params = RawParams {
            white_balance: WhiteBalance::Camera,
            ..linear_params()
        };
        let out = develop(&f, &params);
        // r *= 2, b *= 1.5
        assert_eq!(&out.data[0..3], &[128, 128, 96]);
    }

    #[test]
    fn test_invalid_camera_white_balance_is_neutral() {
        let mut f = frame(2, 2, [0.25, 0.5, 0.25]);
        f.wb_coeffs = [0.0, f32::NAN, 1.0, 1.0];
        let params = RawParams {
            white_balance: WhiteBalance::Camera,
            ..linear_params()
        };
        let out = develop(&f, &params);
        assert_eq!(&out.data[0..3], &[64, 128, 64]);
    }

    #[test]
    fn test_auto_white_balance_grays_uniform_frame() {
        let params = RawParams {
            white_balance: WhiteBalance::Auto,
            ..linear_params()
        };
        let out = develop(&frame(4, 4, [0.2, 0.4, 0.8]), &params);
        let [r, g, b] = [out.data[0], out.data[1], out.data[2]];
        assert_eq!(r, g);
        assert!((i16::from(b) - i16::from(g)).abs() <= 1);
    }

    #[test]
    fn test_auto_brightness_stretches_to_full_scale() {
        let params = RawParams {
            auto_brightness: true,
            ..linear_params()
        };
        let out = develop(&frame(4, 4, [0.25, 0.25, 0.25]), &params);
        assert!(out.data.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_srgb_gamma_brightens_midtones() {
        let params = RawParams {
            color_space: OutputColorSpace::Srgb,
            ..linear_params()
        };
        let out = develop(&frame(2, 2, [0.2, 0.2, 0.2]), &params);
        // sRGB(0.2) ~= 0.484
        assert!((i16::from(out.data[0]) - 124).abs() <= 1);
    }

    #[test]
    fn test_degenerate_matrix_is_skipped() {
        let mut f = frame(2, 2, [0.5, 0.5, 0.5]);
        f.cam_to_xyz = Some([[0.0; 3]; 3]);
        let params = RawParams {
            use_camera_matrix: true,
            color_space: OutputColorSpace::Srgb,
            white_balance: WhiteBalance::None,
            ..RawParams::default()
        };
        let out = develop(&f, &params);
        let expected = (srgb_gamma(0.5) * 255.0).round() as u8;
        assert_eq!(&out.data[0..3], &[expected; 3]);
    }

    #[test]
    fn test_matrix_preserves_white() {
        let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let matrix = camera_to_srgb(&identity).unwrap();
        for row in matrix {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_sixteen_bit_output_is_big_endian() {
        let params = RawParams {
            output_bits: 16,
            ..linear_params()
        };
        let out = develop(&frame(2, 2, [1.0, 1.0, 1.0]), &params);
        assert_eq!(out.bits, 16);
        assert_eq!(out.data.len(), 3 * 2);
        assert_eq!(&out.data[0..2], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_filters_encoding() {
        assert_eq!(rggb().filters(), 0x9494_9494);
        assert_eq!(CfaPattern::monochrome().filters(), 0);
        let xtrans = CfaPattern {
            width: 6,
            height: 6,
            colors: vec![GREEN; 36],
        };
        assert_eq!(xtrans.filters(), XTRANS_FILTERS);
    }

    #[test]
    fn test_single_photosite_frame() {
        let f = SensorFrame {
            width: 1,
            height: 1,
            samples: vec![0.5],
            cfa: CfaPattern::monochrome(),
            wb_coeffs: [1.0; 4],
            cam_to_xyz: None,
        };
        let out = develop(&f, &linear_params());
        assert_eq!((out.width, out.height), (1, 1));
        assert_eq!(out.data, vec![128, 128, 128]);
    }
}
