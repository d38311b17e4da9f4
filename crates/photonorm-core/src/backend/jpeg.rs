//! JPEG codec service.
//!
//! Decompression goes through `jpeg-decoder`, which can reduce resolution
//! inside the IDCT; that is what makes the decode-time half-size variant
//! possible without a post-decode resample. Compression uses the `image`
//! crate's baseline encoder, which never subsamples chroma (4:4:4).

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use jpeg_decoder::{Decoder, PixelFormat};

use super::{ChromaSubsampling, DecodeScale, JpegCodec, JpegColorSpace, JpegHeader};
use crate::decode::{rgb_len, RasterBuffer};
use crate::error::{BackendError, BackendResult};

/// Default [`JpegCodec`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardJpegCodec;

impl JpegCodec for StandardJpegCodec {
    fn decompress_header(&self, bytes: &[u8]) -> BackendResult<JpegHeader> {
        let mut decoder = Decoder::new(bytes);
        decoder
            .read_info()
            .map_err(|e| BackendError::new(format!("Failed to read JPEG header: {}", e)))?;
        let info = decoder
            .info()
            .ok_or_else(|| BackendError::new("JPEG header carries no frame information"))?;

        let color_space = match info.pixel_format {
            PixelFormat::L8 | PixelFormat::L16 => JpegColorSpace::Gray,
            PixelFormat::RGB24 => JpegColorSpace::YCbCr,
            PixelFormat::CMYK32 => JpegColorSpace::Cmyk,
        };

        Ok(JpegHeader {
            width: u32::from(info.width),
            height: u32::from(info.height),
            subsampling: read_sampling_factors(bytes).unwrap_or(ChromaSubsampling::Unknown),
            color_space,
        })
    }

    fn decompress(&self, bytes: &[u8], scale: DecodeScale) -> BackendResult<RasterBuffer> {
        let mut decoder = Decoder::new(bytes);
        decoder
            .read_info()
            .map_err(|e| BackendError::new(format!("Failed to read JPEG header: {}", e)))?;
        let info = decoder
            .info()
            .ok_or_else(|| BackendError::new("JPEG header carries no frame information"))?;

        let (width, height) = match scale {
            DecodeScale::Full => (info.width, info.height),
            DecodeScale::Half => {
                let requested = (info.width.div_ceil(2), info.height.div_ceil(2));
                decoder
                    .scale(requested.0, requested.1)
                    .map_err(|e| BackendError::new(format!("Failed to scale JPEG: {}", e)))?
            }
        };

        let samples = decoder
            .decode()
            .map_err(|e| BackendError::new(format!("Failed to decompress JPEG: {}", e)))?;

        let (width, height) = (u32::from(width), u32::from(height));
        let pixels = to_rgb(samples, info.pixel_format, width, height)?;

        RasterBuffer::from_raw(width, height, pixels).ok_or_else(|| {
            BackendError::new("Decompressed JPEG does not match its declared dimensions")
        })
    }

    fn compress(&self, raster: &RasterBuffer, quality: u8) -> BackendResult<Vec<u8>> {
        if raster.is_empty() {
            return Err(BackendError::new(format!(
                "Invalid dimensions: width ({}) and height ({}) must be non-zero",
                raster.width(),
                raster.height()
            )));
        }

        let quality = quality.clamp(1, 100);
        let mut buffer = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);

        encoder
            .write_image(
                raster.pixels(),
                raster.width(),
                raster.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| BackendError::new(format!("JPEG encoding failed: {}", e)))?;

        Ok(buffer.into_inner())
    }
}

/// Expand whatever the decoder produced to packed RGB.
fn to_rgb(
    samples: Vec<u8>,
    format: PixelFormat,
    width: u32,
    height: u32,
) -> BackendResult<Vec<u8>> {
    let pixel_count = (width as usize) * (height as usize);
    let expected = match format {
        PixelFormat::L8 => pixel_count,
        PixelFormat::L16 => pixel_count * 2,
        PixelFormat::RGB24 => pixel_count * 3,
        PixelFormat::CMYK32 => pixel_count * 4,
    };
    if samples.len() != expected {
        return Err(BackendError::new(format!(
            "Decoder produced {} bytes, expected {}",
            samples.len(),
            expected
        )));
    }

    let rgb = match format {
        PixelFormat::RGB24 => samples,
        PixelFormat::L8 => samples.iter().flat_map(|&l| [l, l, l]).collect(),
        // Big-endian samples; keep the most significant byte
        PixelFormat::L16 => samples.chunks_exact(2).flat_map(|px| [px[0]; 3]).collect(),
        // Ink amounts, 0 = no ink; the decoder already undid Adobe inversion
        PixelFormat::CMYK32 => samples
            .chunks_exact(4)
            .flat_map(|px| {
                let paper = 255 - u16::from(px[3]);
                let channel = |ink: u8| ((255 - u16::from(ink)) * paper / 255) as u8;
                [channel(px[0]), channel(px[1]), channel(px[2])]
            })
            .collect(),
    };
    debug_assert_eq!(rgb.len(), rgb_len(width, height));
    Ok(rgb)
}

/// Read the chroma subsampling of a JPEG stream from its SOF marker.
///
/// Returns `None` if the stream is not a JPEG or ends before a frame header.
pub fn read_sampling_factors(bytes: &[u8]) -> Option<ChromaSubsampling> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        if marker == 0xFF {
            // Fill byte
            pos += 1;
            continue;
        }
        pos += 2;

        match marker {
            0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => return None,
            _ => {}
        }

        let len = usize::from(u16::from_be_bytes([bytes[pos], bytes[pos + 1]]));
        if len < 2 || pos + len > bytes.len() {
            return None;
        }

        if is_frame_marker(marker) {
            return Some(subsampling_from_frame(&bytes[pos + 2..pos + len]));
        }
        pos += len;
    }

    None
}

fn is_frame_marker(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

/// Frame header: precision(1) height(2) width(2) components(1), then
/// id(1) sampling(1) table(1) per component.
fn subsampling_from_frame(frame: &[u8]) -> ChromaSubsampling {
    let Some(&count) = frame.get(5) else {
        return ChromaSubsampling::Unknown;
    };
    let count = usize::from(count);
    if count == 0 || frame.len() < 6 + 3 * count {
        return ChromaSubsampling::Unknown;
    }
    if count == 1 {
        return ChromaSubsampling::Gray;
    }

    let sampling = |i: usize| frame[6 + 3 * i + 1];
    if (1..count).any(|i| sampling(i) != 0x11) {
        return ChromaSubsampling::Unknown;
    }

    let luma = sampling(0);
    match (luma >> 4, luma & 0x0F) {
        (1, 1) => ChromaSubsampling::Chroma444,
        (2, 1) => ChromaSubsampling::Chroma422,
        (2, 2) => ChromaSubsampling::Chroma420,
        (1, 2) => ChromaSubsampling::Chroma440,
        (4, 1) => ChromaSubsampling::Chroma411,
        _ => ChromaSubsampling::Unknown,
    }
}
