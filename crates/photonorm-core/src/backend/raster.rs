//! Generic raster decoding through the `image` crate.

use image::ImageFormat;

use super::{DecodedRaster, RasterDecoder};
use crate::decode::RasterBuffer;
use crate::error::{BackendError, BackendResult};

/// Default [`RasterDecoder`]: every format the `image` crate was built with,
/// forced to 8-bit RGB.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRasterDecoder;

impl RasterDecoder for ImageRasterDecoder {
    fn decode(&self, bytes: &[u8]) -> BackendResult<DecodedRaster> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| BackendError::new(format!("Failed to decode image: {}", e)))?;

        let source_channels = img.color().channel_count();
        let raster = RasterBuffer::from_rgb_image(img.into_rgb8());

        Ok(DecodedRaster {
            raster,
            source_channels,
        })
    }
}

/// Short upper-case name of a raster container, used to label converted
/// images that carry no camera metadata ("TIFF", "WEBP", ...).
pub fn raster_format_label(bytes: &[u8]) -> Option<&'static str> {
    let label = match image::guess_format(bytes).ok()? {
        ImageFormat::Png => "PNG",
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Gif => "GIF",
        ImageFormat::WebP => "WEBP",
        ImageFormat::Tiff => "TIFF",
        ImageFormat::Bmp => "BMP",
        ImageFormat::Ico => "ICO",
        ImageFormat::Pnm => "PNM",
        ImageFormat::Tga => "TGA",
        ImageFormat::Hdr => "HDR",
        ImageFormat::OpenExr => "EXR",
        ImageFormat::Qoi => "QOI",
        ImageFormat::Avif => "AVIF",
        _ => return None,
    };
    Some(label)
}
