//! Test doubles for the backend services and synthetic inputs.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::Pipeline;
use crate::backend::exif::test_support::{with_exif, Entry, TAG_MODEL};
use crate::backend::{
    DecodeScale, DecodedRaster, ExifFields, ExifParser, ImageRasterDecoder, JpegCodec,
    JpegHeader, KamadakExifParser, ProcessedImage, RasterDecoder, RawCapture, RawDecoder,
    RawParams, RawSession, StandardJpegCodec,
};
use crate::config::PipelineConfig;
use crate::decode::RasterBuffer;
use crate::error::{BackendError, BackendResult};

/// Install a test-local subscriber (once) so `RUST_LOG` shows pipeline logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn solid_jpeg(width: u32, height: u32) -> Vec<u8> {
    StandardJpegCodec
        .compress(&RasterBuffer::filled(width, height, [120, 140, 160]), 90)
        .unwrap()
}

fn encode_with(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 60, 90]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

pub fn solid_png(width: u32, height: u32) -> Vec<u8> {
    encode_with(width, height, image::ImageFormat::Png)
}

pub fn solid_bmp(width: u32, height: u32) -> Vec<u8> {
    encode_with(width, height, image::ImageFormat::Bmp)
}

/// Wraps a backend and counts every call made to it.
pub struct Counted<T> {
    inner: T,
    calls: Arc<AtomicUsize>,
}

impl<T> Counted<T> {
    pub fn new(inner: T) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T: JpegCodec> JpegCodec for Counted<T> {
    fn decompress_header(&self, bytes: &[u8]) -> BackendResult<JpegHeader> {
        self.hit();
        self.inner.decompress_header(bytes)
    }

    fn decompress(&self, bytes: &[u8], scale: DecodeScale) -> BackendResult<RasterBuffer> {
        self.hit();
        self.inner.decompress(bytes, scale)
    }

    fn compress(&self, raster: &RasterBuffer, quality: u8) -> BackendResult<Vec<u8>> {
        self.hit();
        self.inner.compress(raster, quality)
    }
}

impl<T: RasterDecoder> RasterDecoder for Counted<T> {
    fn decode(&self, bytes: &[u8]) -> BackendResult<DecodedRaster> {
        self.hit();
        self.inner.decode(bytes)
    }
}

impl<T: RawDecoder> RawDecoder for Counted<T> {
    fn open<'a>(
        &self,
        bytes: &'a [u8],
        params: &RawParams,
    ) -> BackendResult<Box<dyn RawSession + 'a>> {
        self.hit();
        self.inner.open(bytes, params)
    }
}

impl<T: ExifParser> ExifParser for Counted<T> {
    fn parse(&self, bytes: &[u8]) -> BackendResult<ExifFields> {
        self.hit();
        self.inner.parse(bytes)
    }
}

/// Call counts of a [`counted_pipeline`].
pub struct Counters {
    jpeg: Arc<AtomicUsize>,
    raster: Arc<AtomicUsize>,
    raw: Arc<AtomicUsize>,
    exif: Arc<AtomicUsize>,
}

impl Counters {
    pub fn raw(&self) -> usize {
        self.raw.load(Ordering::SeqCst)
    }

    pub fn exif(&self) -> usize {
        self.exif.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        [&self.jpeg, &self.raster, &self.raw, &self.exif]
            .iter()
            .map(|c| c.load(Ordering::SeqCst))
            .sum()
    }
}

/// Default backends (with `raw` as the RAW decoder), all call-counted.
pub fn counted_pipeline<R: RawDecoder + 'static>(raw: R) -> (Pipeline, Counters) {
    let (jpeg, jpeg_calls) = Counted::new(StandardJpegCodec);
    let (raster, raster_calls) = Counted::new(ImageRasterDecoder);
    let (raw, raw_calls) = Counted::new(raw);
    let (exif, exif_calls) = Counted::new(KamadakExifParser);

    let pipeline = Pipeline::with_backends(
        Box::new(jpeg),
        Box::new(raster),
        Box::new(raw),
        Box::new(exif),
        PipelineConfig::default(),
    );
    let counters = Counters {
        jpeg: jpeg_calls,
        raster: raster_calls,
        raw: raw_calls,
        exif: exif_calls,
    };
    (pipeline, counters)
}

/// RAW decoder producing pseudo-random noise of a fixed size.
#[derive(Debug, Clone, Copy)]
pub struct NoiseRaw {
    pub width: u32,
    pub height: u32,
    pub colors: u16,
    pub bits: u16,
    pub fail_unpack: bool,
}

impl NoiseRaw {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            colors: 3,
            bits: 8,
            fail_unpack: false,
        }
    }
}

impl RawDecoder for NoiseRaw {
    fn open<'a>(
        &self,
        _bytes: &'a [u8],
        _params: &RawParams,
    ) -> BackendResult<Box<dyn RawSession + 'a>> {
        Ok(Box::new(NoiseSession {
            shape: *self,
            processed: false,
        }))
    }
}

struct NoiseSession {
    shape: NoiseRaw,
    processed: bool,
}

impl RawSession for NoiseSession {
    fn unpack(&mut self) -> BackendResult<()> {
        if self.shape.fail_unpack {
            Err(BackendError::new("unsupported compression"))
        } else {
            Ok(())
        }
    }

    fn process(&mut self) -> BackendResult<()> {
        self.processed = true;
        Ok(())
    }

    fn capture(&self) -> Option<RawCapture> {
        self.processed.then(|| RawCapture {
            make: "MockCam".into(),
            model: "Noise 1".into(),
            iso_speed: 400,
            shutter: 1.0 / 60.0,
            aperture: 5.6,
            raw_width: self.shape.width * 2,
            raw_height: self.shape.height * 2,
            color_filter: 0x9494_9494,
            cam_mul: [2.0, 1.0, 1.5, 0.0],
            ..RawCapture::default()
        })
    }

    fn materialize(&mut self) -> BackendResult<ProcessedImage> {
        let shape = self.shape;
        let len = shape.width as usize
            * shape.height as usize
            * usize::from(shape.colors)
            * usize::from(shape.bits / 8);

        // xorshift32
        let mut state = 0x2545_F491u32;
        let data = (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect();

        Ok(ProcessedImage {
            width: shape.width,
            height: shape.height,
            colors: shape.colors,
            bits: shape.bits,
            data,
        })
    }
}

/// JPEG codec whose compression misbehaves.
pub struct FaultyJpeg {
    fault: Fault,
}

enum Fault {
    Error,
    Panic,
    Garbage,
}

impl FaultyJpeg {
    pub fn failing() -> Self {
        Self { fault: Fault::Error }
    }

    pub fn panicking() -> Self {
        Self { fault: Fault::Panic }
    }

    pub fn garbage() -> Self {
        Self {
            fault: Fault::Garbage,
        }
    }
}

impl JpegCodec for FaultyJpeg {
    fn decompress_header(&self, bytes: &[u8]) -> BackendResult<JpegHeader> {
        StandardJpegCodec.decompress_header(bytes)
    }

    fn decompress(&self, bytes: &[u8], scale: DecodeScale) -> BackendResult<RasterBuffer> {
        StandardJpegCodec.decompress(bytes, scale)
    }

    fn compress(&self, _raster: &RasterBuffer, _quality: u8) -> BackendResult<Vec<u8>> {
        match self.fault {
            Fault::Error => Err(BackendError::new("unsupported sampling")),
            Fault::Panic => panic!("encoder exploded"),
            Fault::Garbage => Ok(vec![0x00, 0x11, 0x22]),
        }
    }
}

/// Standard codec that embeds an IFD0 `Model` tag in everything it compresses.
pub struct ModelStampingJpeg(pub &'static str);

impl JpegCodec for ModelStampingJpeg {
    fn decompress_header(&self, bytes: &[u8]) -> BackendResult<JpegHeader> {
        StandardJpegCodec.decompress_header(bytes)
    }

    fn decompress(&self, bytes: &[u8], scale: DecodeScale) -> BackendResult<RasterBuffer> {
        StandardJpegCodec.decompress(bytes, scale)
    }

    fn compress(&self, raster: &RasterBuffer, quality: u8) -> BackendResult<Vec<u8>> {
        let jpeg = StandardJpegCodec.compress(raster, quality)?;
        Ok(with_exif(&jpeg, &[Entry::Ascii(TAG_MODEL, self.0)], &[]))
    }
}

/// EXIF parser that panics on every call.
pub struct PanickingExif;

impl ExifParser for PanickingExif {
    fn parse(&self, _bytes: &[u8]) -> BackendResult<ExifFields> {
        panic!("EXIF parser bug")
    }
}
