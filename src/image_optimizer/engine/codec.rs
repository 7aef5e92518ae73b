//! Format-breadth codec engine
//!
//! Dedicated codecs per format:
//!
//! | Format | Decode  | Encode                        |
//! |--------|---------|-------------------------------|
//! | JPEG   | image   | mozjpeg                       |
//! | PNG    | image   | image, then oxipng (optimize) |
//! | WebP   | libwebp | libwebp (lossy)               |
//! | AVIF   | rav1d   | ravif                         |
//! | JXL    | jxl-oxide | zune-jpegxl (lossless)      |
//!
//! Every encoder, and the AVIF and JXL decoders, is brought up through the
//! [`CodecRegistry`] before use.

use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use image::io::Reader as ImageReader;
use image::{DynamicImage, ImageOutputFormat, RgbImage, RgbaImage};
use rgb::FromSlice;

use super::{av1, Engine, PixelBuffer};
use crate::image_optimizer::error::ImageError;
use crate::image_optimizer::params::{OutputFormat, TransformSpec};
use crate::image_optimizer::registry::{Codec, CodecRegistry};
use crate::image_optimizer::sniff::SourceFormat;

/// AVIF encoder speed (1 slowest .. 10 fastest)
const AVIF_SPEED: u8 = 6;

pub struct CodecEngine {
    registry: Arc<CodecRegistry>,
}

impl CodecEngine {
    pub fn new(registry: Arc<CodecRegistry>) -> Self {
        Self { registry }
    }
}

impl Engine for CodecEngine {
    fn name(&self) -> &'static str {
        "codec"
    }

    fn probe_dimensions(&self, bytes: &[u8], format: SourceFormat) -> Result<(u32, u32), ImageError> {
        match format {
            SourceFormat::WebP => webp::BitstreamFeatures::new(bytes)
                .map(|features| (features.width(), features.height()))
                .ok_or_else(|| ImageError::decode_failed("invalid WebP bitstream")),
            SourceFormat::Avif => {
                self.registry.ensure(Codec::Rav1d)?;
                av1::avif_dimensions(bytes)
            }
            SourceFormat::JpegXl => {
                self.registry.ensure(Codec::JxlOxide)?;
                let image = read_jxl(bytes)?;
                Ok((image.width(), image.height()))
            }
            other => {
                let image_format = other
                    .raster_format()
                    .ok_or_else(|| ImageError::unsupported_format(other.as_str()))?;
                ImageReader::with_format(Cursor::new(bytes), image_format)
                    .into_dimensions()
                    .map_err(|e| ImageError::decode_failed(e.to_string()))
            }
        }
    }

    fn decode(&self, bytes: &[u8], format: SourceFormat) -> Result<PixelBuffer, ImageError> {
        match format {
            SourceFormat::WebP => decode_webp(bytes),
            SourceFormat::Avif => {
                self.registry.ensure(Codec::Rav1d)?;
                av1::decode_avif(bytes).map(PixelBuffer::new)
            }
            SourceFormat::JpegXl => {
                self.registry.ensure(Codec::JxlOxide)?;
                decode_jxl(bytes).map(PixelBuffer::new)
            }
            other => {
                let image_format = other
                    .raster_format()
                    .ok_or_else(|| ImageError::unsupported_format(other.as_str()))?;
                image::load_from_memory_with_format(bytes, image_format)
                    .map(PixelBuffer::new)
                    .map_err(|e| ImageError::decode_failed(e.to_string()))
            }
        }
    }

    fn encode(
        &self,
        buffer: PixelBuffer,
        format: OutputFormat,
        spec: &TransformSpec,
    ) -> Result<Vec<u8>, ImageError> {
        let quality = spec.effective_quality();
        let img = buffer.into_image();
        let (width, height) = (img.width(), img.height());

        match format {
            OutputFormat::Jpeg => {
                self.registry.ensure(Codec::Mozjpeg)?;
                let rgb = img.to_rgb8();
                drop(img);
                encode_mozjpeg(rgb.as_raw(), width, height, quality)
            }
            OutputFormat::Png => {
                let level = if spec.optimize {
                    self.registry.ensure(Codec::Oxipng)?;
                    Some(spec.effective_compression_level())
                } else {
                    None
                };
                let rgba = img.to_rgba8();
                drop(img);
                encode_png(rgba.as_raw(), width, height, level)
            }
            OutputFormat::WebP => {
                self.registry.ensure(Codec::WebP)?;
                let rgba = img.to_rgba8();
                drop(img);
                encode_webp_lossy(rgba.as_raw(), width, height, quality)
            }
            OutputFormat::Avif => {
                self.registry.ensure(Codec::Avif)?;
                let rgba = img.to_rgba8();
                drop(img);
                encode_avif(rgba.as_raw(), width, height, quality)
            }
            OutputFormat::Jxl => {
                self.registry.ensure(Codec::JpegXl)?;
                let rgba = img.to_rgba8();
                drop(img);
                encode_jxl(rgba.as_raw(), width, height)
            }
        }
    }
}

fn decode_webp(bytes: &[u8]) -> Result<PixelBuffer, ImageError> {
    let decoded = webp::Decoder::new(bytes)
        .decode()
        .ok_or_else(|| ImageError::decode_failed("invalid WebP data"))?;
    let (width, height) = (decoded.width(), decoded.height());

    let image = if decoded.is_alpha() {
        RgbaImage::from_raw(width, height, decoded.to_vec()).map(DynamicImage::ImageRgba8)
    } else {
        RgbImage::from_raw(width, height, decoded.to_vec()).map(DynamicImage::ImageRgb8)
    };
    image
        .map(PixelBuffer::new)
        .ok_or_else(|| ImageError::decode_failed("WebP buffer size mismatch"))
}

fn read_jxl(bytes: &[u8]) -> Result<jxl_oxide::JxlImage, ImageError> {
    jxl_oxide::JxlImage::builder()
        .read(Cursor::new(bytes))
        .map_err(|e| ImageError::decode_failed(format!("invalid JPEG XL data: {}", e)))
}

/// Render the first frame of a JPEG XL image to 8-bit samples
pub(crate) fn decode_jxl(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    let image = read_jxl(bytes)?;
    let render = image
        .render_frame(0)
        .map_err(|e| ImageError::decode_failed(format!("JPEG XL render failed: {}", e)))?;

    let mut stream = render.stream();
    let (width, height, channels) = (stream.width(), stream.height(), stream.channels() as usize);
    let mut samples = vec![0f32; width as usize * height as usize * channels];
    stream.write_to_buffer(&mut samples);

    let to_u8 = |v: &f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
    let rgba: Vec<u8> = match channels {
        1 => samples
            .iter()
            .flat_map(|v| {
                let g = to_u8(v);
                [g, g, g, 255]
            })
            .collect(),
        2 => samples
            .chunks_exact(2)
            .flat_map(|c| {
                let g = to_u8(&c[0]);
                [g, g, g, to_u8(&c[1])]
            })
            .collect(),
        3 => samples
            .chunks_exact(3)
            .flat_map(|c| [to_u8(&c[0]), to_u8(&c[1]), to_u8(&c[2]), 255])
            .collect(),
        4 => samples.iter().map(to_u8).collect(),
        n => {
            return Err(ImageError::decode_failed(format!(
                "unsupported JPEG XL channel count {}",
                n
            )))
        }
    };

    RgbaImage::from_raw(width, height, rgba)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| ImageError::decode_failed("JPEG XL buffer size mismatch"))
}

/// Encode interleaved RGB8 with mozjpeg
pub(crate) fn encode_mozjpeg(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, ImageError> {
    // libjpeg reports fatal errors by unwinding
    let result = panic::catch_unwind(AssertUnwindSafe(|| -> std::io::Result<Vec<u8>> {
        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality.clamp(1, 100) as f32);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp.start_compress(Vec::new())?;
        comp.write_scanlines(rgb)?;
        comp.finish()
    }));

    match result {
        Ok(Ok(data)) => Ok(data),
        Ok(Err(e)) => Err(ImageError::encode_failed("jpeg", e.to_string())),
        Err(_) => Err(ImageError::encode_failed("jpeg", "mozjpeg aborted")),
    }
}

/// Encode RGBA8 as PNG, optionally re-optimised by oxipng at `level`
pub(crate) fn encode_png(
    rgba: &[u8],
    width: u32,
    height: u32,
    level: Option<u8>,
) -> Result<Vec<u8>, ImageError> {
    let img = RgbaImage::from_raw(width, height, rgba.to_vec())
        .ok_or_else(|| ImageError::encode_failed("png", "buffer size mismatch"))?;

    let mut encoded = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut encoded), ImageOutputFormat::Png)
        .map_err(|e| ImageError::encode_failed("png", e.to_string()))?;

    match level {
        Some(level) => {
            let options = oxipng::Options::from_preset(level.min(6));
            oxipng::optimize_from_memory(&encoded, &options)
                .map_err(|e| ImageError::encode_failed("png", e.to_string()))
        }
        None => Ok(encoded),
    }
}

/// Lossy WebP through libwebp
pub(crate) fn encode_webp_lossy(rgba: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, ImageError> {
    if rgba.len() != width as usize * height as usize * 4 {
        return Err(ImageError::encode_failed("webp", "buffer size mismatch"));
    }
    let encoded = webp::Encoder::from_rgba(rgba, width, height).encode(quality as f32);
    Ok(encoded.to_vec())
}

pub(crate) fn encode_avif(rgba: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, ImageError> {
    if rgba.len() != width as usize * height as usize * 4 {
        return Err(ImageError::encode_failed("avif", "buffer size mismatch"));
    }
    let img = imgref::Img::new(rgba.as_rgba(), width as usize, height as usize);
    ravif::Encoder::new()
        .with_quality(quality.clamp(1, 100) as f32)
        .with_speed(AVIF_SPEED)
        .encode_rgba(img)
        .map(|encoded| encoded.avif_file)
        .map_err(|e| ImageError::encode_failed("avif", e.to_string()))
}

/// Lossless JPEG XL through zune-jpegxl
///
/// The encoder has no lossy mode, so `quality` does not apply to JXL output.
pub(crate) fn encode_jxl(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ImageError> {
    use zune_core::bit_depth::BitDepth;
    use zune_core::colorspace::ColorSpace;
    use zune_core::options::EncoderOptions;
    use zune_jpegxl::JxlSimpleEncoder;

    if rgba.len() != width as usize * height as usize * 4 {
        return Err(ImageError::encode_failed("jxl", "buffer size mismatch"));
    }
    let options = EncoderOptions::new(width as usize, height as usize, ColorSpace::RGBA, BitDepth::Eight);
    JxlSimpleEncoder::new(rgba, options)
        .encode()
        .map_err(|e| ImageError::encode_failed("jxl", format!("{:?}", e)))
}
