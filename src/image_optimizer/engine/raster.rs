//! Built-in raster engine backed by the `image` crate
//!
//! Decodes JPEG, PNG, WebP, GIF, BMP and TIFF. Encodes PNG, JPEG and
//! lossless WebP only.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::io::Reader as ImageReader;
use image::{DynamicImage, ImageOutputFormat};

use super::{Engine, PixelBuffer};
use crate::image_optimizer::error::ImageError;
use crate::image_optimizer::params::{OutputFormat, TransformSpec};
use crate::image_optimizer::sniff::SourceFormat;

#[derive(Debug, Default)]
pub struct RasterEngine;

impl RasterEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for RasterEngine {
    fn name(&self) -> &'static str {
        "raster"
    }

    fn probe_dimensions(&self, bytes: &[u8], _format: SourceFormat) -> Result<(u32, u32), ImageError> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ImageError::decode_failed(e.to_string()))?
            .into_dimensions()
            .map_err(|e| ImageError::decode_failed(e.to_string()))
    }

    fn decode(&self, bytes: &[u8], _format: SourceFormat) -> Result<PixelBuffer, ImageError> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ImageError::decode_failed(e.to_string()))?
            .decode()
            .map(PixelBuffer::new)
            .map_err(|e| ImageError::decode_failed(e.to_string()))
    }

    fn encode(
        &self,
        buffer: PixelBuffer,
        format: OutputFormat,
        spec: &TransformSpec,
    ) -> Result<Vec<u8>, ImageError> {
        let img = buffer.into_image();
        match format {
            OutputFormat::Png => encode_png(&img),
            OutputFormat::Jpeg => encode_jpeg(&img, spec.effective_quality()),
            OutputFormat::WebP => encode_webp_lossless(&img),
            OutputFormat::Avif | OutputFormat::Jxl => {
                Err(ImageError::encode_failed(format.as_str(), "not supported by raster engine"))
            }
        }
    }
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Png)
        .map_err(|e| ImageError::encode_failed("png", e.to_string()))?;
    Ok(buffer)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| ImageError::encode_failed("jpeg", e.to_string()))?;
    Ok(buffer)
}

fn encode_webp_lossless(img: &DynamicImage) -> Result<Vec<u8>, ImageError> {
    let rgba = img.to_rgba8();
    let encoded = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height()).encode_lossless();
    Ok(encoded.to_vec())
}
