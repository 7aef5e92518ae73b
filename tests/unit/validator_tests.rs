// Source validation tests

use bytes::Bytes;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use kagami::image_optimizer::{
    sniff, validate_image, CodecRegistry, ImageError, SourceFormat, TransformEngine,
    ValidationPolicy,
};
use std::io::Cursor;
use std::sync::Arc;

fn engine() -> TransformEngine {
    TransformEngine::new(Arc::new(CodecRegistry::new()), 4096, 4096)
}

fn encode(width: u32, height: u32, format: ImageOutputFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 10, 10])));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}

#[test]
fn test_eleven_megabytes_rejected_against_ten_megabyte_limit() {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.resize(11 * 1024 * 1024, 0);
    assert_eq!(sniff(&data), Some(SourceFormat::Jpeg));

    let result = validate_image(Bytes::from(data), &ValidationPolicy::default(), &engine());
    assert!(!result.valid);
    assert_eq!(result.size, 11 * 1024 * 1024);

    let error = result.error.unwrap();
    assert_eq!(error.to_http_status(), 413);
    assert_eq!(
        error.to_string(),
        "Image size exceeds the maximum allowed size of 10MB"
    );
}

#[test]
fn test_gif_and_bmp_are_probed() {
    for (format, expected) in [
        (ImageOutputFormat::Gif, SourceFormat::Gif),
        (ImageOutputFormat::Bmp, SourceFormat::Bmp),
        (ImageOutputFormat::Png, SourceFormat::Png),
    ] {
        let result = validate_image(Bytes::from(encode(12, 7, format)), &ValidationPolicy::default(), &engine());
        assert!(result.valid, "{:?}", result.error);
        assert_eq!(result.format, Some(expected));
        assert_eq!(result.dimensions(), Some((12, 7)));
    }
}

#[test]
fn test_avif_source_dimensions_are_read() {
    let pixels = vec![rgb::RGBA8::new(20, 120, 200, 255); 12 * 7];
    let avif = ravif::Encoder::new()
        .with_speed(10)
        .encode_rgba(imgref::Img::new(&pixels[..], 12, 7))
        .unwrap()
        .avif_file;

    let result = validate_image(Bytes::from(avif), &ValidationPolicy::default(), &engine());
    assert!(result.valid, "{:?}", result.error);
    assert_eq!(result.format, Some(SourceFormat::Avif));
    assert_eq!(result.dimensions(), Some((12, 7)));
}

#[test]
fn test_corrupt_avif_source_is_rejected() {
    let mut data = b"\0\0\0\x20ftypavif".to_vec();
    data.resize(64, 0);
    let result = validate_image(Bytes::from(data), &ValidationPolicy::default(), &engine());
    assert!(!result.valid);
    assert_eq!(result.format, Some(SourceFormat::Avif));
    assert!(matches!(result.error, Some(ImageError::DimensionProbeFailed { .. })));
}

#[test]
fn test_result_carries_source_bytes() {
    let data = encode(4, 4, ImageOutputFormat::Png);
    let result = validate_image(Bytes::from(data.clone()), &ValidationPolicy::default(), &engine());
    assert_eq!(&result.bytes[..], &data[..]);
    assert_eq!(result.size, data.len());
}
