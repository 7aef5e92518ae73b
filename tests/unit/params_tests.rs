// Parameter normalisation tests

use kagami::image_optimizer::{CropRect, FitMode, OutputFormat, Position, TransformSpec};
use rstest::rstest;
use std::collections::HashMap;

fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_empty_query_only_sets_default_quality() {
    let spec = TransformSpec::from_query(&HashMap::new(), 90);
    assert_eq!(
        spec,
        TransformSpec {
            quality: Some(90),
            ..TransformSpec::empty()
        }
    );
}

#[test]
fn test_configured_default_quality_is_used() {
    let spec = TransformSpec::from_query(&HashMap::new(), 75);
    assert_eq!(spec.quality, Some(75));
}

#[test]
fn test_one_bad_field_does_not_affect_the_others() {
    let spec = TransformSpec::from_query(
        &query(&[
            ("width", "-5"),
            ("height", "300"),
            ("format", "tiff"),
            ("quality", "150"),
            ("fit", "cover"),
            ("crop", "1,2,3"),
        ]),
        90,
    );
    assert_eq!(spec.width, None);
    assert_eq!(spec.height, Some(300));
    assert_eq!(spec.format, None);
    // An explicit but invalid quality is dropped, not defaulted
    assert_eq!(spec.quality, None);
    assert_eq!(spec.fit, Some(FitMode::Cover));
    assert_eq!(spec.crop, None);
}

#[test]
fn test_full_query() {
    let spec = TransformSpec::from_query(
        &query(&[
            ("format", "avif"),
            ("quality", "70"),
            ("optimize", "true"),
            ("compressionLevel", "4"),
            ("width", "800"),
            ("height", "600"),
            ("fit", "contain"),
            ("position", "top"),
            ("rotate", "-90"),
            ("brightness", "10"),
            ("contrast", "-20"),
            ("grayscale", "true"),
            ("saturation", "100"),
            ("crop", "0,0,400,300"),
        ]),
        90,
    );
    assert_eq!(spec.format, Some(OutputFormat::Avif));
    assert_eq!(spec.quality, Some(70));
    assert!(spec.optimize);
    assert_eq!(spec.compression_level, Some(4));
    assert_eq!(spec.width, Some(800));
    assert_eq!(spec.height, Some(600));
    assert_eq!(spec.fit, Some(FitMode::Contain));
    assert_eq!(spec.position, Some(Position::Top));
    assert_eq!(spec.rotate, Some(-90));
    assert_eq!(spec.brightness, Some(10));
    assert_eq!(spec.contrast, Some(-20));
    assert!(spec.grayscale);
    assert_eq!(spec.saturation, Some(100));
    assert_eq!(
        spec.crop,
        Some(CropRect {
            x: 0,
            y: 0,
            width: 400,
            height: 300
        })
    );
}

#[rstest]
#[case("200px", Some(200))]
#[case("200", Some(200))]
#[case("0", None)]
#[case("-1", None)]
#[case("px200", None)]
#[case("", None)]
fn test_width_parsing(#[case] raw: &str, #[case] expected: Option<u32>) {
    let spec = TransformSpec::from_query(&query(&[("width", raw)]), 90);
    assert_eq!(spec.width, expected);
}

#[rstest]
#[case("0", Some(0))]
#[case("100", Some(100))]
#[case("101", None)]
#[case("-1", None)]
#[case("abc", None)]
fn test_quality_range(#[case] raw: &str, #[case] expected: Option<u8>) {
    let spec = TransformSpec::from_query(&query(&[("quality", raw)]), 90);
    assert_eq!(spec.quality, expected);
}

#[rstest]
#[case("-100", Some(-100))]
#[case("100", Some(100))]
#[case("101", None)]
#[case("-101", None)]
fn test_brightness_range(#[case] raw: &str, #[case] expected: Option<i32>) {
    let spec = TransformSpec::from_query(&query(&[("brightness", raw)]), 90);
    assert_eq!(spec.brightness, expected);
}

#[test]
fn test_flags_require_literal_true() {
    let spec = TransformSpec::from_query(&query(&[("optimize", "1"), ("grayscale", "TRUE")]), 90);
    assert!(!spec.optimize);
    assert!(!spec.grayscale);
}

#[test]
fn test_allow_lists_are_case_sensitive() {
    let spec = TransformSpec::from_query(
        &query(&[("format", "WEBP"), ("fit", "Cover"), ("position", "LEFT")]),
        90,
    );
    assert_eq!(spec.format, None);
    assert_eq!(spec.fit, None);
    assert_eq!(spec.position, None);
}

#[test]
fn test_compression_level_range() {
    let ok = TransformSpec::from_query(&query(&[("compressionLevel", "6")]), 90);
    assert_eq!(ok.compression_level, Some(6));
    let bad = TransformSpec::from_query(&query(&[("compressionLevel", "7")]), 90);
    assert_eq!(bad.compression_level, None);
}

#[test]
fn test_crop_rejects_negative_values() {
    let spec = TransformSpec::from_query(&query(&[("crop", "0,-1,10,10")]), 90);
    assert_eq!(spec.crop, None);
}

#[test]
fn test_crop_is_not_validated_against_image_bounds() {
    let spec = TransformSpec::from_query(&query(&[("crop", "5000,5000,10,10")]), 90);
    assert_eq!(spec.crop.map(|c| c.x), Some(5000));
}
