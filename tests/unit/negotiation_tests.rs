// Format negotiation tests

use kagami::image_optimizer::{negotiate_format, resolve_format, vary_header, OutputFormat};
use rstest::rstest;

#[rstest]
#[case(Some("image/jxl,image/avif,image/webp,*/*"), OutputFormat::Jxl)]
#[case(Some("image/avif,image/webp,image/apng,*/*;q=0.8"), OutputFormat::Avif)]
#[case(Some("image/webp,*/*"), OutputFormat::WebP)]
#[case(Some("image/jpeg"), OutputFormat::Jpeg)]
#[case(Some("IMAGE/WEBP"), OutputFormat::WebP)]
#[case(Some("*/*"), OutputFormat::Png)]
#[case(Some(""), OutputFormat::Png)]
#[case(None, OutputFormat::Png)]
fn test_negotiate_format(#[case] accept: Option<&str>, #[case] expected: OutputFormat) {
    assert_eq!(negotiate_format(accept), expected);
}

#[test]
fn test_priority_ignores_header_order() {
    assert_eq!(
        negotiate_format(Some("image/webp, image/avif")),
        OutputFormat::Avif
    );
}

#[test]
fn test_explicit_format_overrides_accept() {
    assert_eq!(
        resolve_format(Some(OutputFormat::Jpeg), Some("image/avif")),
        OutputFormat::Jpeg
    );
    assert_eq!(resolve_format(None, Some("image/avif")), OutputFormat::Avif);
}

#[test]
fn test_vary_header() {
    assert_eq!(vary_header(), "Accept");
}
