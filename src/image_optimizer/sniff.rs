//! Magic-byte format detection
//!
//! Signature table checked in order; the first match wins. Inputs shorter
//! than [`MIN_SNIFF_LEN`] bytes never match.

/// Minimum number of bytes needed before any signature is trusted
pub const MIN_SNIFF_LEN: usize = 8;

/// Source image format as identified by its leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Gif,
    Jpeg2000,
    JpegXl,
    Bmp,
    Tiff,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
            Self::Gif => "gif",
            Self::Jpeg2000 => "jp2",
            Self::JpegXl => "jxl",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }

    /// Matching `image` crate format, when that crate can decode it
    pub fn raster_format(&self) -> Option<image::ImageFormat> {
        match self {
            Self::Jpeg => Some(image::ImageFormat::Jpeg),
            Self::Png => Some(image::ImageFormat::Png),
            Self::WebP => Some(image::ImageFormat::WebP),
            Self::Gif => Some(image::ImageFormat::Gif),
            Self::Bmp => Some(image::ImageFormat::Bmp),
            Self::Tiff => Some(image::ImageFormat::Tiff),
            Self::Avif | Self::Jpeg2000 | Self::JpegXl => None,
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JP2_SIGNATURE: [u8; 8] = [0x00, 0x00, 0x00, 0x0C, b'j', b'P', b' ', b' '];
const JXL_CONTAINER_SIGNATURE: [u8; 8] = [0x00, 0x00, 0x00, 0x0C, b'J', b'X', b'L', b' '];

/// Identify the image format from its leading bytes
pub fn sniff(bytes: &[u8]) -> Option<SourceFormat> {
    if bytes.len() < MIN_SNIFF_LEN {
        return None;
    }

    if bytes.starts_with(&[0xFF, 0xD8]) {
        return Some(SourceFormat::Jpeg);
    }
    if bytes.starts_with(&PNG_SIGNATURE) {
        return Some(SourceFormat::Png);
    }
    if bytes.starts_with(b"RIFF") && bytes.len() >= 12 {
        match &bytes[8..12] {
            b"WEBP" => return Some(SourceFormat::WebP),
            b"avif" => return Some(SourceFormat::Avif),
            _ => {}
        }
    }
    // ISOBMFF: size(4) "ftyp" major-brand(4)
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        match &bytes[8..12] {
            b"avif" | b"avis" => return Some(SourceFormat::Avif),
            _ => {}
        }
    }
    if bytes.starts_with(b"GIF8") && matches!(bytes[4], b'7' | b'9') && bytes[5] == b'a' {
        return Some(SourceFormat::Gif);
    }
    if bytes.starts_with(&JP2_SIGNATURE) {
        return Some(SourceFormat::Jpeg2000);
    }
    if bytes.starts_with(&[0xFF, 0x0A]) || bytes.starts_with(&JXL_CONTAINER_SIGNATURE) {
        return Some(SourceFormat::JpegXl);
    }
    if bytes.starts_with(b"BM") {
        return Some(SourceFormat::Bmp);
    }
    if bytes.starts_with(&[b'I', b'I', 0x2A, 0x00]) || bytes.starts_with(&[b'M', b'M', 0x00, 0x2A])
    {
        return Some(SourceFormat::Tiff);
    }

    None
}
