//! Transformation parameter parsing
//!
//! Query parameters arrive untrusted. Each field is parsed on its own and a
//! field that fails its check is dropped, so the resulting [`TransformSpec`]
//! is always usable and never an error:
//!
//! ```text
//! ?format=webp&width=200&crop=10,10,100,100&brightness=400
//! // -> format=webp, width=200, crop=(10,10,100,100), brightness dropped
//! ```

use std::collections::HashMap;
use std::str::FromStr;

use super::error::ImageError;

/// Output image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Png,
    Jpeg,
    WebP,
    Avif,
    Jxl,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::WebP => "webp",
            Self::Avif => "avif",
            Self::Jxl => "jxl",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
            Self::Jxl => "image/jxl",
        }
    }

    /// Formats every browser decodes and the raster engine encodes natively
    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Png | Self::Jpeg | Self::WebP)
    }
}

impl FromStr for OutputFormat {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" => Ok(OutputFormat::Png),
            "jpeg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::WebP),
            "avif" => Ok(OutputFormat::Avif),
            "jxl" => Ok(OutputFormat::Jxl),
            _ => Err(ImageError::invalid_param(
                "format",
                format!("unknown format: {}", s),
            )),
        }
    }
}

/// How to fit the image within target dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    /// Scale to fit inside the box, preserving aspect ratio
    Contain,
    /// Scale to cover the box, then crop the overflow around `position`
    Cover,
    /// Stretch to the exact box (may distort)
    Fill,
}

impl FitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contain => "contain",
            Self::Cover => "cover",
            Self::Fill => "fill",
        }
    }
}

impl FromStr for FitMode {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contain" => Ok(FitMode::Contain),
            "cover" => Ok(FitMode::Cover),
            "fill" => Ok(FitMode::Fill),
            _ => Err(ImageError::invalid_param(
                "fit",
                format!("unknown fit mode: {}", s),
            )),
        }
    }
}

/// Anchor used when `fit=cover` has to discard pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Center,
    Top,
    Bottom,
    Left,
    Right,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl FromStr for Position {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "center" => Ok(Position::Center),
            "top" => Ok(Position::Top),
            "bottom" => Ok(Position::Bottom),
            "left" => Ok(Position::Left),
            "right" => Ok(Position::Right),
            _ => Err(ImageError::invalid_param(
                "position",
                format!("unknown position: {}", s),
            )),
        }
    }
}

/// Absolute crop rectangle in source pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FromStr for CropRect {
    type Err = ImageError;

    /// Parses `x,y,width,height`. Exactly four non-negative numbers are
    /// required; fractional values are truncated to whole pixels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return Err(ImageError::invalid_param(
                "crop",
                "expected x,y,width,height",
            ));
        }

        let mut values = [0u32; 4];
        for (slot, part) in values.iter_mut().zip(parts) {
            let part = part.trim();
            let n: f64 = part
                .parse()
                .map_err(|_| ImageError::invalid_param("crop", format!("not a number: {part}")))?;
            if !n.is_finite() || n < 0.0 || n > u32::MAX as f64 {
                return Err(ImageError::invalid_param("crop", "values must be non-negative"));
            }
            *slot = n.trunc() as u32;
        }

        Ok(CropRect {
            x: values[0],
            y: values[1],
            width: values[2],
            height: values[3],
        })
    }
}

impl std::fmt::Display for CropRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Canonical, validated set of requested image operations for one request
///
/// Built once per request by [`TransformSpec::from_query`] and never mutated
/// afterwards. `None` (or `false`) means "no-op on that axis".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSpec {
    // === Format & Quality ===
    /// Explicit output format; overrides content negotiation
    pub format: Option<OutputFormat>,
    /// Output quality (0-100)
    pub quality: Option<u8>,
    /// Run lossless optimisation on the encoded output
    pub optimize: bool,
    /// Optimisation level (0-6)
    pub compression_level: Option<u8>,

    // === Resize ===
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Option<FitMode>,
    pub position: Option<Position>,

    // === Effects ===
    /// Rotation in signed degrees
    pub rotate: Option<i32>,
    pub brightness: Option<i32>,
    pub contrast: Option<i32>,
    pub grayscale: bool,
    pub saturation: Option<i32>,

    // === Crop ===
    pub crop: Option<CropRect>,
}

impl Default for TransformSpec {
    fn default() -> Self {
        Self {
            format: None,
            quality: Some(crate::constants::DEFAULT_QUALITY),
            optimize: false,
            compression_level: None,
            width: None,
            height: None,
            fit: None,
            position: None,
            rotate: None,
            brightness: None,
            contrast: None,
            grayscale: false,
            saturation: None,
            crop: None,
        }
    }
}

impl TransformSpec {
    /// A spec with no fields at all, not even the default quality.
    pub fn empty() -> Self {
        Self {
            quality: None,
            ..Self::default()
        }
    }

    /// Parse from query parameters (e.g. `?width=800&format=webp`)
    ///
    /// Never fails: a field with an unparseable or out-of-range value is
    /// simply left out.
    pub fn from_query(params: &HashMap<String, String>, default_quality: u8) -> Self {
        let mut spec = Self::empty();

        // Format and quality
        spec.format = params.get("format").and_then(|f| f.parse().ok());
        spec.quality = match params.get("quality") {
            Some(q) => parse_int(q)
                .filter(|q| (0..=100).contains(q))
                .map(|q| q as u8),
            None => Some(default_quality),
        };

        // PNG optimisation
        if let Some(optimize) = params.get("optimize") {
            spec.optimize = optimize == "true";
        }
        spec.compression_level = params
            .get("compressionLevel")
            .and_then(|l| parse_int(l))
            .filter(|l| (0..=6).contains(l))
            .map(|l| l as u8);

        // Resize
        spec.width = params.get("width").and_then(|w| parse_positive(w));
        spec.height = params.get("height").and_then(|h| parse_positive(h));
        spec.fit = params.get("fit").and_then(|f| f.parse().ok());
        spec.position = params.get("position").and_then(|p| p.parse().ok());

        // Rotation
        spec.rotate = params
            .get("rotate")
            .and_then(|r| parse_int(r))
            .and_then(|r| i32::try_from(r).ok());

        // Brightness, contrast, saturation
        spec.brightness = params.get("brightness").and_then(|b| parse_signed_percent(b));
        spec.contrast = params.get("contrast").and_then(|c| parse_signed_percent(c));
        spec.saturation = params.get("saturation").and_then(|s| parse_signed_percent(s));

        if let Some(grayscale) = params.get("grayscale") {
            spec.grayscale = grayscale == "true";
        }

        // Crop
        spec.crop = params.get("crop").and_then(|c| c.parse().ok());

        spec
    }

    /// True when any pixel operation (as opposed to a pure re-encode) is requested
    pub fn has_raster_operations(&self) -> bool {
        self.wants_resize()
            || self.rotate.is_some_and(|r| r != 0)
            || self.brightness.is_some_and(|b| b != 0)
            || self.contrast.is_some_and(|c| c != 0)
            || self.saturation.is_some_and(|s| s != 0)
            || self.grayscale
            || self.crop.is_some()
    }

    pub fn wants_resize(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }

    /// PNG optimisation level, defaulting to 2 when optimisation is on
    pub fn effective_compression_level(&self) -> u8 {
        self.compression_level
            .unwrap_or(crate::constants::DEFAULT_COMPRESSION_LEVEL)
    }

    pub fn effective_quality(&self) -> u8 {
        self.quality.unwrap_or(crate::constants::DEFAULT_QUALITY)
    }
}

/// Leading-integer parse: optional sign then digits, trailing garbage ignored.
/// `"200px"` parses as 200, `"px200"` does not parse.
fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

fn parse_positive(s: &str) -> Option<u32> {
    parse_int(s)
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
}

fn parse_signed_percent(s: &str) -> Option<i32> {
    parse_int(s)
        .filter(|v| (-100..=100).contains(v))
        .map(|v| v as i32)
}
