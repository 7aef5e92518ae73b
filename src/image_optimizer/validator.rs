//! Source image validation
//!
//! Runs before any transformation work, cheapest check first:
//! signature sniff, byte size, dimension probe, dimension policy.

use bytes::Bytes;

use super::engine::TransformEngine;
use super::error::ImageError;
use super::sniff::{sniff, SourceFormat};
use crate::constants::{DEFAULT_MAX_HEIGHT, DEFAULT_MAX_IMAGE_SIZE, DEFAULT_MAX_WIDTH};

/// Limits applied to every source image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub max_size_bytes: usize,
    pub max_width: u32,
    pub max_height: u32,
    /// Downscale oversized sources instead of rejecting them
    pub resize_oversized: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_IMAGE_SIZE,
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            resize_oversized: true,
        }
    }
}

/// Outcome of validating one source image
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub valid: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Source size in bytes
    pub size: usize,
    /// Dimensions exceed the policy and the image must be downscaled first
    pub resized: bool,
    /// Rejection reason, only set when `valid` is false
    pub error: Option<ImageError>,
    pub format: Option<SourceFormat>,
    /// Source bytes carried forward to the engine
    pub bytes: Bytes,
}

impl ValidationResult {
    fn rejected(bytes: Bytes, format: Option<SourceFormat>, error: ImageError) -> Self {
        Self {
            valid: false,
            width: None,
            height: None,
            size: bytes.len(),
            resized: false,
            error: Some(error),
            format,
            bytes,
        }
    }

    /// Convert into a `Result`, surfacing the rejection reason
    pub fn into_result(self) -> Result<Self, ImageError> {
        match (&self.error, self.valid) {
            (_, true) => Ok(self),
            (Some(error), false) => Err(error.clone()),
            (None, false) => Err(ImageError::UnrecognizedFormat),
        }
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }
}

/// Validate `bytes` against `policy`, probing dimensions through `engine`
pub fn validate_image(bytes: Bytes, policy: &ValidationPolicy, engine: &TransformEngine) -> ValidationResult {
    // 1. Signature
    let Some(format) = sniff(&bytes) else {
        return ValidationResult::rejected(bytes, None, ImageError::UnrecognizedFormat);
    };

    // 2. Size
    if bytes.len() > policy.max_size_bytes {
        let error = ImageError::FileTooLarge {
            size: bytes.len(),
            max_size: policy.max_size_bytes,
        };
        return ValidationResult::rejected(bytes, Some(format), error);
    }

    // 3. Dimensions
    let (width, height) = match engine.probe_dimensions(&bytes, format) {
        Ok(dims) => dims,
        Err(error) => return ValidationResult::rejected(bytes, Some(format), error),
    };

    // 4. Policy
    let oversized = width > policy.max_width || height > policy.max_height;
    if oversized && !policy.resize_oversized {
        let mut result = ValidationResult::rejected(
            bytes,
            Some(format),
            ImageError::DimensionsExceeded {
                width,
                height,
                max_width: policy.max_width,
                max_height: policy.max_height,
            },
        );
        result.width = Some(width);
        result.height = Some(height);
        return result;
    }

    ValidationResult {
        valid: true,
        width: Some(width),
        height: Some(height),
        size: bytes.len(),
        resized: oversized,
        error: None,
        format: Some(format),
        bytes,
    }
}
