//! Image transformation error types
//!
//! Structured errors with HTTP status mapping. Validation failures carry the
//! exact client-facing message; engine failures are only ever logged.

use std::fmt;

/// Errors that can occur while validating or transforming an image
#[derive(Debug, Clone, PartialEq)]
pub enum ImageError {
    // === Validation Errors ===
    /// Magic bytes matched no known image signature
    UnrecognizedFormat,
    /// Input exceeds the configured byte limit
    FileTooLarge { size: usize, max_size: usize },
    /// Pixel dimensions exceed the configured limit and downscaling is disabled
    DimensionsExceeded {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },
    /// Neither engine could read the image header
    DimensionProbeFailed { message: String },

    // === Decoding Errors ===
    /// Engine cannot decode this source format
    UnsupportedFormat { format: String },
    /// Failed to decode image data
    DecodeFailed { message: String },

    // === Processing Errors ===
    /// Resize operation failed
    ResizeFailed { message: String },
    /// Encoding to output format failed
    EncodeFailed { format: String, message: String },
    /// A codec module could not be initialised
    CodecUnavailable { codec: String, message: String },
    /// Transformation task panicked or was cancelled
    TaskFailed { message: String },
    /// Primary path and its fallback both failed
    FallbackExhausted {
        primary: Box<ImageError>,
        fallback: Box<ImageError>,
    },

    // === Parameter Errors ===
    /// Invalid transformation parameter
    InvalidParameter { param: String, message: String },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Validation errors
            ImageError::UnrecognizedFormat => {
                write!(f, "Invalid image format or corrupted image data")
            }
            ImageError::FileTooLarge { max_size, .. } => {
                let mb = *max_size as f64 / (1024.0 * 1024.0);
                if mb.fract() == 0.0 {
                    write!(f, "Image size exceeds the maximum allowed size of {}MB", mb as u64)
                } else {
                    write!(f, "Image size exceeds the maximum allowed size of {:.2}MB", mb)
                }
            }
            ImageError::DimensionsExceeded {
                width,
                height,
                max_width,
                max_height,
            } => {
                write!(
                    f,
                    "Image dimensions ({}x{}) exceed the maximum allowed ({}x{})",
                    width, height, max_width, max_height
                )
            }
            ImageError::DimensionProbeFailed { message } => {
                write!(f, "Failed to determine image dimensions: {}", message)
            }

            // Decoding errors
            ImageError::UnsupportedFormat { format } => {
                write!(f, "Unsupported image format: {}", format)
            }
            ImageError::DecodeFailed { message } => {
                write!(f, "Failed to decode image: {}", message)
            }

            // Processing errors
            ImageError::ResizeFailed { message } => {
                write!(f, "Resize failed: {}", message)
            }
            ImageError::EncodeFailed { format, message } => {
                write!(f, "Failed to encode to {}: {}", format, message)
            }
            ImageError::CodecUnavailable { codec, message } => {
                write!(f, "Codec {} unavailable: {}", codec, message)
            }
            ImageError::TaskFailed { message } => {
                write!(f, "Transform task failed: {}", message)
            }
            ImageError::FallbackExhausted { primary, fallback } => {
                write!(f, "primary: {}; fallback: {}", primary, fallback)
            }

            // Parameter errors
            ImageError::InvalidParameter { param, message } => {
                write!(f, "Invalid parameter '{}': {}", param, message)
            }
        }
    }
}

impl std::error::Error for ImageError {}

impl ImageError {
    /// Maps image errors to HTTP status codes
    ///
    /// - UnrecognizedFormat, UnsupportedFormat → 415
    /// - FileTooLarge → 413
    /// - DimensionsExceeded, DimensionProbeFailed, InvalidParameter → 400
    /// - everything produced by the engines → 500
    pub fn to_http_status(&self) -> u16 {
        match self {
            // 415 Unsupported Media Type
            ImageError::UnrecognizedFormat | ImageError::UnsupportedFormat { .. } => 415,

            // 413 Payload Too Large
            ImageError::FileTooLarge { .. } => 413,

            // 400 Bad Request
            ImageError::DimensionsExceeded { .. }
            | ImageError::DimensionProbeFailed { .. }
            | ImageError::InvalidParameter { .. } => 400,

            // 500 Internal Server Error
            ImageError::DecodeFailed { .. }
            | ImageError::ResizeFailed { .. }
            | ImageError::EncodeFailed { .. }
            | ImageError::CodecUnavailable { .. }
            | ImageError::TaskFailed { .. }
            | ImageError::FallbackExhausted { .. } => 500,
        }
    }

    /// True for failures caused by the request rather than by the service
    pub fn is_client_error(&self) -> bool {
        self.to_http_status() < 500
    }

    /// Helper constructors for common error patterns
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        ImageError::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        ImageError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(message: impl Into<String>) -> Self {
        ImageError::ResizeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        ImageError::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn codec_unavailable(codec: impl Into<String>, message: impl Into<String>) -> Self {
        ImageError::CodecUnavailable {
            codec: codec.into(),
            message: message.into(),
        }
    }

    pub fn fallback_exhausted(primary: ImageError, fallback: ImageError) -> Self {
        ImageError::FallbackExhausted {
            primary: Box::new(primary),
            fallback: Box::new(fallback),
        }
    }

    pub fn invalid_param(param: impl Into<String>, message: impl Into<String>) -> Self {
        ImageError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }
}
