//! Image transformation module
//!
//! Provides the per-request image work:
//! - Query parameter normalisation into a [`TransformSpec`]
//! - Output format negotiation from the Accept header
//! - Source validation (signature, size, dimensions)
//! - Two transform engines with codec-to-raster fallback
//!
//! # Query Parameters
//!
//! ```text
//! /photos/cat.jpg?width=800&height=600&fit=cover&position=top&format=avif&quality=70
//! /photos/cat.jpg?rotate=90&grayscale=true&crop=0,0,400,400
//! /icons/logo.png?optimize=true&compressionLevel=4
//! ```

// Core modules
pub mod engine;
pub mod error;
pub mod format;
pub mod params;
pub mod registry;
pub mod sniff;
pub mod validator;

// Re-export commonly used types
pub use engine::{
    plan_for, Engine, EnginePlan, Operation, PixelBuffer, TransformEngine, TransformOutput,
};
pub use error::ImageError;
pub use format::{negotiate_format, resolve_format, vary_header};
pub use params::{CropRect, FitMode, OutputFormat, Position, TransformSpec};
pub use registry::{Codec, CodecRegistry, CodecState};
pub use sniff::{sniff, SourceFormat};
pub use validator::{validate_image, ValidationPolicy, ValidationResult};
