//! Transform engines
//!
//! Two engines sit behind the [`Engine`] capability trait:
//!
//! - [`RasterEngine`]: fast built-in decode/encode for the legacy web formats
//! - [`CodecEngine`]: per-format codecs covering every output format
//!
//! [`plan_for`] picks the strategy for a request and [`TransformEngine`] runs
//! it, falling back from the codec decoder to the raster decoder when needed.

pub(crate) mod av1;
pub mod codec;
pub mod ops;
pub mod raster;

use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, warn};

use super::error::ImageError;
use super::params::{OutputFormat, TransformSpec};
use super::registry::CodecRegistry;
use super::sniff::SourceFormat;
use super::validator::ValidationResult;

pub use codec::CodecEngine;
pub use ops::{clamp_resize, plan_operations, Operation};
pub use raster::RasterEngine;

/// Decoded pixels owned by exactly one stage of the pipeline at a time
///
/// Operations take the buffer by value and hand back a new one, so the
/// previous intermediate is released as soon as the next one exists.
#[derive(Debug)]
pub struct PixelBuffer {
    image: DynamicImage,
}

impl PixelBuffer {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }
}

/// Capability surface shared by both engines
pub trait Engine: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Read width and height without decoding pixel data
    fn probe_dimensions(&self, bytes: &[u8], format: SourceFormat)
        -> Result<(u32, u32), ImageError>;

    fn decode(&self, bytes: &[u8], format: SourceFormat) -> Result<PixelBuffer, ImageError>;

    fn encode(
        &self,
        buffer: PixelBuffer,
        format: OutputFormat,
        spec: &TransformSpec,
    ) -> Result<Vec<u8>, ImageError>;
}

/// Engine strategy for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePlan {
    /// Raster decode, raster ops, raster encode. No fallback.
    RasterOnly,
    /// Codec decode (raster decode on failure), raster ops, codec encode
    Hybrid,
}

/// Choose the engine strategy for a target format
pub fn plan_for(format: OutputFormat, optimize: bool) -> EnginePlan {
    if format.is_legacy() && !optimize {
        EnginePlan::RasterOnly
    } else {
        EnginePlan::Hybrid
    }
}

/// Result of a successful transformation
#[derive(Debug)]
pub struct TransformOutput {
    pub data: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub plan: EnginePlan,
    /// The codec decoder failed and the raster decoder was used instead
    pub used_fallback: bool,
    /// Operations actually applied, in order
    pub operations: Vec<Operation>,
}

/// Runs engine plans over validated source bytes
pub struct TransformEngine {
    raster: Arc<dyn Engine>,
    codec: Arc<dyn Engine>,
    max_width: u32,
    max_height: u32,
}

impl TransformEngine {
    pub fn new(registry: Arc<CodecRegistry>, max_width: u32, max_height: u32) -> Self {
        Self::from_engines(
            Arc::new(RasterEngine::new()),
            Arc::new(CodecEngine::new(registry)),
            max_width,
            max_height,
        )
    }

    /// Build from explicit engines (tests substitute failing ones)
    pub fn from_engines(
        raster: Arc<dyn Engine>,
        codec: Arc<dyn Engine>,
        max_width: u32,
        max_height: u32,
    ) -> Self {
        Self {
            raster,
            codec,
            max_width,
            max_height,
        }
    }

    /// Probe dimensions with the codec engine, then the raster engine
    pub fn probe_dimensions(&self, bytes: &[u8], format: SourceFormat) -> Result<(u32, u32), ImageError> {
        match self.codec.probe_dimensions(bytes, format) {
            Ok(dims) => Ok(dims),
            Err(primary) => {
                debug!(engine = self.codec.name(), error = %primary, "Dimension probe failed, trying raster engine");
                self.raster.probe_dimensions(bytes, format).map_err(|fallback| {
                    debug!(engine = self.raster.name(), error = %fallback, "Dimension probe failed");
                    ImageError::DimensionProbeFailed {
                        message: primary.to_string(),
                    }
                })
            }
        }
    }

    /// Decode, apply the requested operations and encode to `target`
    pub fn transform(
        &self,
        validation: &ValidationResult,
        spec: &TransformSpec,
        target: OutputFormat,
    ) -> Result<TransformOutput, ImageError> {
        let format = validation
            .format
            .ok_or(ImageError::UnrecognizedFormat)?;
        let bytes = validation.bytes.as_ref();
        let plan = plan_for(target, spec.optimize);

        let (decoded, encoder, used_fallback) = match plan {
            // Sources the raster engine cannot read still decode through the codecs
            EnginePlan::RasterOnly if format.raster_format().is_none() => {
                (self.codec.decode(bytes, format)?, &self.raster, false)
            }
            EnginePlan::RasterOnly => (self.raster.decode(bytes, format)?, &self.raster, false),
            EnginePlan::Hybrid => match self.codec.decode(bytes, format) {
                Ok(buffer) => (buffer, &self.codec, false),
                Err(primary) => {
                    warn!(
                        engine = self.codec.name(),
                        source_format = %format,
                        error = %primary,
                        "Codec decode failed, falling back to raster decode"
                    );
                    match self.raster.decode(bytes, format) {
                        Ok(buffer) => (buffer, &self.codec, true),
                        Err(fallback) => {
                            return Err(ImageError::fallback_exhausted(primary, fallback))
                        }
                    }
                }
            },
        };

        let bound = validation
            .resized
            .then_some((self.max_width, self.max_height));
        let mut operations = plan_operations(spec, (decoded.width(), decoded.height()), bound);
        ops::clamp_resize(&mut operations, self.max_width, self.max_height);

        let mut buffer = decoded;
        for op in &operations {
            buffer = ops::apply(buffer, op)?;
        }
        let (width, height) = (buffer.width(), buffer.height());

        let data = encoder.encode(buffer, target, spec)?;
        debug!(
            plan = ?plan,
            engine = encoder.name(),
            format = target.as_str(),
            width,
            height,
            bytes = data.len(),
            "Image transformed"
        );

        Ok(TransformOutput {
            data,
            format: target,
            width,
            height,
            plan,
            used_fallback,
            operations,
        })
    }
}
