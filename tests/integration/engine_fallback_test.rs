// Codec decode failures fall back to the raster engine

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kagami::error::ServiceError;
use kagami::image_optimizer::engine::{CodecEngine, RasterEngine};
use kagami::image_optimizer::{
    CodecRegistry, Engine, ImageError, OutputFormat, PixelBuffer, SourceFormat, TransformEngine,
    TransformSpec,
};
use kagami::pipeline::PipelineState;

use super::test_harness::{decode, get, gradient, gradient_png, TestHarness};

/// Codec engine whose decoder always fails; probing and encoding delegate
struct BrokenDecoder {
    inner: CodecEngine,
    decode_calls: Arc<AtomicU64>,
}

impl Engine for BrokenDecoder {
    fn name(&self) -> &'static str {
        "broken-codec"
    }

    fn probe_dimensions(&self, bytes: &[u8], format: SourceFormat) -> Result<(u32, u32), ImageError> {
        self.inner.probe_dimensions(bytes, format)
    }

    fn decode(&self, _bytes: &[u8], _format: SourceFormat) -> Result<PixelBuffer, ImageError> {
        self.decode_calls.fetch_add(1, Ordering::SeqCst);
        Err(ImageError::decode_failed("codec decoder unavailable"))
    }

    fn encode(
        &self,
        buffer: PixelBuffer,
        format: OutputFormat,
        spec: &TransformSpec,
    ) -> Result<Vec<u8>, ImageError> {
        self.inner.encode(buffer, format, spec)
    }
}

/// Raster engine whose decoder always fails
struct BrokenRaster;

impl Engine for BrokenRaster {
    fn name(&self) -> &'static str {
        "broken-raster"
    }

    fn probe_dimensions(&self, bytes: &[u8], format: SourceFormat) -> Result<(u32, u32), ImageError> {
        RasterEngine::new().probe_dimensions(bytes, format)
    }

    fn decode(&self, _bytes: &[u8], _format: SourceFormat) -> Result<PixelBuffer, ImageError> {
        Err(ImageError::decode_failed("raster decoder unavailable"))
    }

    fn encode(
        &self,
        buffer: PixelBuffer,
        format: OutputFormat,
        spec: &TransformSpec,
    ) -> Result<Vec<u8>, ImageError> {
        RasterEngine::new().encode(buffer, format, spec)
    }
}

fn broken_codec(calls: Arc<AtomicU64>) -> Arc<dyn Engine> {
    Arc::new(BrokenDecoder {
        inner: CodecEngine::new(Arc::new(CodecRegistry::new())),
        decode_calls: calls,
    })
}

#[tokio::test]
async fn test_hybrid_plan_recovers_with_raster_decode() {
    let calls = Arc::new(AtomicU64::new(0));
    let engine = TransformEngine::from_engines(
        Arc::new(RasterEngine::new()),
        broken_codec(calls.clone()),
        4096,
        4096,
    );
    let harness = TestHarness::with_engine(engine);
    harness.store.put("g.png", gradient_png(10, 10));

    let response = harness
        .pipeline
        .handle(
            &get("/g.png")
                .with_query_param("format", "png")
                .with_query_param("optimize", "true"),
        )
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.metrics().engine_fallbacks(), 1);
    assert_eq!(response.content_type, "image/png");
    assert_eq!(decode(&response.body).to_rgba8(), gradient(10, 10));
}

#[tokio::test]
async fn test_raster_only_plan_never_touches_codec() {
    let calls = Arc::new(AtomicU64::new(0));
    let engine = TransformEngine::from_engines(
        Arc::new(RasterEngine::new()),
        broken_codec(calls.clone()),
        4096,
        4096,
    );
    let harness = TestHarness::with_engine(engine);
    harness.store.put("g.png", gradient_png(10, 10));

    harness
        .pipeline
        .handle(&get("/g.png").with_query_param("format", "jpeg"))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.metrics().engine_fallbacks(), 0);
}

#[tokio::test]
async fn test_both_decoders_failing_is_internal_error() {
    let engine = TransformEngine::from_engines(
        Arc::new(BrokenRaster),
        broken_codec(Arc::new(AtomicU64::new(0))),
        4096,
        4096,
    );
    let harness = TestHarness::with_engine(engine);
    harness.store.put("g.png", gradient_png(10, 10));

    let (result, states) = harness
        .pipeline
        .handle_traced(&get("/g.png").with_query_param("format", "avif"))
        .await;

    let err = match result {
        Err(err) => err,
        Ok(_) => panic!("both decoders failed, the request must fail"),
    };
    assert!(matches!(err, ServiceError::EngineFailure(_)));
    assert_eq!(err.public_message(), "Internal Server Error");
    // Both failures are kept for the logs
    let detail = err.to_string();
    assert!(detail.contains("codec decoder unavailable"));
    assert!(detail.contains("raster decoder unavailable"));
    assert_eq!(states.last(), Some(&PipelineState::Failed));
    assert_eq!(harness.metrics().failures(), 1);
}
