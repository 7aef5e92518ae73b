// Test utilities: an in-process pipeline wired to memory-backed stores

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage, Rgba, RgbaImage};
use kagami::cache::{CacheManager, CacheStore, MemoryCacheStore};
use kagami::image_optimizer::{CodecRegistry, TransformEngine, ValidationPolicy};
use kagami::metrics::Metrics;
use kagami::pipeline::{BackgroundTasks, ImagePipeline, PipelineOptions, RequestContext};
use kagami::server::{AppState, CorsPolicy};
use kagami::storage::MemoryStore;

pub const PURGE_SECRET: &str = "test-purge-secret";
pub const TRUSTED_HOST: &str = "example.com";

pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub cache_store: Arc<MemoryCacheStore>,
    pub pipeline: Arc<ImagePipeline>,
    pub state: Arc<AppState>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_engine(TransformEngine::new(Arc::new(CodecRegistry::new()), 4096, 4096))
    }

    pub fn with_engine(engine: TransformEngine) -> Self {
        Self::build(engine, ValidationPolicy::default())
    }

    pub fn with_policy(policy: ValidationPolicy) -> Self {
        let engine = TransformEngine::new(
            Arc::new(CodecRegistry::new()),
            policy.max_width,
            policy.max_height,
        );
        Self::build(engine, policy)
    }

    fn build(engine: TransformEngine, policy: ValidationPolicy) -> Self {
        let store = Arc::new(MemoryStore::new());
        let cache_store = Arc::new(MemoryCacheStore::with_limits(64 * 1024 * 1024, 16 * 1024 * 1024));
        let cache = CacheManager::new(cache_store.clone() as Arc<dyn CacheStore>, BackgroundTasks::new());

        let pipeline = Arc::new(ImagePipeline::new(
            store.clone(),
            cache,
            Arc::new(engine),
            policy,
            Arc::new(Metrics::new()),
            PipelineOptions {
                purge_secret: Some(PURGE_SECRET.to_string()),
                ..PipelineOptions::default()
            },
        ));
        let state = Arc::new(AppState::new(
            pipeline.clone(),
            CorsPolicy::new(vec![TRUSTED_HOST.to_string()]),
        ));

        Self {
            store,
            cache_store,
            pipeline,
            state,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        self.pipeline.metrics()
    }

    /// Wait for background cache stores and evictions
    pub async fn settle(&self) {
        self.pipeline.flush().await;
    }
}

pub fn get(path: &str) -> RequestContext {
    RequestContext::new("GET", path)
}

/// Opaque RGBA gradient, encoded as PNG
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    encode(DynamicImage::ImageRgba8(img), ImageOutputFormat::Png)
}

pub fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8, 255])
    })
}

pub fn solid_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([30, 120, 200]));
    encode(DynamicImage::ImageRgb8(img), ImageOutputFormat::Jpeg(90))
}

pub fn encode(img: DynamicImage, format: ImageOutputFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}

pub fn decode(bytes: &[u8]) -> DynamicImage {
    image::load_from_memory(bytes).unwrap()
}
