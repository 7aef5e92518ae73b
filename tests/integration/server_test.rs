// HTTP adapter: routing, headers and CORS

use std::sync::Arc;

use async_trait::async_trait;
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use kagami::cache::{CacheManager, NullCacheStore};
use kagami::image_optimizer::{CodecRegistry, TransformEngine, ValidationPolicy};
use kagami::metrics::Metrics;
use kagami::pipeline::{BackgroundTasks, ImagePipeline, PipelineOptions};
use kagami::server::{handle_request, serve_with_shutdown, AppState, CorsPolicy};
use kagami::storage::{FsStore, ObjectStore, StoreError, StoredObject};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::test_harness::{gradient_png, solid_jpeg, TestHarness};

async fn body_string(response: kagami::server::HttpResponse) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[tokio::test]
async fn test_get_image_headers() {
    let harness = TestHarness::new();
    harness.store.put("photo.jpg", solid_jpeg(30, 20));

    let request = Request::get("/photo.jpg?width=15")
        .header("Accept", "image/webp")
        .header("Origin", "https://cdn.example.com")
        .body(())
        .unwrap();
    let response = handle_request(&harness.state, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["content-type"], "image/webp");
    assert_eq!(headers["cache-control"], "public, max-age=31536000");
    assert_eq!(headers["vary"], "Accept");
    assert_eq!(headers["x-cache"], "MISS");
    assert_eq!(headers["x-image-width"], "15");
    assert_eq!(headers["x-image-height"], "20");
    assert_eq!(headers["access-control-allow-origin"], "https://cdn.example.com");
    assert_eq!(headers["access-control-allow-methods"], "GET, HEAD, OPTIONS");
}

#[tokio::test]
async fn test_cached_response_uses_current_origin() {
    let harness = TestHarness::new();
    harness.store.put("photo.jpg", solid_jpeg(8, 8));

    let first = Request::get("/photo.jpg")
        .header("Origin", "https://a.example.com")
        .body(())
        .unwrap();
    handle_request(&harness.state, first).await;
    harness.settle().await;

    let second = Request::get("/photo.jpg")
        .header("Origin", "https://untrusted.test")
        .body(())
        .unwrap();
    let response = handle_request(&harness.state, second).await;
    assert_eq!(response.headers()["x-cache"], "HIT");
    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_head_has_headers_without_body() {
    let harness = TestHarness::new();
    let png = gradient_png(4, 4);
    harness.store.put("g.png", png);

    let request = Request::head("/g.png").body(()).unwrap();
    let response = handle_request(&harness.state, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn test_empty_key_is_not_found() {
    let harness = TestHarness::new();
    let response = handle_request(&harness.state, Request::get("/").body(()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "Not Found");
    assert_eq!(harness.store.get_count(), 0);
}

#[tokio::test]
async fn test_missing_object_is_not_found() {
    let harness = TestHarness::new();
    let response = handle_request(&harness.state, Request::get("/nope.png").body(()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_options_returns_cors_headers_only() {
    let harness = TestHarness::new();
    let request = Request::options("/anything.png")
        .header("Origin", "https://example.com")
        .body(())
        .unwrap();
    let response = handle_request(&harness.state, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "https://example.com");
    assert_eq!(response.headers()["access-control-allow-headers"], "Content-Type, Accept");
    assert!(response.headers().get("content-type").is_none());
    assert_eq!(harness.store.get_count(), 0);
}

#[tokio::test]
async fn test_unsupported_method() {
    let harness = TestHarness::new();
    let request = Request::post("/a.png").body(()).unwrap();
    let response = handle_request(&harness.state, request).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()["allow"], "GET, HEAD, DELETE, OPTIONS");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let harness = TestHarness::new();
    harness.store.put("photo.jpg", solid_jpeg(8, 8));
    handle_request(&harness.state, Request::get("/photo.jpg").body(()).unwrap()).await;
    handle_request(&harness.state, Request::get("/missing.jpg").body(()).unwrap()).await;

    let response = handle_request(&harness.state, Request::get("/metrics").body(()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_string(response).await;
    assert!(text.contains("kagami_requests_by_status_total{status=\"200\"} 1"));
    assert!(text.contains("kagami_requests_by_status_total{status=\"404\"} 1"));
    assert!(text.contains("kagami_cache_misses_total 1"));
}

#[tokio::test]
async fn test_unsupported_source_is_415() {
    let harness = TestHarness::new();
    harness.store.put("doc.txt", b"plain text pretending to be an image".to_vec());
    let response = handle_request(&harness.state, Request::get("/doc.txt").body(()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body_string(response).await, "Invalid image format or corrupted image data");
}

/// Object store whose backend is down
struct FailingStore;

#[async_trait]
impl ObjectStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<StoredObject>, StoreError> {
        Err(StoreError::Backend("connection refused to 10.0.0.7".into()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

fn state_over(store: Arc<dyn ObjectStore>) -> AppState {
    let pipeline = Arc::new(ImagePipeline::new(
        store,
        CacheManager::new(Arc::new(NullCacheStore), BackgroundTasks::new()),
        Arc::new(TransformEngine::new(Arc::new(CodecRegistry::new()), 4096, 4096)),
        ValidationPolicy::default(),
        Arc::new(Metrics::new()),
        PipelineOptions::default(),
    ));
    AppState::new(pipeline, CorsPolicy::new(vec!["example.com".into()]))
}

#[tokio::test]
async fn test_object_over_size_limit_is_413_without_download() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("big.jpg"), vec![0xFFu8; 4096]).unwrap();
    let state = state_over(Arc::new(FsStore::new(dir.path()).with_size_limit(1024)));

    let response = handle_request(&state, Request::get("/big.jpg").body(()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body_string(response).await.starts_with("Image size exceeds the maximum allowed size"));
    assert_eq!(state.pipeline().metrics().rejections(), 1);
}

#[tokio::test]
async fn test_internal_error_is_generic_and_keeps_cors() {
    let state = state_over(Arc::new(FailingStore));

    let request = Request::get("/a.png")
        .header("Origin", "https://example.com")
        .body(())
        .unwrap();
    let response = handle_request(&state, request).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()["access-control-allow-origin"], "https://example.com");
    let body = body_string(response).await;
    assert_eq!(body, "Internal Server Error");
    assert!(!body.contains("10.0.0.7"));
}

#[tokio::test]
async fn test_serves_over_tcp_until_shutdown() {
    let harness = TestHarness::new();
    harness.store.put("g.png", gradient_png(4, 4));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve_with_shutdown(listener, harness.state.clone(), async {
        let _ = stop_rx.await;
    }));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /g.png HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8_lossy(&raw);

    assert!(text.starts_with("HTTP/1.1 200 OK"));
    assert!(text.to_ascii_lowercase().contains("content-type: image/png"));
    assert!(text.to_ascii_lowercase().contains("x-cache: miss"));

    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
