// DELETE purges the cached variant and needs the bearer credential

use http::{Request, StatusCode};
use http_body_util::BodyExt;
use kagami::server::{handle_request, HttpResponse};

use super::test_harness::{gradient_png, TestHarness, PURGE_SECRET};

async fn fetch(harness: &TestHarness, uri: &str, accept: Option<&str>) -> String {
    let mut request = Request::get(uri);
    if let Some(accept) = accept {
        request = request.header("Accept", accept);
    }
    let response = handle_request(&harness.state, request.body(()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let status = response.headers()["x-cache"].to_str().unwrap().to_string();
    harness.settle().await;
    status
}

async fn purge(harness: &TestHarness, uri: &str, accept: Option<&str>) -> HttpResponse {
    let mut request = Request::delete(uri).header("Authorization", format!("Bearer {}", PURGE_SECRET));
    if let Some(accept) = accept {
        request = request.header("Accept", accept);
    }
    let response = handle_request(&harness.state, request.body(()).unwrap()).await;
    harness.settle().await;
    response
}

async fn json_body(response: HttpResponse) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_delete_without_credential_is_unauthorized() {
    let harness = TestHarness::new();
    harness.store.put("cat.png", gradient_png(12, 12));
    assert_eq!(fetch(&harness, "/cat.png", None).await, "MISS");

    let request = Request::delete("/cat.png").body(()).unwrap();
    let response = handle_request(&harness.state, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["www-authenticate"], "Bearer");

    assert_eq!(fetch(&harness, "/cat.png", None).await, "HIT");
}

#[tokio::test]
async fn test_delete_with_wrong_credential_is_unauthorized() {
    let harness = TestHarness::new();
    let request = Request::delete("/cat.png")
        .header("Authorization", "Bearer wrong")
        .body(())
        .unwrap();
    let response = handle_request(&harness.state, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_delete_get_recomputes() {
    let harness = TestHarness::new();
    harness.store.put("cat.png", gradient_png(12, 12));
    assert_eq!(fetch(&harness, "/cat.png", None).await, "MISS");
    assert_eq!(fetch(&harness, "/cat.png", None).await, "HIT");

    let response = purge(&harness, "/cat.png", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["removed"], "img:cat.png?format=png&quality=90");

    assert_eq!(fetch(&harness, "/cat.png", None).await, "MISS");
    assert_eq!(harness.metrics().purges(), 1);
}

#[tokio::test]
async fn test_delete_with_params_leaves_other_variants() {
    let harness = TestHarness::new();
    harness.store.put("cat.png", gradient_png(12, 12));
    fetch(&harness, "/cat.png", None).await;
    fetch(&harness, "/cat.png?width=10", None).await;

    let response = purge(&harness, "/cat.png?width=10", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["removed"], "img:cat.png?format=png&quality=90&width=10");

    assert_eq!(fetch(&harness, "/cat.png", None).await, "HIT");
    assert_eq!(fetch(&harness, "/cat.png?width=10", None).await, "MISS");
}

#[tokio::test]
async fn test_delete_targets_the_negotiated_format() {
    let harness = TestHarness::new();
    harness.store.put("cat.png", gradient_png(12, 12));
    fetch(&harness, "/cat.png", Some("image/webp")).await;
    fetch(&harness, "/cat.png", Some("image/jpeg")).await;

    let json = json_body(purge(&harness, "/cat.png", Some("image/webp")).await).await;
    assert_eq!(json["removed"], "img:cat.png?format=webp&quality=90");

    assert_eq!(fetch(&harness, "/cat.png", Some("image/webp")).await, "MISS");
    assert_eq!(fetch(&harness, "/cat.png", Some("image/jpeg")).await, "HIT");
}

#[tokio::test]
async fn test_delete_of_uncached_variant_still_succeeds() {
    let harness = TestHarness::new();
    let response = purge(&harness, "/never-fetched.png", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
