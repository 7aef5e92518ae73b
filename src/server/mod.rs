// Server module - hyper HTTP/1 adapter around the image pipeline
//
// Routes:
//   GET|HEAD /{key}?params   transformed image
//   DELETE   /{key}?params   purge the identity-only cache entry (bearer)
//   OPTIONS  *               CORS preflight
//   GET      /metrics        Prometheus text

pub mod cors;
pub mod response;

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use http::{Method, Request, StatusCode};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ServiceError;
use crate::pipeline::{ImagePipeline, RequestContext};

pub use cors::CorsPolicy;
pub use response::HttpResponse;

use response::{
    empty_response, error_response, image_response, json_response, set_header, text_response,
    with_headers, PROMETHEUS_CONTENT_TYPE,
};

pub const METRICS_PATH: &str = "/metrics";

/// Everything a connection needs to answer requests
pub struct AppState {
    pipeline: Arc<ImagePipeline>,
    cors: CorsPolicy,
}

impl AppState {
    pub fn new(pipeline: Arc<ImagePipeline>, cors: CorsPolicy) -> Self {
        Self { pipeline, cors }
    }

    pub fn from_config(pipeline: Arc<ImagePipeline>, config: &Config) -> Self {
        Self::new(pipeline, CorsPolicy::new(config.server.trusted_hosts.clone()))
    }

    pub fn pipeline(&self) -> &Arc<ImagePipeline> {
        &self.pipeline
    }
}

/// Parse a query string into a map; later duplicates win
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let Some(query) = query else {
        return params;
    };
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = decode_component(name);
        if name.is_empty() {
            continue;
        }
        params.insert(name, decode_component(value));
    }
    params
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw,
    }
}

/// Decoded request path; invalid escapes leave the path as sent
pub fn decode_path(path: &str) -> String {
    match urlencoding::decode(path) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => path.to_string(),
    }
}

fn request_context<B>(req: &Request<B>) -> RequestContext {
    let headers = req
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    RequestContext::new(req.method().as_str(), decode_path(req.uri().path()))
        .with_headers(headers)
        .with_query_params(parse_query(req.uri().query()))
}

/// Answer one request
///
/// Never fails: every error becomes a status code, and every response
/// carries the CORS headers computed for the request's own origin.
pub async fn handle_request<B>(state: &AppState, req: Request<B>) -> HttpResponse {
    let metrics = state.pipeline.metrics().clone();
    metrics.increment_request_count();

    let ctx = request_context(&req);
    let cors = state.cors.headers_for(ctx.header("Origin"));

    let response = match *req.method() {
        Method::OPTIONS => empty_response(StatusCode::OK),
        Method::GET if ctx.path() == METRICS_PATH => text_response(
            StatusCode::OK,
            PROMETHEUS_CONTENT_TYPE,
            metrics.export_prometheus(),
        ),
        Method::GET | Method::HEAD => {
            let head = *req.method() == Method::HEAD;
            match state.pipeline.handle(&ctx).await {
                Ok(image) => {
                    if !head {
                        metrics.add_bytes_sent(image.body.len() as u64);
                    }
                    image_response(image, head)
                }
                Err(e) => error_response(&e),
            }
        }
        Method::DELETE => match state.pipeline.purge(&ctx).await {
            Ok(removed) => json_response(
                StatusCode::OK,
                &serde_json::json!({ "status": "ok", "removed": removed.as_str() }),
            ),
            Err(e) => error_response(&e),
        },
        _ => {
            let mut response = error_response(&ServiceError::InputRejected {
                status: 405,
                message: "Method Not Allowed".to_string(),
            });
            set_header(&mut response, "Allow", "GET, HEAD, DELETE, OPTIONS");
            response
        }
    };

    let response = with_headers(response, &cors);
    metrics.increment_status_count(response.status().as_u16());
    debug!(
        request_id = %ctx.request_id(),
        method = %ctx.method(),
        path = %ctx.path(),
        status = response.status().as_u16(),
        "Request completed"
    );
    response
}

/// Accept connections until `shutdown` resolves, then drain background work
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    info!(address = ?listener.local_addr().ok(), "Listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let state = state.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req| {
                        let state = state.clone();
                        async move { Ok::<_, Infallible>(handle_request(&state, req).await) }
                    });
                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        debug!(peer = %peer, error = %e, "Connection closed with error");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("Shutdown requested, draining background cache work");
                state.pipeline.flush().await;
                return Ok(());
            }
        }
    }
}
