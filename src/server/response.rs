// Response construction for the HTTP adapter

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{Response, StatusCode};
use http_body_util::Full;
use tracing::warn;

use crate::error::ServiceError;
use crate::image_optimizer::vary_header;
use crate::pipeline::PipelineResponse;

pub type HttpResponse = Response<Full<Bytes>>;

pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Set a header, skipping values that are not valid header text
pub fn set_header(response: &mut HttpResponse, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            response.headers_mut().insert(name, value);
        }
        _ => warn!(header = name, "Dropping invalid response header"),
    }
}

pub fn with_headers(mut response: HttpResponse, headers: &[(&'static str, String)]) -> HttpResponse {
    for (name, value) in headers {
        set_header(&mut response, name, value);
    }
    response
}

fn build(status: StatusCode, body: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Image response; `head` keeps the headers and drops the body
pub fn image_response(image: PipelineResponse, head: bool) -> HttpResponse {
    let length = image.body.len();
    let body = if head { Bytes::new() } else { image.body };
    let mut response = build(StatusCode::OK, body);

    set_header(&mut response, "Content-Type", &image.content_type);
    set_header(&mut response, "Content-Length", &length.to_string());
    set_header(&mut response, "Cache-Control", &image.cache_control);
    set_header(&mut response, "Vary", vary_header());
    set_header(&mut response, "X-Cache", image.cache_status.as_str());
    if let Some(width) = image.width {
        set_header(&mut response, "X-Image-Width", &width.to_string());
    }
    if let Some(height) = image.height {
        set_header(&mut response, "X-Image-Height", &height.to_string());
    }
    response
}

/// Error response; 5xx bodies never carry detail
pub fn error_response(error: &ServiceError) -> HttpResponse {
    let mut response = build(
        status_code(error.to_http_status()),
        Bytes::from(error.public_message()),
    );
    set_header(&mut response, "Content-Type", "text/plain; charset=utf-8");
    if matches!(error, ServiceError::Unauthorized) {
        set_header(&mut response, "WWW-Authenticate", "Bearer");
    }
    response
}

pub fn json_response(status: StatusCode, value: &serde_json::Value) -> HttpResponse {
    let mut response = build(status, Bytes::from(value.to_string()));
    set_header(&mut response, "Content-Type", "application/json");
    response
}

pub fn text_response(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> HttpResponse {
    let mut response = build(status, body.into());
    set_header(&mut response, "Content-Type", content_type);
    response
}

pub fn empty_response(status: StatusCode) -> HttpResponse {
    build(status, Bytes::new())
}
