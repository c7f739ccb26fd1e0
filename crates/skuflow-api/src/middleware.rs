//! Request-id propagation and access logging.

use std::time::Instant;

use axum::body::HttpBody;
use axum::extract::Request;
use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id attached to every request as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Response body size: `Content-Length` if set, else the exact body size
/// hint. `None` for streamed bodies of unknown length.
pub fn response_bytes(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .or_else(|| response.body().size_hint().exact())
}

/// Reuse the caller's `X-Request-Id` or mint a new one, expose it to
/// handlers, echo it on the response, and log one access line.
pub async fn request_context(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let start = Instant::now();
    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        bytes = response_bytes(&response),
        latency_ms = start.elapsed().as_secs_f64() * 1000.0,
        %request_id,
        "http request"
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::extract::Extension;
    use axum::routing::get;
    use tower::ServiceExt;

    async fn echo(Extension(RequestId(id)): Extension<RequestId>) -> String {
        id
    }

    fn app() -> Router {
        Router::new()
            .route("/", get(echo))
            .layer(axum::middleware::from_fn(request_context))
    }

    #[test]
    fn response_bytes_prefers_content_length() {
        let mut resp = Response::new(Body::from("hello"));
        assert_eq!(response_bytes(&resp), Some(5));

        resp.headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from_static("12"));
        assert_eq!(response_bytes(&resp), Some(12));

        assert_eq!(response_bytes(&Response::new(Body::empty())), Some(0));
    }

    #[tokio::test]
    async fn generates_id_when_missing() {
        let resp = app()
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let header = resp.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_owned();
        assert!(Uuid::parse_str(&header).is_ok());

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, header.as_bytes());
    }

    #[tokio::test]
    async fn blank_header_is_replaced() {
        let req = HttpRequest::builder()
            .uri("/")
            .header("X-Request-Id", "   ")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        let header = resp.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(Uuid::parse_str(header).is_ok());
    }

    #[tokio::test]
    async fn caller_id_reaches_handler() {
        let req = HttpRequest::builder()
            .uri("/")
            .header("X-Request-Id", "trace-77")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.headers()[REQUEST_ID_HEADER], "trace-77");
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"trace-77");
    }
}
