use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{error, info, warn, Instrument};

use crate::correlation::{extract_or_generate_correlation_id, CorrelationId, X_CORRELATION_ID};

/// Axum middleware for HTTP request tracing
///
/// Every request runs inside an `http_request` span carrying the correlation
/// id, which is also placed in the request extensions and echoed back on the
/// response.
pub async fn trace_http_request(mut req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let correlation_id = extract_or_generate_correlation_id(req.headers());
    req.extensions_mut()
        .insert(CorrelationId(correlation_id.clone()));

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        uri = %uri,
        version = ?version,
        correlation_id = %correlation_id,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let mut response = next.run(req).instrument(span.clone()).await;

    let latency_ms = start.elapsed().as_millis();
    let status = response.status().as_u16();

    span.record("status", status);
    span.record("latency_ms", latency_ms);

    match status {
        400..=499 => {
            warn!(
                method = %method,
                uri = %uri,
                status,
                latency_ms = %latency_ms,
                correlation_id = %correlation_id,
                "HTTP request failed (client error)"
            );
        }
        500..=599 => {
            error!(
                method = %method,
                uri = %uri,
                status,
                latency_ms = %latency_ms,
                correlation_id = %correlation_id,
                "HTTP request failed (server error)"
            );
        }
        _ => {
            info!(
                method = %method,
                uri = %uri,
                status,
                latency_ms = %latency_ms,
                correlation_id = %correlation_id,
                "HTTP request completed"
            );
        }
    }

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(X_CORRELATION_ID, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::StatusCode,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    async fn echo_correlation(Extension(id): Extension<CorrelationId>) -> String {
        id.to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/test", get(echo_correlation))
            .layer(axum::middleware::from_fn(trace_http_request))
    }

    #[tokio::test]
    async fn test_trace_http_request_middleware() {
        let request = Request::builder()
            .uri("/test")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_CORRELATION_ID));
    }

    #[tokio::test]
    async fn test_correlation_id_propagation() {
        let request = Request::builder()
            .uri("/test")
            .header(X_CORRELATION_ID, "test-correlation-id-123")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let echoed = response
            .headers()
            .get(X_CORRELATION_ID)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(echoed, "test-correlation-id-123");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"test-correlation-id-123");
    }
}
