use uuid::Uuid;

/// HTTP header name for correlation ID
pub const X_CORRELATION_ID: &str = "x-correlation-id";

/// HTTP header name for request ID (same as correlation ID)
pub const X_REQUEST_ID: &str = "x-request-id";

/// Longer caller-supplied ids are replaced rather than logged
pub const MAX_CORRELATION_ID_LEN: usize = 128;

/// Generate a new correlation ID
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Extract correlation ID from HTTP headers or generate a new one
pub fn extract_or_generate_correlation_id(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(X_CORRELATION_ID)
        .or_else(|| headers.get(X_REQUEST_ID))
        .and_then(|h| h.to_str().ok())
        .filter(|s| is_usable_id(s))
        .map(|s| s.to_string())
        .unwrap_or_else(generate_correlation_id)
}

fn is_usable_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_CORRELATION_ID_LEN && id.chars().all(|c| c.is_ascii_graphic())
}

/// Correlation ID stored in request extensions so handlers can tag their logs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
