use crate::error::ApiError;
use crate::state::{LprServiceState, RecognitionOutput};
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use base64::Engine;
use common::plates::{RecognizePlateResponse, RecognizeRequest};
use serde_json::json;

/// Multipart field carrying the uploaded image
pub const IMAGE_FIELD: &str = "image_file";

/// Record the request outcome and shape the JSON response
fn respond(
    endpoint: &str,
    result: Result<RecognitionOutput, ApiError>,
) -> Result<Json<RecognizePlateResponse>, ApiError> {
    match result {
        Ok(output) => {
            let outcome = if output.result.is_plate() { "plate" } else { "no_plate" };
            telemetry::metrics::record_request(endpoint, outcome);
            tracing::info!(
                plate = %output.result,
                candidates = output.candidates_evaluated,
                elapsed_ms = output.elapsed.as_millis() as u64,
                "Plate recognized"
            );
            Ok(Json(RecognizePlateResponse::new(
                &output.result,
                output.elapsed.as_secs_f64(),
                output.candidates_evaluated,
            )))
        }
        Err(e) => {
            telemetry::metrics::record_request(endpoint, "error");
            tracing::warn!("Recognition request failed: {}", e);
            Err(e)
        }
    }
}

/// Recognize a plate in a multipart upload (`image_file` field)
pub async fn recognize_plate(
    State(state): State<LprServiceState>,
    mut multipart: Multipart,
) -> Result<Json<RecognizePlateResponse>, ApiError> {
    if let Err(e) = state.ensure_ready() {
        return respond("recognize_plate", Err(e));
    }

    let mut image = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return respond("recognize_plate", Err(multipart_error(e))),
        };
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        match field.bytes().await {
            Ok(bytes) => {
                image = Some(bytes.to_vec());
                break;
            }
            Err(e) => return respond("recognize_plate", Err(multipart_error(e))),
        }
    }

    let result = match image {
        Some(bytes) => state.recognize(bytes).await,
        None => Err(ApiError::bad_request(format!(
            "missing multipart field '{IMAGE_FIELD}'"
        ))),
    };
    respond("recognize_plate", result)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::bad_request(format!("invalid multipart upload: {}", err.body_text()))
    }
}

/// Recognize a plate in a base64-encoded image
pub async fn recognize(
    State(state): State<LprServiceState>,
    Json(request): Json<RecognizeRequest>,
) -> Result<Json<RecognizePlateResponse>, ApiError> {
    if let Err(e) = state.ensure_ready() {
        return respond("recognize", Err(e));
    }

    if let Some(source_id) = &request.source_id {
        common::validation::validate_id(source_id, "source_id")
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        tracing::debug!(source_id = %source_id, "Recognition requested");
    }

    let result = match decode_base64_image(&request.image) {
        Ok(bytes) => state.recognize(bytes).await,
        Err(e) => Err(e),
    };
    respond("recognize", result)
}

/// Accepts bare base64 or a `data:` URL
fn decode_base64_image(encoded: &str) -> Result<Vec<u8>, ApiError> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    base64::prelude::BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|e| ApiError::bad_request(format!("invalid base64 image: {e}")))
}

/// Describe the loaded model
pub async fn model_info(State(state): State<LprServiceState>) -> impl IntoResponse {
    match state.model_info() {
        Ok(info) => (StatusCode::OK, Json(info)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Health check endpoint
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lpr-service"
        })),
    )
}

/// Readiness check endpoint
pub async fn readyz(State(state): State<LprServiceState>) -> impl IntoResponse {
    if state.is_ready() {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "node_id": state.node_id()
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not ready",
                "node_id": state.node_id(),
                "error": state.load_error()
            })),
        )
    }
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics() -> impl IntoResponse {
    match telemetry::metrics::render() {
        Ok(body) => body.into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_image() {
        assert_eq!(decode_base64_image("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_base64_image("data:image/png;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
        assert!(matches!(
            decode_base64_image("not base64!"),
            Err(ApiError::BadRequest(_))
        ));
    }
}
