pub mod routes;

use crate::state::LprServiceState;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

/// Build the API router
pub fn router(state: LprServiceState) -> Router {
    let body_limit = state.max_upload_bytes();

    Router::new()
        // Health and metrics endpoints
        .route("/healthz", get(routes::healthz))
        .route("/readyz", get(routes::readyz))
        .route("/metrics", get(routes::metrics))
        // Recognition endpoints
        .route("/recognize_plate/", post(routes::recognize_plate))
        .route("/recognize_plate", post(routes::recognize_plate))
        .route("/v1/recognize", post(routes::recognize))
        .route("/v1/model", get(routes::model_info))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(telemetry::trace_http_request))
        .with_state(state)
}
