pub mod requests;
pub mod routes;

use crate::errors::EngineError;
use crate::state::AppState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Engine error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::NoCandidates { .. }
            | EngineError::NoFeasibleStrategy { .. }
            | EngineError::NumericNonConvergence { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::ExternalData(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            EngineError::Config(_) | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, kind = self.0.kind(), "request failed");
        } else {
            tracing::debug!(error = %self.0, kind = self.0.kind(), "request rejected");
        }
        let body = serde_json::json!({
            "error": self.0.to_string(),
            "kind": self.0.kind(),
        });
        (status, Json(body)).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/optimize", post(routes::optimize))
        .route("/api/v1/greeks", post(routes::greeks))
        .route("/api/v1/implied-vol", post(routes::implied_vol))
        .route("/api/v1/simulate", post(routes::simulate))
        .route("/api/v1/stress", post(routes::stress))
        .route("/api/v1/health", get(routes::health))
        .route("/api/counters", get(routes::get_counters))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}
