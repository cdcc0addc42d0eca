//! HTTP API Module
//!
//! JSON endpoints for simulation, solving, scenario generation and
//! compatibility checks

pub mod handlers;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::Error;

/// API state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<AppConfig>,
}

impl ApiState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Default for ApiState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

/// Generic API response
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            details: None,
        }
    }
}

/// Error response
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidInput(_) | Error::ShapeMismatch(_) | Error::InvalidStrategy { .. } => {
                StatusCode::BAD_REQUEST
            }
            Error::ConfigError(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        debug!(%status, error = %self, "request rejected");

        let mut body = ApiResponse::<()>::error(self.to_string());
        body.details = match &self {
            Error::InvalidStrategy { valid, .. } => {
                Some(serde_json::json!({ "valid_strategies": valid }))
            }
            Error::ShapeMismatch(_) => Some(serde_json::json!({ "kind": "shape_mismatch" })),
            Error::InvalidInput(_) => Some(serde_json::json!({ "kind": "invalid_input" })),
            _ => None,
        };

        (status, Json(body)).into_response()
    }
}

/// Build the complete API router
pub fn build_router(state: ApiState) -> Router {
    let config = Arc::clone(&state.config);

    let mut app = Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/simulate", post(handlers::simulate))
        .route("/api/solve", post(handlers::solve))
        .route("/api/generate", post(handlers::generate))
        .route("/api/check-compatibility", post(handlers::check_compatibility))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.server.max_body_size))
        .layer(TimeoutLayer::new(config.request_timeout_duration()));

    if config.server.enable_compression {
        app = app.layer(CompressionLayer::new());
    }

    if config.server.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    app.layer(TraceLayer::new_for_http())
}
