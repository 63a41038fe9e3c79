//! HTTP API for the control service.
//!
//! Provides endpoints for:
//! - Registering the worker of a deployed build
//! - Querying promotion pointers
//! - Health checks

mod auth;
mod promotions;
mod workers;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::deployment::DeployedWorkerService;
use crate::error::ControlError;
use crate::store::DeploymentStore;

pub use auth::{EnvironmentIdentity, ENVIRONMENT_ID_HEADER, PROJECT_ID_HEADER};
pub use promotions::PromotionResponse;
pub use workers::WorkerResponse;

/// Shared application state for the control service.
#[derive(Clone)]
pub struct AppState {
    /// Registration service.
    pub service: Arc<DeployedWorkerService>,
    /// Deployment store for direct queries.
    pub store: Arc<dyn DeploymentStore>,
}

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/v1/projects/{project_ref}/deployments/{deployment_id}/background-workers",
            post(workers::create_deployed_worker),
        )
        .route(
            "/api/v1/environments/{environment_id}/promotions/{label}",
            get(promotions::get_promotion),
        )
        .with_state(state)
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

impl From<ControlError> for ApiError {
    fn from(error: ControlError) -> Self {
        error_response(error_to_status(&error), error.to_string())
    }
}

const fn error_to_status(error: &ControlError) -> StatusCode {
    match error {
        ControlError::DeploymentNotFound(_) => StatusCode::NOT_FOUND,
        ControlError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Health check endpoint.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}
