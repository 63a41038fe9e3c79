//! Promotion pointer queries.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::error::ControlError;
use crate::types::PromotionRecord;

use super::auth::EnvironmentIdentity;
use super::{error_response, ApiError, AppState};

/// Response for a promotion pointer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionResponse {
    /// Environment ID.
    pub environment_id: String,
    /// Label.
    pub label: String,
    /// Friendly ID of the promoted deployment.
    pub deployment_id: String,
    /// Version of the promoted deployment.
    pub version: String,
    /// Last time the pointer moved.
    pub updated_at: String,
}

/// Get the deployment a label points at.
///
/// Callers may only read pointers of their own environment. Other
/// environments answer 404 so their existence is not revealed.
pub async fn get_promotion(
    State(state): State<AppState>,
    Path((environment_id, label)): Path<(String, String)>,
    EnvironmentIdentity(environment): EnvironmentIdentity,
) -> Result<Json<PromotionResponse>, ApiError> {
    let not_found = || {
        error_response(
            StatusCode::NOT_FOUND,
            format!("no deployment labelled {label} in {environment_id}"),
        )
    };

    if environment.id.as_str() != environment_id {
        return Err(not_found());
    }

    let Some(promotion) = state.store.get_promotion(&environment.id, &label).await? else {
        return Err(not_found());
    };

    let deployment = state
        .store
        .get_deployment(&promotion.deployment_id)
        .await?
        .ok_or_else(|| ControlError::DeploymentNotFound(promotion.deployment_id.to_string()))?;

    Ok(Json(response(promotion, deployment.friendly_id, deployment.version)))
}

fn response(promotion: PromotionRecord, friendly_id: String, version: String) -> PromotionResponse {
    PromotionResponse {
        environment_id: promotion.environment_id.to_string(),
        label: promotion.label,
        deployment_id: friendly_id,
        version,
        updated_at: promotion.updated_at.to_rfc3339(),
    }
}
