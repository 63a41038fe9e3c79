//! Deployed worker registration endpoint.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::deployment::RegistrationOutcome;
use crate::types::{ManifestPayload, WorkerRecord};

use super::auth::EnvironmentIdentity;
use super::{error_response, ApiError, AppState};

/// Response for a registered worker.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponse {
    /// Worker friendly ID.
    pub id: String,
    /// Worker version.
    pub version: String,
    /// Hash of the bundled task sources.
    pub content_hash: String,
    /// Environment the worker runs in.
    pub environment_id: String,
    /// Registration timestamp.
    pub created_at: String,
}

impl From<WorkerRecord> for WorkerResponse {
    fn from(worker: WorkerRecord) -> Self {
        Self {
            id: worker.friendly_id,
            version: worker.version,
            content_hash: worker.content_hash,
            environment_id: worker.environment_id.to_string(),
            created_at: worker.created_at.to_rfc3339(),
        }
    }
}

/// Register the worker of a deployed build and promote the deployment.
pub async fn create_deployed_worker(
    State(state): State<AppState>,
    Path((project_ref, deployment_id)): Path<(String, String)>,
    EnvironmentIdentity(environment): EnvironmentIdentity,
    Json(body): Json<ManifestPayload>,
) -> Result<Json<WorkerResponse>, ApiError> {
    info!(
        project_ref = %project_ref,
        deployment_id = %deployment_id,
        environment_id = %environment.id,
        tasks = body.metadata().tasks.len(),
        "registering deployed worker via API"
    );

    match state
        .service
        .call(&project_ref, &environment, &deployment_id, body)
        .await?
    {
        RegistrationOutcome::Registered(worker) => Ok(Json(worker.into())),
        RegistrationOutcome::DeploymentNotFound => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("deployment not found: {deployment_id}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::super::tests::make_app_state;
    use super::super::{router, ENVIRONMENT_ID_HEADER, PROJECT_ID_HEADER};
    use super::*;
    use crate::store::{DeploymentStore, MemoryStore};
    use crate::types::{
        AuthenticatedEnvironment, DeploymentRecord, DeploymentStatus, EnvironmentId, ProjectId,
    };

    fn body(tasks: serde_json::Value) -> Body {
        let body = serde_json::json!({
            "metadata": {
                "contentHash": "c0ffee",
                "cliPackageVersion": "3.0.0",
                "packageVersion": "3.0.1",
                "tasks": tasks
            }
        });
        Body::from(serde_json::to_vec(&body).unwrap())
    }

    fn request(deployment_id: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!(
                "/api/v1/projects/proj_ref/deployments/{deployment_id}/background-workers"
            ))
            .header("content-type", "application/json")
            .header(ENVIRONMENT_ID_HEADER, "env_prod")
            .header(PROJECT_ID_HEADER, "proj_1")
            .body(body)
            .unwrap()
    }

    async fn seed(store: &MemoryStore) -> DeploymentRecord {
        let environment =
            AuthenticatedEnvironment::new(EnvironmentId::new("env_prod"), ProjectId::new("proj_1"));
        let record = DeploymentRecord::new("deployment_1", &environment, "20240501.1");
        store.insert_deployment(&record).await.unwrap();
        record
    }

    #[tokio::test]
    async fn registers_worker() {
        let (state, store) = make_app_state();
        let deployment = seed(&store).await;
        let app = router(state);

        let tasks = serde_json::json!([
            { "id": "email/send", "filePath": "src/trigger/email.ts", "exportName": "sendEmail" }
        ]);
        let response = app
            .oneshot(request("deployment_1", body(tasks)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["version"], "20240501.1");
        assert_eq!(json["contentHash"], "c0ffee");
        assert!(json["id"].as_str().unwrap().starts_with("worker_"));

        let updated = store.get_deployment(&deployment.id).await.unwrap().unwrap();
        assert_eq!(updated.status, DeploymentStatus::Deployed);
    }

    #[tokio::test]
    async fn unknown_deployment_is_404() {
        let (state, store) = make_app_state();
        let app = router(state);

        let response = app
            .oneshot(request("deployment_missing", body(serde_json::json!([]))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(store.counts().unwrap().workers, 0);
    }

    #[tokio::test]
    async fn duplicate_task_is_409() {
        let (state, store) = make_app_state();
        seed(&store).await;
        let app = router(state);

        let task = serde_json::json!({ "id": "a", "filePath": "a.ts", "exportName": "a" });
        let response = app
            .oneshot(request("deployment_1", body(serde_json::json!([task, task]))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(store.counts().unwrap().workers, 0);
    }

    #[tokio::test]
    async fn missing_identity_is_401() {
        let (state, _) = make_app_state();
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/projects/proj_ref/deployments/deployment_1/background-workers")
                    .header("content-type", "application/json")
                    .body(body(serde_json::json!([])))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_manifest_is_rejected() {
        let (state, _) = make_app_state();
        let app = router(state);

        let body = Body::from(r#"{"metadata":{"tasks":[]}}"#);
        let response = app.oneshot(request("deployment_1", body)).await.unwrap();

        assert!(response.status().is_client_error());
    }
}
