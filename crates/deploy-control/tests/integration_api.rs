//! Integration tests for the HTTP API.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{environment, fixtures::ManifestBuilder, TestControl};
use deploy_control::api::{router, ENVIRONMENT_ID_HEADER, PROJECT_ID_HEADER};
use deploy_control::{DeploymentStatus, DeploymentStore};
use tower::ServiceExt;

fn register_request(deployment_id: &str, env_id: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!(
            "/api/v1/projects/proj_ref/deployments/{deployment_id}/background-workers"
        ))
        .header("content-type", "application/json")
        .header(ENVIRONMENT_ID_HEADER, env_id)
        .header(PROJECT_ID_HEADER, "proj_1")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn register_then_read_current() {
    let control = TestControl::new();
    let env = environment("env_prod");
    let deployment = control.seed(&env, "deployment_1", "20240501.1").await;

    let body = ManifestBuilder::new("c0ffee")
        .with_task("email/send")
        .build_json();
    let response = router(control.app_state.clone())
        .oneshot(register_request("deployment_1", "env_prod", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let worker = json_body(response).await;
    assert_eq!(worker["version"], "20240501.1");
    assert_eq!(worker["environmentId"], "env_prod");

    let response = router(control.app_state.clone())
        .oneshot(
            Request::builder()
                .uri("/api/v1/environments/env_prod/promotions/CURRENT")
                .header(ENVIRONMENT_ID_HEADER, "env_prod")
                .header(PROJECT_ID_HEADER, "proj_1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let promotion = json_body(response).await;
    assert_eq!(promotion["deploymentId"], "deployment_1");

    let updated = control
        .store
        .get_deployment(&deployment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, DeploymentStatus::Deployed);
}

#[tokio::test]
async fn unknown_deployment_returns_not_found_and_writes_nothing() {
    let control = TestControl::new();

    let body = ManifestBuilder::new("c0ffee").with_task("a").build_json();
    let response = router(control.app_state.clone())
        .oneshot(register_request("deployment_missing", "env_prod", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error = json_body(response).await;
    assert!(error["error"].as_str().unwrap().contains("deployment_missing"));
    assert_eq!(control.store.counts().unwrap().workers, 0);
}

#[tokio::test]
async fn duplicate_task_slugs_return_conflict() {
    let control = TestControl::new();
    let env = environment("env_prod");
    let deployment = control.seed(&env, "deployment_1", "1").await;

    let body = ManifestBuilder::new("c0ffee")
        .with_task("a")
        .with_task("a")
        .build_json();
    let response = router(control.app_state.clone())
        .oneshot(register_request("deployment_1", "env_prod", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);

    let unchanged = control
        .store
        .get_deployment(&deployment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.status, DeploymentStatus::Pending);
    assert_eq!(control.store.counts().unwrap().promotions, 0);
}
