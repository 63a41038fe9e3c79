//! Integration tests for the registration flow across store, service and
//! promotion pointer.

mod common;

use std::sync::Arc;

use common::{environment, fixtures::ManifestBuilder, TestControl};
use deploy_control::{
    DeploymentStatus, DeploymentStore, RegistrationOutcome, CURRENT_DEPLOYMENT_LABEL,
};

#[tokio::test]
async fn second_deployment_takes_over_current() {
    let control = TestControl::new();
    let env = environment("env_e1");
    let d1 = control.seed(&env, "deployment_d1", "20240501.1").await;
    let d2 = control.seed(&env, "deployment_d2", "20240501.2").await;

    let w1 = control
        .service
        .call(
            "proj_ref",
            &env,
            "deployment_d1",
            ManifestBuilder::new("hash-1").with_task("email/send").build(),
        )
        .await
        .unwrap()
        .into_worker()
        .unwrap();

    let current = control
        .store
        .get_promotion(&env.id, CURRENT_DEPLOYMENT_LABEL)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.deployment_id, d1.id);

    let w2 = control
        .service
        .call(
            "proj_ref",
            &env,
            "deployment_d2",
            ManifestBuilder::new("hash-2")
                .with_task("email/send")
                .with_task("email/digest")
                .build(),
        )
        .await
        .unwrap()
        .into_worker()
        .unwrap();

    let current = control
        .store
        .get_promotion(&env.id, CURRENT_DEPLOYMENT_LABEL)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.deployment_id, d2.id);

    // The earlier deployment stays deployed with its own worker
    let d1 = control.store.get_deployment(&d1.id).await.unwrap().unwrap();
    assert_eq!(d1.status, DeploymentStatus::Deployed);
    assert_eq!(d1.worker_id, Some(w1.id.clone()));

    assert_eq!(w1.version, "20240501.1");
    assert_eq!(w2.version, "20240501.2");
    assert_eq!(control.store.list_tasks(&w1.id).await.unwrap().len(), 1);
    assert_eq!(control.store.list_tasks(&w2.id).await.unwrap().len(), 2);

    let workers = control.store.list_workers(&env.id).await.unwrap();
    assert_eq!(workers.len(), 2);
}

#[tokio::test]
async fn environments_keep_separate_pointers() {
    let control = TestControl::new();
    let staging = environment("env_staging");
    let prod = environment("env_prod");
    let ds = control.seed(&staging, "deployment_s", "1").await;
    let dp = control.seed(&prod, "deployment_p", "1").await;

    for (env, id) in [(&staging, "deployment_s"), (&prod, "deployment_p")] {
        control
            .service
            .call("proj_ref", env, id, ManifestBuilder::new("hash").build())
            .await
            .unwrap();
    }

    let staging_current = control
        .service
        .promotions()
        .current(&staging, CURRENT_DEPLOYMENT_LABEL)
        .await
        .unwrap()
        .unwrap();
    let prod_current = control
        .service
        .promotions()
        .current(&prod, CURRENT_DEPLOYMENT_LABEL)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(staging_current.deployment_id, ds.id);
    assert_eq!(prod_current.deployment_id, dp.id);
}

#[tokio::test]
async fn metadata_and_task_definitions_are_stored_verbatim() {
    let control = TestControl::new();
    let env = environment("env_prod");
    control.seed(&env, "deployment_1", "7").await;

    let body = ManifestBuilder::new("c0ffee")
        .without_cli_version()
        .with_task_config(
            "billing/charge",
            serde_json::json!({ "queue": { "name": "billing", "concurrencyLimit": 1 } }),
        )
        .build();
    let submitted = body.raw_metadata().clone();

    let worker = control
        .service
        .call("proj_ref", &env, "deployment_1", body)
        .await
        .unwrap()
        .into_worker()
        .unwrap();

    assert_eq!(worker.metadata, submitted);
    assert!(worker.cli_version.is_none());
    assert_eq!(worker.sdk_version, "3.0.1");

    let tasks = control.store.list_tasks(&worker.id).await.unwrap();
    assert_eq!(tasks[0].slug, "billing/charge");
    assert_eq!(tasks[0].definition["queue"]["concurrencyLimit"], 1);
}

#[tokio::test]
async fn unknown_deployment_changes_nothing() {
    let control = TestControl::new();
    let env = environment("env_prod");
    control.seed(&env, "deployment_1", "1").await;
    let before = control.store.counts().unwrap();

    let outcome = control
        .service
        .call(
            "proj_ref",
            &env,
            "deployment_typo",
            ManifestBuilder::new("hash").with_task("a").build(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, RegistrationOutcome::DeploymentNotFound);
    assert_eq!(control.store.counts().unwrap(), before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_leave_one_current() {
    let control = TestControl::new();
    let env = environment("env_prod");
    let mut ids = Vec::new();
    for n in 0..8 {
        let record = control
            .seed(&env, &format!("deployment_{n}"), &n.to_string())
            .await;
        ids.push(record.id);
    }

    let mut handles = Vec::new();
    for n in 0..8 {
        let service = Arc::clone(&control.service);
        let env = env.clone();
        handles.push(tokio::spawn(async move {
            service
                .call(
                    "proj_ref",
                    &env,
                    &format!("deployment_{n}"),
                    ManifestBuilder::new("hash").with_task("a").build(),
                )
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().worker().is_some());
    }

    let promotions = control.store.list_promotions(&env.id).await.unwrap();
    assert_eq!(promotions.len(), 1);
    assert!(ids.contains(&promotions[0].deployment_id));

    let counts = control.store.counts().unwrap();
    assert_eq!(counts.workers, 8);
    assert_eq!(counts.tasks, 8);
}
