//! Common test utilities for control plane integration tests.

pub mod fixtures;

use std::sync::Arc;

use deploy_control::{
    api::AppState, AuthenticatedEnvironment, DeployedWorkerService, DeploymentRecord,
    DeploymentStore, EnvironmentId, MemoryStore, ProjectId, SequentialFriendlyIds,
};

/// Registration service wired to an in-memory store.
pub struct TestControl {
    pub store: Arc<MemoryStore>,
    pub service: Arc<DeployedWorkerService>,
    pub app_state: AppState,
}

impl TestControl {
    /// Creates a control plane promoting to the default label.
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(DeployedWorkerService::new(
            store.clone(),
            Arc::new(SequentialFriendlyIds::new()),
        ));

        let app_state = AppState {
            service: service.clone(),
            store: store.clone(),
        };

        Self {
            store,
            service,
            app_state,
        }
    }

    /// Inserts a pending deployment.
    pub async fn seed(
        &self,
        environment: &AuthenticatedEnvironment,
        friendly_id: &str,
        version: &str,
    ) -> DeploymentRecord {
        let record = DeploymentRecord::new(friendly_id, environment, version);
        self.store.insert_deployment(&record).await.unwrap();
        record
    }
}

impl Default for TestControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Environment `env_id` belonging to `proj_1`.
pub fn environment(env_id: &str) -> AuthenticatedEnvironment {
    AuthenticatedEnvironment::new(EnvironmentId::new(env_id), ProjectId::new("proj_1"))
}
