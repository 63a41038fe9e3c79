//! Deployed worker registration.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::error::ControlResult;
use crate::ids::FriendlyIdGenerator;
use crate::store::DeploymentStore;
use crate::types::{AuthenticatedEnvironment, ManifestPayload, WorkerRecord};

use super::{
    DeploymentFinalizer, PromotionPointer, TaskLinker, WorkerRegistrar, CURRENT_DEPLOYMENT_LABEL,
};

/// Result of registering a deployed worker.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    /// The worker was registered and its deployment promoted.
    Registered(WorkerRecord),
    /// No deployment has the requested friendly ID. Nothing was written.
    DeploymentNotFound,
}

impl RegistrationOutcome {
    /// The registered worker, if any.
    #[must_use]
    pub fn worker(&self) -> Option<&WorkerRecord> {
        match self {
            Self::Registered(worker) => Some(worker),
            Self::DeploymentNotFound => None,
        }
    }

    /// Consume the outcome, returning the registered worker if any.
    #[must_use]
    pub fn into_worker(self) -> Option<WorkerRecord> {
        match self {
            Self::Registered(worker) => Some(worker),
            Self::DeploymentNotFound => None,
        }
    }
}

/// Registers the worker of a built deployment and makes it current.
///
/// Each call runs:
/// 1. Resolve the deployment by friendly ID (absent: return early)
/// 2. In one transaction: insert the worker, link its tasks, mark the
///    deployment deployed
/// 3. Upsert the promotion pointer for the configured label
///
/// If the process stops between 2 and 3 the deployment is deployed but not
/// promoted; retrying the call registers a second worker and promotes.
pub struct DeployedWorkerService {
    store: Arc<dyn DeploymentStore>,
    registrar: WorkerRegistrar,
    linker: TaskLinker,
    finalizer: DeploymentFinalizer,
    promotions: PromotionPointer,
    label: String,
}

impl DeployedWorkerService {
    /// Create a service promoting to [`CURRENT_DEPLOYMENT_LABEL`].
    pub fn new(store: Arc<dyn DeploymentStore>, ids: Arc<dyn FriendlyIdGenerator>) -> Self {
        Self::with_label(store, ids, CURRENT_DEPLOYMENT_LABEL)
    }

    /// Create a service promoting to `label`.
    pub fn with_label(
        store: Arc<dyn DeploymentStore>,
        ids: Arc<dyn FriendlyIdGenerator>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            registrar: WorkerRegistrar::new(Arc::clone(&ids)),
            linker: TaskLinker::new(ids),
            finalizer: DeploymentFinalizer,
            promotions: PromotionPointer::new(Arc::clone(&store)),
            store,
            label: label.into(),
        }
    }

    /// The label deployments are promoted to.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The promotion pointer used by this service.
    #[must_use]
    pub const fn promotions(&self) -> &PromotionPointer {
        &self.promotions
    }

    /// Register the worker for `deployment_id` and promote the deployment.
    #[instrument(
        skip(self, environment, body),
        fields(environment_id = %environment.id)
    )]
    pub async fn call(
        &self,
        project_ref: &str,
        environment: &AuthenticatedEnvironment,
        deployment_id: &str,
        body: ManifestPayload,
    ) -> ControlResult<RegistrationOutcome> {
        let Some(deployment) = self.store.find_deployment(deployment_id).await? else {
            debug!("deployment not found, skipping registration");
            return Ok(RegistrationOutcome::DeploymentNotFound);
        };

        let mut tx = self.store.begin().await?;
        let worker = self
            .registrar
            .register(tx.as_mut(), environment, &deployment.version, &body)
            .await?;
        let tasks = self
            .linker
            .link(tx.as_mut(), &body.metadata().tasks, &worker, environment)
            .await?;
        self.finalizer
            .finalize(tx.as_mut(), &deployment, &worker)
            .await?;
        tx.commit().await?;

        self.promotions
            .promote(environment, &self.label, &deployment)
            .await?;

        info!(
            worker_id = %worker.friendly_id,
            version = %worker.version,
            tasks = tasks.len(),
            "deployed worker registered"
        );

        Ok(RegistrationOutcome::Registered(worker))
    }
}

impl std::fmt::Debug for DeployedWorkerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployedWorkerService")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
