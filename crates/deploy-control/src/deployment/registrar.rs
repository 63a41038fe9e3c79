//! Worker registration.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::error::ControlResult;
use crate::ids::{FriendlyIdGenerator, WORKER_NAMESPACE};
use crate::store::StoreTransaction;
use crate::types::{AuthenticatedEnvironment, ManifestPayload, WorkerId, WorkerRecord};

/// Creates worker records.
///
/// Registration is not deduplicated: submitting the same content hash twice
/// yields two workers.
#[derive(Clone)]
pub struct WorkerRegistrar {
    ids: Arc<dyn FriendlyIdGenerator>,
}

impl WorkerRegistrar {
    /// Create a registrar drawing friendly IDs from `ids`.
    #[must_use]
    pub fn new(ids: Arc<dyn FriendlyIdGenerator>) -> Self {
        Self { ids }
    }

    /// Insert a new worker for `environment` within `tx`.
    ///
    /// The worker takes the deployment's version and stores the submitted
    /// metadata object unchanged.
    pub async fn register(
        &self,
        tx: &mut dyn StoreTransaction,
        environment: &AuthenticatedEnvironment,
        deployment_version: &str,
        body: &ManifestPayload,
    ) -> ControlResult<WorkerRecord> {
        let metadata = body.metadata();

        let worker = WorkerRecord {
            id: WorkerId::generate(),
            friendly_id: self.ids.generate(WORKER_NAMESPACE),
            version: deployment_version.to_owned(),
            environment_id: environment.id.clone(),
            project_id: environment.project_id.clone(),
            content_hash: metadata.content_hash.clone(),
            cli_version: metadata.cli_package_version.clone(),
            sdk_version: metadata.package_version.clone(),
            metadata: body.raw_metadata().clone(),
            created_at: Utc::now(),
        };

        tx.insert_worker(&worker).await?;

        debug!(
            worker_id = %worker.friendly_id,
            environment_id = %environment.id,
            version = %worker.version,
            content_hash = %worker.content_hash,
            "worker registered"
        );

        Ok(worker)
    }
}

impl std::fmt::Debug for WorkerRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistrar").finish_non_exhaustive()
    }
}
