//! Deployment finalization.

use chrono::Utc;
use tracing::debug;

use crate::error::ControlResult;
use crate::store::StoreTransaction;
use crate::types::{DeploymentRecord, WorkerRecord};

/// Marks a deployment as deployed by a worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentFinalizer;

impl DeploymentFinalizer {
    /// Set `deployment` to `DEPLOYED`, stamp the time and link `worker`.
    ///
    /// Not guarded against repeats: finalizing an already deployed
    /// deployment overwrites its worker link and timestamp.
    pub async fn finalize(
        &self,
        tx: &mut dyn StoreTransaction,
        deployment: &DeploymentRecord,
        worker: &WorkerRecord,
    ) -> ControlResult<()> {
        tx.mark_deployed(&deployment.id, &worker.id, Utc::now())
            .await?;

        debug!(
            deployment_id = %deployment.friendly_id,
            worker_id = %worker.friendly_id,
            previous_status = %deployment.status,
            "deployment finalized"
        );

        Ok(())
    }
}
