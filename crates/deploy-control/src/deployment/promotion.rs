//! Promotion pointers.

use std::sync::Arc;

use tracing::info;

use crate::error::ControlResult;
use crate::store::DeploymentStore;
use crate::types::{AuthenticatedEnvironment, DeploymentRecord, PromotionRecord};

/// Label of the deployment currently serving traffic in an environment.
pub const CURRENT_DEPLOYMENT_LABEL: &str = "CURRENT";

/// Moves per-environment labels between deployments.
#[derive(Clone)]
pub struct PromotionPointer {
    store: Arc<dyn DeploymentStore>,
}

impl PromotionPointer {
    /// Create a pointer backed by `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DeploymentStore>) -> Self {
        Self { store }
    }

    /// Point `label` in `environment` at `deployment`.
    ///
    /// Creates the pointer or replaces its target in one atomic store write.
    /// Promoting the deployment that is already current only bumps
    /// `updated_at`.
    pub async fn promote(
        &self,
        environment: &AuthenticatedEnvironment,
        label: &str,
        deployment: &DeploymentRecord,
    ) -> ControlResult<PromotionRecord> {
        let promotion = self
            .store
            .upsert_promotion(&environment.id, label, &deployment.id)
            .await?;

        info!(
            environment_id = %environment.id,
            label = %label,
            deployment_id = %deployment.friendly_id,
            version = %deployment.version,
            "deployment promoted"
        );

        Ok(promotion)
    }

    /// Get the pointer for `label` in `environment`.
    pub async fn current(
        &self,
        environment: &AuthenticatedEnvironment,
        label: &str,
    ) -> ControlResult<Option<PromotionRecord>> {
        self.store.get_promotion(&environment.id, label).await
    }
}

impl std::fmt::Debug for PromotionPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromotionPointer").finish_non_exhaustive()
    }
}
