//! Task manifest linking.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::error::{ControlError, ControlResult};
use crate::ids::{FriendlyIdGenerator, TASK_NAMESPACE};
use crate::store::StoreTransaction;
use crate::types::{AuthenticatedEnvironment, TaskDefinition, TaskId, TaskRecord, WorkerRecord};

/// Materializes a worker's task manifest.
#[derive(Clone)]
pub struct TaskLinker {
    ids: Arc<dyn FriendlyIdGenerator>,
}

impl TaskLinker {
    /// Create a linker drawing friendly IDs from `ids`.
    #[must_use]
    pub fn new(ids: Arc<dyn FriendlyIdGenerator>) -> Self {
        Self { ids }
    }

    /// Insert one task per definition for `worker` within `tx`.
    ///
    /// An empty manifest is valid. The first failing insert is returned and
    /// the caller is expected to drop the transaction.
    pub async fn link(
        &self,
        tx: &mut dyn StoreTransaction,
        definitions: &[TaskDefinition],
        worker: &WorkerRecord,
        environment: &AuthenticatedEnvironment,
    ) -> ControlResult<Vec<TaskRecord>> {
        let mut tasks = Vec::with_capacity(definitions.len());

        for (position, definition) in definitions.iter().enumerate() {
            let position = u32::try_from(position)
                .map_err(|_| ControlError::internal("task manifest too large"))?;
            let stored = serde_json::to_value(definition).map_err(|e| {
                ControlError::serialisation(format!(
                    "failed to serialise task '{}': {e}",
                    definition.id
                ))
            })?;

            let task = TaskRecord {
                id: TaskId::generate(),
                friendly_id: self.ids.generate(TASK_NAMESPACE),
                worker_id: worker.id.clone(),
                environment_id: environment.id.clone(),
                project_id: environment.project_id.clone(),
                slug: definition.id.clone(),
                file_path: definition.file_path.clone(),
                export_name: definition.export_name.clone(),
                position,
                definition: stored,
                created_at: Utc::now(),
            };

            tx.insert_task(&task).await?;
            tasks.push(task);
        }

        debug!(
            worker_id = %worker.friendly_id,
            tasks = tasks.len(),
            "task manifest linked"
        );

        Ok(tasks)
    }
}

impl std::fmt::Debug for TaskLinker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskLinker").finish_non_exhaustive()
    }
}
