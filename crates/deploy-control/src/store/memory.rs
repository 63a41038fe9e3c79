//! In-memory deployment store for testing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{ControlError, ControlResult};
use crate::types::{
    DeploymentId, DeploymentRecord, DeploymentStatus, EnvironmentId, PromotionRecord, TaskRecord,
    WorkerId, WorkerRecord,
};

use super::{DeploymentStore, StoreTransaction};

/// In-memory deployment store for testing.
///
/// This implementation is not suitable for production use as data is lost
/// when the process exits.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableCounts {
    /// Deployment rows.
    pub deployments: usize,
    /// Worker rows.
    pub workers: usize,
    /// Task rows.
    pub tasks: usize,
    /// Promotion pointer rows.
    pub promotions: usize,
}

#[derive(Debug, Default, Clone)]
struct Tables {
    deployments: HashMap<String, DeploymentRecord>,
    workers: HashMap<String, WorkerRecord>,
    tasks: Vec<TaskRecord>,
    promotions: HashMap<(String, String), PromotionRecord>,
}

#[derive(Debug)]
enum StagedWrite {
    Worker(WorkerRecord),
    Task(TaskRecord),
    Deployed {
        deployment_id: DeploymentId,
        worker_id: WorkerId,
        deployed_at: DateTime<Utc>,
    },
}

impl Tables {
    fn apply(&mut self, write: &StagedWrite) -> ControlResult<()> {
        match write {
            StagedWrite::Worker(worker) => {
                if self.workers.contains_key(worker.id.as_str())
                    || self
                        .workers
                        .values()
                        .any(|w| w.friendly_id == worker.friendly_id)
                {
                    return Err(ControlError::conflict(format!(
                        "worker {} already exists",
                        worker.friendly_id
                    )));
                }
                self.workers
                    .insert(worker.id.as_str().to_owned(), worker.clone());
            }
            StagedWrite::Task(task) => {
                if !self.workers.contains_key(task.worker_id.as_str()) {
                    return Err(ControlError::conflict(format!(
                        "task {} references unknown worker {}",
                        task.slug, task.worker_id
                    )));
                }
                if self
                    .tasks
                    .iter()
                    .any(|t| t.worker_id == task.worker_id && t.slug == task.slug)
                {
                    return Err(ControlError::conflict(format!(
                        "worker {} already has task '{}'",
                        task.worker_id, task.slug
                    )));
                }
                self.tasks.push(task.clone());
            }
            StagedWrite::Deployed {
                deployment_id,
                worker_id,
                deployed_at,
            } => {
                if self.deployments.values().any(|d| {
                    d.id != *deployment_id && d.worker_id.as_ref() == Some(worker_id)
                }) {
                    return Err(ControlError::conflict(format!(
                        "worker {worker_id} is already linked to another deployment"
                    )));
                }
                let record = self
                    .deployments
                    .get_mut(deployment_id.as_str())
                    .ok_or_else(|| ControlError::DeploymentNotFound(deployment_id.to_string()))?;
                record.status = DeploymentStatus::Deployed;
                record.worker_id = Some(worker_id.clone());
                record.deployed_at = Some(*deployed_at);
                record.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    fn apply_all(&self, writes: &[StagedWrite]) -> ControlResult<Self> {
        let mut next = self.clone();
        for write in writes {
            next.apply(write)?;
        }
        Ok(next)
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the rows in each table.
    pub fn counts(&self) -> ControlResult<TableCounts> {
        let tables = self
            .tables
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        Ok(TableCounts {
            deployments: tables.deployments.len(),
            workers: tables.workers.len(),
            tasks: tables.tasks.len(),
            promotions: tables.promotions.len(),
        })
    }
}

#[async_trait]
impl DeploymentStore for MemoryStore {
    async fn insert_deployment(&self, record: &DeploymentRecord) -> ControlResult<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        let key = record.id.as_str().to_owned();
        if tables.deployments.contains_key(&key)
            || tables
                .deployments
                .values()
                .any(|d| d.friendly_id == record.friendly_id)
        {
            return Err(ControlError::conflict(format!(
                "deployment {} already exists",
                record.friendly_id
            )));
        }

        tables.deployments.insert(key, record.clone());
        Ok(())
    }

    async fn find_deployment(&self, friendly_id: &str) -> ControlResult<Option<DeploymentRecord>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        Ok(tables
            .deployments
            .values()
            .find(|d| d.friendly_id == friendly_id)
            .cloned())
    }

    async fn get_deployment(&self, id: &DeploymentId) -> ControlResult<Option<DeploymentRecord>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        Ok(tables.deployments.get(id.as_str()).cloned())
    }

    async fn get_worker(&self, id: &WorkerId) -> ControlResult<Option<WorkerRecord>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        Ok(tables.workers.get(id.as_str()).cloned())
    }

    async fn list_workers(
        &self,
        environment_id: &EnvironmentId,
    ) -> ControlResult<Vec<WorkerRecord>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        let mut workers: Vec<_> = tables
            .workers
            .values()
            .filter(|w| &w.environment_id == environment_id)
            .cloned()
            .collect();
        workers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(workers)
    }

    async fn list_tasks(&self, worker_id: &WorkerId) -> ControlResult<Vec<TaskRecord>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        let mut tasks: Vec<_> = tables
            .tasks
            .iter()
            .filter(|t| &t.worker_id == worker_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.position);
        Ok(tasks)
    }

    async fn begin(&self) -> ControlResult<Box<dyn StoreTransaction>> {
        let snapshot = self
            .tables
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?
            .clone();

        Ok(Box::new(MemoryTransaction {
            tables: Arc::clone(&self.tables),
            snapshot,
            staged: Vec::new(),
        }))
    }

    async fn upsert_promotion(
        &self,
        environment_id: &EnvironmentId,
        label: &str,
        deployment_id: &DeploymentId,
    ) -> ControlResult<PromotionRecord> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        if !tables.deployments.contains_key(deployment_id.as_str()) {
            return Err(ControlError::conflict(format!(
                "promotion references unknown deployment {deployment_id}"
            )));
        }

        let now = Utc::now();
        let key = (environment_id.as_str().to_owned(), label.to_owned());
        let record = tables
            .promotions
            .entry(key)
            .and_modify(|p| {
                p.deployment_id = deployment_id.clone();
                p.updated_at = now;
            })
            .or_insert_with(|| PromotionRecord {
                environment_id: environment_id.clone(),
                label: label.to_owned(),
                deployment_id: deployment_id.clone(),
                created_at: now,
                updated_at: now,
            });

        Ok(record.clone())
    }

    async fn get_promotion(
        &self,
        environment_id: &EnvironmentId,
        label: &str,
    ) -> ControlResult<Option<PromotionRecord>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        let key = (environment_id.as_str().to_owned(), label.to_owned());
        Ok(tables.promotions.get(&key).cloned())
    }

    async fn list_promotions(
        &self,
        environment_id: &EnvironmentId,
    ) -> ControlResult<Vec<PromotionRecord>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        let mut promotions: Vec<_> = tables
            .promotions
            .values()
            .filter(|p| &p.environment_id == environment_id)
            .cloned()
            .collect();
        promotions.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(promotions)
    }
}

/// Transaction over a [`MemoryStore`].
///
/// Writes are checked against a snapshot taken when the transaction begins,
/// then re-applied to the live tables under a single write lock on commit.
#[derive(Debug)]
struct MemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    snapshot: Tables,
    staged: Vec<StagedWrite>,
}

impl MemoryTransaction {
    /// Validate `write` against the snapshot and keep it for commit.
    ///
    /// A rejected write leaves the snapshot untouched.
    fn stage(&mut self, write: StagedWrite) -> ControlResult<()> {
        self.snapshot.apply(&write)?;
        self.staged.push(write);
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn insert_worker(&mut self, worker: &WorkerRecord) -> ControlResult<()> {
        self.stage(StagedWrite::Worker(worker.clone()))
    }

    async fn insert_task(&mut self, task: &TaskRecord) -> ControlResult<()> {
        self.stage(StagedWrite::Task(task.clone()))
    }

    async fn mark_deployed(
        &mut self,
        deployment_id: &DeploymentId,
        worker_id: &WorkerId,
        deployed_at: DateTime<Utc>,
    ) -> ControlResult<()> {
        self.stage(StagedWrite::Deployed {
            deployment_id: deployment_id.clone(),
            worker_id: worker_id.clone(),
            deployed_at,
        })
    }

    async fn commit(self: Box<Self>) -> ControlResult<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        let next = tables.apply_all(&self.staged)?;
        *tables = next;
        Ok(())
    }
}
