//! Deployment storage backends.
//!
//! This module provides traits and implementations for persisting
//! deployments, workers, tasks and promotion pointers. The primary
//! implementation uses PostgreSQL, but an in-memory implementation is
//! provided for testing.

mod memory;
mod postgres;

pub use memory::{MemoryStore, TableCounts};
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ControlResult;
use crate::types::{
    DeploymentId, DeploymentRecord, EnvironmentId, PromotionRecord, TaskRecord, WorkerId,
    WorkerRecord,
};

/// Backend for storing deployment state.
///
/// Implementations must ensure that all operations are atomic and durable.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Insert a new deployment record.
    ///
    /// Deployments are created by the build pipeline; this crate only reads
    /// and finalizes them. Fails if the ID or friendly ID is taken.
    async fn insert_deployment(&self, record: &DeploymentRecord) -> ControlResult<()>;

    /// Find a deployment by its friendly ID.
    async fn find_deployment(&self, friendly_id: &str) -> ControlResult<Option<DeploymentRecord>>;

    /// Get a deployment by internal ID.
    async fn get_deployment(&self, id: &DeploymentId) -> ControlResult<Option<DeploymentRecord>>;

    /// Get a worker by internal ID.
    async fn get_worker(&self, id: &WorkerId) -> ControlResult<Option<WorkerRecord>>;

    /// List workers registered in an environment, newest first.
    async fn list_workers(&self, environment_id: &EnvironmentId)
        -> ControlResult<Vec<WorkerRecord>>;

    /// List the tasks of a worker in manifest order.
    async fn list_tasks(&self, worker_id: &WorkerId) -> ControlResult<Vec<TaskRecord>>;

    /// Start a transaction.
    ///
    /// Writes made through the transaction become visible together on
    /// [`StoreTransaction::commit`]. Dropping it without committing discards
    /// them.
    async fn begin(&self) -> ControlResult<Box<dyn StoreTransaction>>;

    /// Point `(environment_id, label)` at a deployment.
    ///
    /// Creates the pointer if it does not exist, otherwise replaces the
    /// deployment it references. Concurrent calls for the same key
    /// serialize in the store and the last writer wins.
    async fn upsert_promotion(
        &self,
        environment_id: &EnvironmentId,
        label: &str,
        deployment_id: &DeploymentId,
    ) -> ControlResult<PromotionRecord>;

    /// Get the pointer for `(environment_id, label)`.
    async fn get_promotion(
        &self,
        environment_id: &EnvironmentId,
        label: &str,
    ) -> ControlResult<Option<PromotionRecord>>;

    /// List every pointer of an environment, ordered by label.
    async fn list_promotions(
        &self,
        environment_id: &EnvironmentId,
    ) -> ControlResult<Vec<PromotionRecord>>;
}

/// A group of writes committed atomically.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Insert a worker.
    async fn insert_worker(&mut self, worker: &WorkerRecord) -> ControlResult<()>;

    /// Insert a task. Fails if the worker already has a task with the same slug.
    async fn insert_task(&mut self, task: &TaskRecord) -> ControlResult<()>;

    /// Mark a deployment as deployed by `worker_id` at `deployed_at`.
    ///
    /// Returns [`ControlError::DeploymentNotFound`](crate::ControlError::DeploymentNotFound)
    /// if the deployment does not exist.
    async fn mark_deployed(
        &mut self,
        deployment_id: &DeploymentId,
        worker_id: &WorkerId,
        deployed_at: DateTime<Utc>,
    ) -> ControlResult<()>;

    /// Commit all writes.
    async fn commit(self: Box<Self>) -> ControlResult<()>;
}
