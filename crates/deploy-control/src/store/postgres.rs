//! PostgreSQL deployment store implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};

use crate::config::DatabaseConfig;
use crate::error::{ControlError, ControlResult};
use crate::types::{
    DeploymentId, DeploymentRecord, DeploymentStatus, EnvironmentId, ProjectId, PromotionRecord,
    TaskId, TaskRecord, WorkerId, WorkerRecord,
};

use super::{DeploymentStore, StoreTransaction};

const DEPLOYMENT_COLUMNS: &str = "id, friendly_id, project_id, environment_id, version, status, \
     worker_id, deployed_at, created_at, updated_at";

const WORKER_COLUMNS: &str = "id, friendly_id, version, environment_id, project_id, content_hash, \
     cli_version, sdk_version, metadata, created_at";

const TASK_COLUMNS: &str = "id, friendly_id, worker_id, environment_id, project_id, slug, \
     file_path, export_name, position, definition, created_at";

/// PostgreSQL-backed deployment store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to PostgreSQL and create a new store.
    ///
    /// The required tables are created if they don't exist.
    pub async fn new(url: &str) -> ControlResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;

        Self::from_pool(pool).await
    }

    /// Connect using the pool settings from configuration.
    pub async fn connect(config: &DatabaseConfig) -> ControlResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await?;

        Self::from_pool(pool).await
    }

    /// Create a store from an existing connection pool.
    pub async fn from_pool(pool: PgPool) -> ControlResult<Self> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Ensure the required tables exist.
    async fn ensure_schema(&self) -> ControlResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS background_workers (
                id TEXT PRIMARY KEY,
                friendly_id TEXT NOT NULL UNIQUE,
                version TEXT NOT NULL,
                environment_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                cli_version TEXT,
                sdk_version TEXT NOT NULL,
                metadata JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS worker_deployments (
                id TEXT PRIMARY KEY,
                friendly_id TEXT NOT NULL UNIQUE,
                project_id TEXT NOT NULL,
                environment_id TEXT NOT NULL,
                version TEXT NOT NULL,
                status TEXT NOT NULL,
                worker_id TEXT UNIQUE REFERENCES background_workers(id),
                deployed_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS background_worker_tasks (
                id TEXT PRIMARY KEY,
                friendly_id TEXT NOT NULL UNIQUE,
                worker_id TEXT NOT NULL REFERENCES background_workers(id) ON DELETE CASCADE,
                environment_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                slug TEXT NOT NULL,
                file_path TEXT NOT NULL,
                export_name TEXT NOT NULL,
                position INTEGER NOT NULL,
                definition JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (worker_id, slug)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS worker_deployment_promotions (
                environment_id TEXT NOT NULL,
                label TEXT NOT NULL,
                deployment_id TEXT NOT NULL REFERENCES worker_deployments(id),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (environment_id, label)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_background_workers_environment
            ON background_workers (environment_id, created_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_deployment(row: &PgRow) -> ControlResult<DeploymentRecord> {
        let status_str: String = row.get("status");
        let status: DeploymentStatus = status_str.parse().map_err(|e| {
            ControlError::Serialisation(format!("failed to parse status '{status_str}': {e}"))
        })?;
        let worker_id: Option<String> = row.get("worker_id");

        Ok(DeploymentRecord {
            id: DeploymentId::new(row.get::<String, _>("id")),
            friendly_id: row.get("friendly_id"),
            project_id: ProjectId::new(row.get::<String, _>("project_id")),
            environment_id: EnvironmentId::new(row.get::<String, _>("environment_id")),
            version: row.get("version"),
            status,
            worker_id: worker_id.map(WorkerId::new),
            deployed_at: row.get("deployed_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn row_to_worker(row: &PgRow) -> WorkerRecord {
        WorkerRecord {
            id: WorkerId::new(row.get::<String, _>("id")),
            friendly_id: row.get("friendly_id"),
            version: row.get("version"),
            environment_id: EnvironmentId::new(row.get::<String, _>("environment_id")),
            project_id: ProjectId::new(row.get::<String, _>("project_id")),
            content_hash: row.get("content_hash"),
            cli_version: row.get("cli_version"),
            sdk_version: row.get("sdk_version"),
            metadata: row.get("metadata"),
            created_at: row.get("created_at"),
        }
    }

    fn row_to_task(row: &PgRow) -> ControlResult<TaskRecord> {
        let position: i32 = row.get("position");
        let position = u32::try_from(position).map_err(|e| {
            ControlError::Serialisation(format!("invalid task position {position}: {e}"))
        })?;

        Ok(TaskRecord {
            id: TaskId::new(row.get::<String, _>("id")),
            friendly_id: row.get("friendly_id"),
            worker_id: WorkerId::new(row.get::<String, _>("worker_id")),
            environment_id: EnvironmentId::new(row.get::<String, _>("environment_id")),
            project_id: ProjectId::new(row.get::<String, _>("project_id")),
            slug: row.get("slug"),
            file_path: row.get("file_path"),
            export_name: row.get("export_name"),
            position,
            definition: row.get("definition"),
            created_at: row.get("created_at"),
        })
    }

    fn row_to_promotion(row: &PgRow) -> PromotionRecord {
        PromotionRecord {
            environment_id: EnvironmentId::new(row.get::<String, _>("environment_id")),
            label: row.get("label"),
            deployment_id: DeploymentId::new(row.get::<String, _>("deployment_id")),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// Map unique and foreign key violations to [`ControlError::Conflict`].
fn map_write_error(err: sqlx::Error) -> ControlError {
    if let sqlx::Error::Database(ref db) = err {
        if db.is_unique_violation() || db.is_foreign_key_violation() {
            return ControlError::Conflict(db.message().to_owned());
        }
    }
    ControlError::Database(err)
}

#[async_trait]
impl DeploymentStore for PostgresStore {
    async fn insert_deployment(&self, record: &DeploymentRecord) -> ControlResult<()> {
        sqlx::query(
            r#"
            INSERT INTO worker_deployments (
                id, friendly_id, project_id, environment_id, version, status,
                worker_id, deployed_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id.as_str())
        .bind(&record.friendly_id)
        .bind(record.project_id.as_str())
        .bind(record.environment_id.as_str())
        .bind(&record.version)
        .bind(record.status.as_str())
        .bind(record.worker_id.as_ref().map(WorkerId::as_str))
        .bind(record.deployed_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn find_deployment(&self, friendly_id: &str) -> ControlResult<Option<DeploymentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {DEPLOYMENT_COLUMNS} FROM worker_deployments WHERE friendly_id = $1"
        ))
        .bind(friendly_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_deployment).transpose()
    }

    async fn get_deployment(&self, id: &DeploymentId) -> ControlResult<Option<DeploymentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {DEPLOYMENT_COLUMNS} FROM worker_deployments WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_deployment).transpose()
    }

    async fn get_worker(&self, id: &WorkerId) -> ControlResult<Option<WorkerRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {WORKER_COLUMNS} FROM background_workers WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::row_to_worker))
    }

    async fn list_workers(
        &self,
        environment_id: &EnvironmentId,
    ) -> ControlResult<Vec<WorkerRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {WORKER_COLUMNS} FROM background_workers \
             WHERE environment_id = $1 ORDER BY created_at DESC"
        ))
        .bind(environment_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_worker).collect())
    }

    async fn list_tasks(&self, worker_id: &WorkerId) -> ControlResult<Vec<TaskRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM background_worker_tasks \
             WHERE worker_id = $1 ORDER BY position"
        ))
        .bind(worker_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn begin(&self) -> ControlResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn upsert_promotion(
        &self,
        environment_id: &EnvironmentId,
        label: &str,
        deployment_id: &DeploymentId,
    ) -> ControlResult<PromotionRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO worker_deployment_promotions (environment_id, label, deployment_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (environment_id, label) DO UPDATE
            SET deployment_id = EXCLUDED.deployment_id, updated_at = NOW()
            RETURNING environment_id, label, deployment_id, created_at, updated_at
            "#,
        )
        .bind(environment_id.as_str())
        .bind(label)
        .bind(deployment_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(Self::row_to_promotion(&row))
    }

    async fn get_promotion(
        &self,
        environment_id: &EnvironmentId,
        label: &str,
    ) -> ControlResult<Option<PromotionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT environment_id, label, deployment_id, created_at, updated_at
            FROM worker_deployment_promotions
            WHERE environment_id = $1 AND label = $2
            "#,
        )
        .bind(environment_id.as_str())
        .bind(label)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::row_to_promotion))
    }

    async fn list_promotions(
        &self,
        environment_id: &EnvironmentId,
    ) -> ControlResult<Vec<PromotionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT environment_id, label, deployment_id, created_at, updated_at
            FROM worker_deployment_promotions
            WHERE environment_id = $1
            ORDER BY label
            "#,
        )
        .bind(environment_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_promotion).collect())
    }
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore").finish_non_exhaustive()
    }
}

/// Transaction over a [`PostgresStore`]. Rolls back when dropped uncommitted.
struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn insert_worker(&mut self, worker: &WorkerRecord) -> ControlResult<()> {
        sqlx::query(
            r#"
            INSERT INTO background_workers (
                id, friendly_id, version, environment_id, project_id,
                content_hash, cli_version, sdk_version, metadata, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(worker.id.as_str())
        .bind(&worker.friendly_id)
        .bind(&worker.version)
        .bind(worker.environment_id.as_str())
        .bind(worker.project_id.as_str())
        .bind(&worker.content_hash)
        .bind(&worker.cli_version)
        .bind(&worker.sdk_version)
        .bind(&worker.metadata)
        .bind(worker.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn insert_task(&mut self, task: &TaskRecord) -> ControlResult<()> {
        let position = i32::try_from(task.position).map_err(|e| {
            ControlError::Serialisation(format!("invalid task position {}: {e}", task.position))
        })?;

        sqlx::query(
            r#"
            INSERT INTO background_worker_tasks (
                id, friendly_id, worker_id, environment_id, project_id,
                slug, file_path, export_name, position, definition, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(task.id.as_str())
        .bind(&task.friendly_id)
        .bind(task.worker_id.as_str())
        .bind(task.environment_id.as_str())
        .bind(task.project_id.as_str())
        .bind(&task.slug)
        .bind(&task.file_path)
        .bind(&task.export_name)
        .bind(position)
        .bind(&task.definition)
        .bind(task.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn mark_deployed(
        &mut self,
        deployment_id: &DeploymentId,
        worker_id: &WorkerId,
        deployed_at: DateTime<Utc>,
    ) -> ControlResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE worker_deployments
            SET status = $1, worker_id = $2, deployed_at = $3, updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(DeploymentStatus::Deployed.as_str())
        .bind(worker_id.as_str())
        .bind(deployed_at)
        .bind(deployment_id.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(ControlError::DeploymentNotFound(deployment_id.to_string()));
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> ControlResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
