//! Deploy Control Plane
//!
//! This crate registers the background worker produced by a deployment build
//! and makes that deployment the one serving its environment.
//!
//! # Architecture
//!
//! The control plane is responsible for:
//!
//! - **Worker registration**: Recording the worker built for a deployment,
//!   carrying the deployment's version and the manifest metadata
//! - **Task linking**: Materialising one task row per manifest entry, in
//!   manifest order, owned by the new worker
//! - **Finalisation**: Marking the deployment `DEPLOYED` and linking it to
//!   its worker
//! - **Promotion**: Moving the per-environment `CURRENT` pointer onto the
//!   deployment in one atomic upsert
//!
//! # Registration Flow
//!
//! ```text
//! find deployment ──▶ ┌ transaction ─────────────────────┐ ──▶ promote
//!        │            │ register ──▶ link ──▶ finalize    │
//!        ▼            └──────────────────────────────────┘
//!    not found
//! ```
//!
//! A failure anywhere inside the transaction leaves no trace. Promotion runs
//! after commit.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use deploy_control::{
//!     DeployedWorkerService, MemoryStore, RegistrationOutcome, UlidFriendlyIds,
//! };
//!
//! let store = Arc::new(MemoryStore::new());
//! let service = DeployedWorkerService::new(store, Arc::new(UlidFriendlyIds));
//!
//! match service.call("proj_ref", &environment, "deployment_abc", body).await? {
//!     RegistrationOutcome::Registered(worker) => println!("{}", worker.friendly_id),
//!     RegistrationOutcome::DeploymentNotFound => println!("no such deployment"),
//! }
//! ```

#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod deployment;
pub mod error;
pub mod ids;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
pub mod test_fixtures;

// Re-export commonly used types at the crate root
pub use config::ControlConfig;
pub use deployment::{
    DeployedWorkerService, DeploymentFinalizer, PromotionPointer, RegistrationOutcome, TaskLinker,
    WorkerRegistrar, CURRENT_DEPLOYMENT_LABEL,
};
pub use error::{ControlError, ControlResult};
pub use ids::{FriendlyIdGenerator, SequentialFriendlyIds, UlidFriendlyIds};
pub use service::ControlService;
pub use store::{DeploymentStore, MemoryStore, PostgresStore, StoreTransaction, TableCounts};
pub use types::{
    AuthenticatedEnvironment, DeploymentId, DeploymentRecord, DeploymentStatus, EnvironmentId,
    ManifestMetadata, ManifestPayload, ProjectId, PromotionRecord, TaskDefinition, TaskId,
    TaskRecord, WorkerId, WorkerRecord,
};
