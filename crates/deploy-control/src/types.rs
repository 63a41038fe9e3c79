//! Core types for deploy-control.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Internal identifier of a deployment.
    DeploymentId
);
string_id!(
    /// Internal identifier of a background worker.
    WorkerId
);
string_id!(
    /// Internal identifier of a task.
    TaskId
);
string_id!(
    /// Identifier of a runtime environment.
    EnvironmentId
);
string_id!(
    /// Identifier of a project.
    ProjectId
);

fn ulid() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

impl DeploymentId {
    /// Generate a new unique deployment ID using ULID.
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid())
    }
}

impl WorkerId {
    /// Generate a new unique worker ID using ULID.
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid())
    }
}

impl TaskId {
    /// Generate a new unique task ID using ULID.
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid())
    }
}

/// The environment a request was authenticated against.
///
/// Authentication happens upstream; this is the resolved identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedEnvironment {
    /// Environment identifier.
    pub id: EnvironmentId,
    /// Project owning the environment.
    pub project_id: ProjectId,
    /// Human-readable environment name (e.g. "prod").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl AuthenticatedEnvironment {
    /// Create an environment identity without a slug.
    #[must_use]
    pub const fn new(id: EnvironmentId, project_id: ProjectId) -> Self {
        Self {
            id,
            project_id,
            slug: None,
        }
    }
}

/// Lifecycle status of a deployment.
///
/// Only `Deployed` is written by this crate; the other states belong to the
/// build pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    /// Registered, build not started.
    Pending,
    /// Artifact is being built.
    Building,
    /// Built, waiting for its worker to register.
    Deploying,
    /// Worker registered and deployment live.
    Deployed,
    /// Build or deploy failed.
    Failed,
    /// Cancelled by the user.
    Canceled,
    /// Did not finish in time.
    TimedOut,
}

impl DeploymentStatus {
    /// Get the status name as stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Building => "BUILDING",
            Self::Deploying => "DEPLOYING",
            Self::Deployed => "DEPLOYED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::TimedOut => "TIMED_OUT",
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "BUILDING" => Ok(Self::Building),
            "DEPLOYING" => Ok(Self::Deploying),
            "DEPLOYED" => Ok(Self::Deployed),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" => Ok(Self::Canceled),
            "TIMED_OUT" => Ok(Self::TimedOut),
            _ => Err(format!("unknown deployment status: {s}")),
        }
    }
}

/// A deployment as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Internal identifier.
    pub id: DeploymentId,
    /// External identifier used by clients.
    pub friendly_id: String,
    /// Project this deployment belongs to.
    pub project_id: ProjectId,
    /// Environment this deployment targets.
    pub environment_id: EnvironmentId,
    /// Version label assigned by the build pipeline (e.g. "20240501.3").
    pub version: String,
    /// Current status.
    pub status: DeploymentStatus,
    /// Worker registered for this deployment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
    /// When the deployment went live.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<DateTime<Utc>>,
    /// When the deployment was created.
    pub created_at: DateTime<Utc>,
    /// When the deployment was last updated.
    pub updated_at: DateTime<Utc>,
}

impl DeploymentRecord {
    /// Create a new pending deployment.
    #[must_use]
    pub fn new(
        friendly_id: impl Into<String>,
        environment: &AuthenticatedEnvironment,
        version: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: DeploymentId::generate(),
            friendly_id: friendly_id.into(),
            project_id: environment.project_id.clone(),
            environment_id: environment.id.clone(),
            version: version.into(),
            status: DeploymentStatus::Pending,
            worker_id: None,
            deployed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A registered background worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    /// Internal identifier.
    pub id: WorkerId,
    /// External identifier used by clients.
    pub friendly_id: String,
    /// Version inherited from the deployment.
    pub version: String,
    /// Environment the worker runs in.
    pub environment_id: EnvironmentId,
    /// Project the worker belongs to.
    pub project_id: ProjectId,
    /// Hash of the bundled task sources.
    pub content_hash: String,
    /// Version of the CLI that produced the build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cli_version: Option<String>,
    /// Version of the SDK the tasks were built against.
    pub sdk_version: String,
    /// Manifest metadata as submitted.
    pub metadata: serde_json::Value,
    /// When the worker was registered.
    pub created_at: DateTime<Utc>,
}

/// One task materialized from a worker manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Internal identifier.
    pub id: TaskId,
    /// External identifier used by clients.
    pub friendly_id: String,
    /// Worker that implements the task.
    pub worker_id: WorkerId,
    /// Environment the task is available in.
    pub environment_id: EnvironmentId,
    /// Project the task belongs to.
    pub project_id: ProjectId,
    /// Task identifier declared in the manifest.
    pub slug: String,
    /// Source file declaring the task.
    pub file_path: String,
    /// Exported symbol name.
    pub export_name: String,
    /// Zero-based index in the manifest.
    pub position: u32,
    /// Definition as submitted.
    pub definition: serde_json::Value,
    /// When the task was registered.
    pub created_at: DateTime<Utc>,
}

/// Pointer from an (environment, label) pair to a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionRecord {
    /// Environment the pointer belongs to.
    pub environment_id: EnvironmentId,
    /// Release channel name.
    pub label: String,
    /// Deployment currently promoted.
    pub deployment_id: DeploymentId,
    /// When the pointer was first created.
    pub created_at: DateTime<Utc>,
    /// When the pointer last moved.
    pub updated_at: DateTime<Utc>,
}

/// Request body submitted when a deployed worker registers.
///
/// Holds the `metadata` object exactly as submitted next to its typed view,
/// so the worker can store it without re-serialising.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawManifestPayload", into = "RawManifestPayload")]
pub struct ManifestPayload {
    metadata: ManifestMetadata,
    raw_metadata: serde_json::Value,
}

#[derive(Clone, Serialize, Deserialize)]
struct RawManifestPayload {
    metadata: serde_json::Value,
}

impl TryFrom<RawManifestPayload> for ManifestPayload {
    type Error = serde_json::Error;

    fn try_from(raw: RawManifestPayload) -> Result<Self, Self::Error> {
        Self::from_raw(raw.metadata)
    }
}

impl From<ManifestPayload> for RawManifestPayload {
    fn from(payload: ManifestPayload) -> Self {
        Self {
            metadata: payload.raw_metadata,
        }
    }
}

impl ManifestPayload {
    /// Parse a submitted `metadata` object, keeping it as the stored form.
    pub fn from_raw(raw_metadata: serde_json::Value) -> Result<Self, serde_json::Error> {
        let metadata = ManifestMetadata::deserialize(&raw_metadata)?;
        Ok(Self {
            metadata,
            raw_metadata,
        })
    }

    /// Build a payload from typed metadata.
    pub fn from_metadata(metadata: ManifestMetadata) -> Result<Self, serde_json::Error> {
        let raw_metadata = serde_json::to_value(&metadata)?;
        Ok(Self {
            metadata,
            raw_metadata,
        })
    }

    /// Typed view of the metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ManifestMetadata {
        &self.metadata
    }

    /// The metadata object as submitted.
    #[must_use]
    pub const fn raw_metadata(&self) -> &serde_json::Value {
        &self.raw_metadata
    }
}

/// Build metadata and task manifest of a worker.
///
/// Fields not modelled here are kept in `extra` so the metadata can be
/// stored exactly as it was submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMetadata {
    /// Hash of the bundled task sources.
    pub content_hash: String,
    /// Version of the CLI that produced the build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_package_version: Option<String>,
    /// Version of the SDK the tasks were built against.
    pub package_version: String,
    /// Tasks declared by the worker, in declaration order.
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
    /// Remaining metadata fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One task entry of a worker manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    /// Task identifier, unique within a worker.
    pub id: String,
    /// Source file declaring the task.
    pub file_path: String,
    /// Exported symbol name.
    pub export_name: String,
    /// Remaining definition fields (queue, retry, machine, schedule, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TaskDefinition {
    /// Create a definition with no optional settings.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        file_path: impl Into<String>,
        export_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            file_path: file_path.into(),
            export_name: export_name.into(),
            extra: serde_json::Map::new(),
        }
    }
}
