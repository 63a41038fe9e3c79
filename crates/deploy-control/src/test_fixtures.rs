//! Test fixtures shared by the unit tests.

use rstest::fixture;

use crate::store::{DeploymentStore, MemoryStore};
use crate::types::{
    AuthenticatedEnvironment, DeploymentRecord, EnvironmentId, ManifestMetadata, ManifestPayload,
    ProjectId, TaskDefinition,
};

/// Production environment of a test project.
#[fixture]
pub fn environment() -> AuthenticatedEnvironment {
    AuthenticatedEnvironment {
        id: EnvironmentId::new("env_prod"),
        project_id: ProjectId::new("proj_1"),
        slug: Some("prod".to_owned()),
    }
}

/// Manifest metadata declaring one task per slug.
pub fn manifest(slugs: &[&str]) -> ManifestMetadata {
    ManifestMetadata {
        content_hash: "c0ffee".to_owned(),
        cli_package_version: Some("3.0.0".to_owned()),
        package_version: "3.0.1".to_owned(),
        tasks: slugs
            .iter()
            .map(|slug| {
                TaskDefinition::new(
                    *slug,
                    format!("src/trigger/{slug}.ts"),
                    slug.replace('/', "_"),
                )
            })
            .collect(),
        extra: serde_json::Map::new(),
    }
}

/// Registration body declaring one task per slug.
pub fn payload(slugs: &[&str]) -> ManifestPayload {
    ManifestPayload::from_metadata(manifest(slugs)).expect("manifest serialises")
}

/// Insert a pending deployment.
pub async fn seed_deployment(
    store: &MemoryStore,
    environment: &AuthenticatedEnvironment,
    friendly_id: &str,
    version: &str,
) -> DeploymentRecord {
    let record = DeploymentRecord::new(friendly_id, environment, version);
    store
        .insert_deployment(&record)
        .await
        .expect("failed to seed deployment");
    record
}
