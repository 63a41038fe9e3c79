//! Test fixtures for control plane integration tests.

use deploy_control::{ManifestMetadata, ManifestPayload, TaskDefinition};

/// Builder for registration bodies.
pub struct ManifestBuilder {
    content_hash: String,
    cli_package_version: Option<String>,
    package_version: String,
    tasks: Vec<TaskDefinition>,
}

impl ManifestBuilder {
    /// Creates an empty manifest with the given content hash.
    pub fn new(content_hash: &str) -> Self {
        Self {
            content_hash: content_hash.to_string(),
            cli_package_version: Some("3.0.0".to_string()),
            package_version: "3.0.1".to_string(),
            tasks: vec![],
        }
    }

    /// Adds a task exported from `src/trigger/<slug>.ts`.
    pub fn with_task(mut self, slug: &str) -> Self {
        self.tasks.push(TaskDefinition::new(
            slug,
            format!("src/trigger/{slug}.ts"),
            slug.replace('/', "_"),
        ));
        self
    }

    /// Adds a task with extra definition fields.
    pub fn with_task_config(mut self, slug: &str, config: serde_json::Value) -> Self {
        let mut task = TaskDefinition::new(slug, format!("src/trigger/{slug}.ts"), slug);
        if let serde_json::Value::Object(fields) = config {
            task.extra.extend(fields);
        }
        self.tasks.push(task);
        self
    }

    /// Omits the CLI version.
    pub fn without_cli_version(mut self) -> Self {
        self.cli_package_version = None;
        self
    }

    /// Builds the registration body.
    pub fn build(self) -> ManifestPayload {
        ManifestPayload::from_metadata(ManifestMetadata {
            content_hash: self.content_hash,
            cli_package_version: self.cli_package_version,
            package_version: self.package_version,
            tasks: self.tasks,
            extra: serde_json::Map::new(),
        })
        .unwrap()
    }

    /// Builds the registration body as JSON.
    pub fn build_json(self) -> serde_json::Value {
        serde_json::to_value(self.build()).unwrap()
    }
}
