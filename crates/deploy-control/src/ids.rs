//! Friendly identifier generation.
//!
//! Friendly identifiers are the external, URL-safe handles clients use
//! (`worker_01hx...`). Internal identifiers never leave the store.

use std::sync::atomic::{AtomicU64, Ordering};

/// Namespace for worker identifiers.
pub const WORKER_NAMESPACE: &str = "worker";

/// Namespace for task identifiers.
pub const TASK_NAMESPACE: &str = "task";

/// Source of friendly identifiers.
pub trait FriendlyIdGenerator: Send + Sync {
    /// Generate a new identifier within `namespace`.
    ///
    /// Identifiers must be unique within a namespace and URL-safe.
    fn generate(&self, namespace: &str) -> String;
}

/// Generates `<namespace>_<ulid>` identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UlidFriendlyIds;

impl FriendlyIdGenerator for UlidFriendlyIds {
    fn generate(&self, namespace: &str) -> String {
        format!(
            "{namespace}_{}",
            ulid::Ulid::new().to_string().to_lowercase()
        )
    }
}

/// Deterministic generator producing `<namespace>_<n>`.
///
/// The counter is shared across namespaces.
#[derive(Debug, Default)]
pub struct SequentialFriendlyIds {
    next: AtomicU64,
}

impl SequentialFriendlyIds {
    /// Create a generator starting at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FriendlyIdGenerator for SequentialFriendlyIds {
    fn generate(&self, namespace: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{namespace}_{n}")
    }
}
