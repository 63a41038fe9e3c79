//! Worker registration and deployment promotion.
//!
//! A deployed worker registers in two units of atomicity:
//!
//! ```text
//! transaction {
//!     WorkerRegistrar::register      insert worker
//!     TaskLinker::link               insert one task per manifest entry
//!     DeploymentFinalizer::finalize  status = DEPLOYED, link worker
//! }
//! PromotionPointer::promote          upsert (environment, label) -> deployment
//! ```
//!
//! The promotion runs after the commit and can be retried on its own.

mod finalizer;
mod linker;
mod promotion;
mod registrar;
mod service;

pub use finalizer::DeploymentFinalizer;
pub use linker::TaskLinker;
pub use promotion::{PromotionPointer, CURRENT_DEPLOYMENT_LABEL};
pub use registrar::WorkerRegistrar;
pub use service::{DeployedWorkerService, RegistrationOutcome};
