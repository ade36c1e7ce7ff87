//! # codesync-ports
//!
//! Port traits between the sync use cases and the outside world: code-host
//! listers, secret sources, the job store, the repository catalog, and the
//! indexer hand-off.
//!
//! This crate depends only on `domain` and `shared`.

use std::future::Future;
use std::pin::Pin;

/// Boxed future used by port traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Returns the ports crate version.
#[must_use]
pub const fn ports_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub mod catalog;
pub mod clock;
pub mod code_host;
pub mod indexer;
pub mod jobs;
pub mod logger;
pub mod secrets;
pub mod telemetry;

pub use catalog::*;
pub use clock::*;
pub use code_host::*;
pub use indexer::*;
pub use jobs::*;
pub use logger::*;
pub use secrets::*;
pub use telemetry::*;

// Domain types used in port signatures, so adapters can implement ports
// without a direct `codesync-domain` dependency.
pub use codesync_domain::{
    CandidateRepo, ConnectionConfig, ConnectionName, EntityRef, JobId, JobKind, JobRecord,
    JobStatus, JobTransition, PlanDiff, RepoIdentity, RepoRecord, SecretResourcePath, SyncPlan,
    SyncPlanEntry,
};
