//! # codesync-adapters
//!
//! Adapter implementations for ports (job stores, catalog, secret manager,
//! listers, indexer, logging). This crate depends on `ports`, `domain`, and
//! `shared`.

pub mod catalog;
pub mod fixture_lister;
#[cfg(feature = "gcp-secret-manager")]
pub mod gcp_secrets;
pub mod job_store;
mod json_file;
pub mod log_sink;
pub mod logger;
pub mod manifest_indexer;
pub mod system;
pub mod telemetry;

pub use catalog::{CatalogTable, FileCatalog, InMemoryCatalog};
pub use fixture_lister::FixtureRepoLister;
#[cfg(feature = "gcp-secret-manager")]
pub use gcp_secrets::{ACCESS_TOKEN_ENV, GcpSecretManager, GcpSecretManagerConfig};
pub use job_store::{FileJobStore, InMemoryJobStore, JobTable};
pub use log_sink::{LogSink, MemoryLogSink, StderrLogSink};
pub use logger::{JsonLogger, TracingLogger};
pub use manifest_indexer::{IndexManifest, ManifestIndexer};
pub use system::{ProcessEnv, SystemClock};
pub use telemetry::{JsonTelemetry, TaggedTelemetry};

/// Returns the adapters crate version.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
