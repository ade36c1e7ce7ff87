//! # codesync-shared
//!
//! Shared utilities, result types, and error handling for the codesync workspace.
//!
//! - Result and error envelope types
//! - Request context, cancellation, and bounded worker pools
//! - Retry/backoff and deadline helpers
//! - Secret redaction and bounded numeric invariants
//!
//! This crate has no workspace dependencies.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod concurrency;
pub mod errors;
pub mod invariants;
pub mod redaction;
pub mod result;
pub mod retry;
pub mod timeout;

pub use concurrency::{CorrelationId, RequestContext, WorkerPool};
pub use errors::{ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, ErrorMetadata};
pub use invariants::{BoundedU32, BoundedU64, BoundsError, Validated};
pub use redaction::{REDACTED, SecretString, is_secret_key, redact_if_secret};
pub use result::Result;
pub use retry::{RetryPolicy, exponential_backoff_ms, retry_async};
pub use timeout::with_deadline;

/// Returns the shared crate version.
#[must_use]
pub const fn shared_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
