//! Failure taxonomy shared by config parsing, planning, and job execution.

use codesync_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every error kind a sync or indexing job can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// `type` is not one of the supported literals.
    UnknownConnectionType,
    /// A required field is absent.
    MissingRequiredField,
    /// A field has the wrong type, pattern, or enum value.
    InvalidFieldShape,
    /// A field is not part of the connection type's schema.
    UnexpectedField,
    /// The secret does not exist (unset env var or missing secret version).
    SecretNotFound,
    /// The secret resource path is malformed.
    InvalidSecretPath,
    /// The secret manager refused access.
    SecretAccessDenied,
    /// The code host could not be reached.
    CodeHostUnreachable,
    /// The code host throttled the request.
    CodeHostRateLimited,
    /// The code host rejected the credentials.
    CodeHostAuthFailed,
    /// A configuration failure prevented planning.
    SyncAborted,
    /// The job exceeded its deadline.
    Timeout,
    /// The job was cancelled.
    Cancelled,
    /// Anything else.
    Internal,
}

impl FailureKind {
    const CODES: [(Self, &'static str, &'static str); 13] = [
        (Self::UnknownConnectionType, "config", "unknown_connection_type"),
        (Self::MissingRequiredField, "config", "missing_required_field"),
        (Self::InvalidFieldShape, "config", "invalid_field_shape"),
        (Self::UnexpectedField, "config", "unexpected_field"),
        (Self::SecretNotFound, "secret", "secret_not_found"),
        (Self::InvalidSecretPath, "secret", "invalid_secret_path"),
        (Self::SecretAccessDenied, "secret", "secret_access_denied"),
        (Self::CodeHostUnreachable, "code_host", "unreachable"),
        (Self::CodeHostRateLimited, "code_host", "rate_limited"),
        (Self::CodeHostAuthFailed, "code_host", "auth_failed"),
        (Self::SyncAborted, "sync", "sync_aborted"),
        (Self::Timeout, "core", "timeout"),
        (Self::Cancelled, "core", "cancelled"),
    ];

    /// Stable error code for this kind.
    #[must_use]
    pub fn error_code(self) -> ErrorCode {
        Self::CODES
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map_or_else(ErrorCode::internal, |(_, namespace, code)| {
                ErrorCode::new(*namespace, *code)
            })
    }

    /// Classify an error code; unknown codes map to [`Self::Internal`].
    #[must_use]
    pub fn from_code(code: &ErrorCode) -> Self {
        Self::CODES
            .iter()
            .find(|(_, namespace, name)| code.is(namespace, name))
            .map_or(Self::Internal, |(kind, _, _)| *kind)
    }

    /// Retry classification.
    ///
    /// Configuration errors are fatal until corrected; secret and code-host
    /// errors are retried on a later sync.
    #[must_use]
    pub const fn class(self) -> ErrorClass {
        match self {
            Self::SecretNotFound
            | Self::SecretAccessDenied
            | Self::CodeHostUnreachable
            | Self::CodeHostRateLimited
            | Self::Timeout => ErrorClass::Retriable,
            Self::UnknownConnectionType
            | Self::MissingRequiredField
            | Self::InvalidFieldShape
            | Self::UnexpectedField
            | Self::InvalidSecretPath
            | Self::CodeHostAuthFailed
            | Self::SyncAborted
            | Self::Cancelled
            | Self::Internal => ErrorClass::NonRetriable,
        }
    }

    /// Build an expected error envelope of this kind.
    pub fn envelope(self, message: impl Into<String>) -> ErrorEnvelope {
        ErrorEnvelope::expected_with_class(self.error_code(), message, self.class())
    }

    /// Name used in job error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownConnectionType => "UnknownConnectionType",
            Self::MissingRequiredField => "MissingRequiredField",
            Self::InvalidFieldShape => "InvalidFieldShape",
            Self::UnexpectedField => "UnexpectedField",
            Self::SecretNotFound => "SecretNotFound",
            Self::InvalidSecretPath => "InvalidSecretPath",
            Self::SecretAccessDenied => "SecretAccessDenied",
            Self::CodeHostUnreachable => "CodeHostUnreachable",
            Self::CodeHostRateLimited => "CodeHostRateLimited",
            Self::CodeHostAuthFailed => "CodeHostAuthFailed",
            Self::SyncAborted => "SyncAborted",
            Self::Timeout => "Timeout",
            Self::Cancelled => "Cancelled",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
