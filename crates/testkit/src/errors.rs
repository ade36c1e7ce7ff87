//! Test fixtures for shared error codes and envelopes.

use codesync_domain::FailureKind;
use codesync_shared::{ErrorClass, ErrorCode, ErrorEnvelope};

/// Return a list of common error codes used in tests.
pub fn common_error_codes() -> Vec<ErrorCode> {
    vec![
        ErrorCode::cancelled(),
        ErrorCode::invalid_input(),
        ErrorCode::not_found(),
        ErrorCode::timeout(),
        ErrorCode::io(),
        ErrorCode::internal(),
    ]
}

/// A cancellation error fixture.
pub fn cancelled_error() -> ErrorEnvelope {
    ErrorEnvelope::cancelled("cancelled")
}

/// A retriable timeout error fixture.
pub fn timeout_error() -> ErrorEnvelope {
    ErrorEnvelope::unexpected(ErrorCode::timeout(), "timeout", ErrorClass::Retriable)
}

/// The code host refused the connection.
pub fn unreachable_error() -> ErrorEnvelope {
    FailureKind::CodeHostUnreachable.envelope("connection refused")
}

/// The code host throttled the request.
pub fn rate_limited_error() -> ErrorEnvelope {
    FailureKind::CodeHostRateLimited
        .envelope("secondary rate limit exceeded")
        .with_metadata("retryAfterSecs", "60")
}

/// The code host rejected the credentials.
pub fn auth_failed_error() -> ErrorEnvelope {
    FailureKind::CodeHostAuthFailed.envelope("bad credentials")
}
