//! # codesync-testkit
//!
//! Test doubles and fixtures.
//! This crate depends on `ports`, `domain`, and `shared`.

pub mod errors;
pub mod fixtures;
pub mod in_memory;

/// Returns the testkit crate version.
#[must_use]
pub const fn testkit_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesync_ports::ports_crate_version;
    use codesync_shared::shared_crate_version;

    #[test]
    fn testkit_crate_compiles() {
        assert!(!testkit_crate_version().is_empty());
        assert!(!ports_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }

    #[test]
    fn error_fixtures_are_available() {
        let codes = errors::common_error_codes();
        assert!(!codes.is_empty());
        assert!(errors::rate_limited_error().code.is("code_host", "rate_limited"));
    }
}
