//! The single glob dialect used for revisions, repo names, and topics.
//!
//! Only `*` and `**` are special. `*` matches within one `/`-separated
//! segment and `**` matches across segments. Every other character
//! (including `?`, `[`, `{`) is literal. Patterns are anchored to the full
//! name and case-sensitive unless built with [`GlobList::case_insensitive`].

use crate::failure::FailureKind;
use codesync_shared::ErrorEnvelope;
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use std::fmt;

/// A pattern could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobError {
    /// Offending pattern.
    pub pattern: String,
    /// Reason reported by the matcher.
    pub reason: String,
}

impl fmt::Display for GlobError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "invalid glob `{}`: {}",
            self.pattern, self.reason
        )
    }
}

impl std::error::Error for GlobError {}

impl From<GlobError> for ErrorEnvelope {
    fn from(error: GlobError) -> Self {
        FailureKind::InvalidFieldShape
            .envelope(error.to_string())
            .with_metadata("pattern", error.pattern)
    }
}

/// A compiled list of glob patterns, matched as a union.
#[derive(Debug, Clone)]
pub struct GlobList {
    patterns: Vec<Box<str>>,
    matchers: Vec<GlobMatcher>,
    set: GlobSet,
}

impl GlobList {
    /// Compile case-sensitive patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, GlobError> {
        Self::build(patterns, false)
    }

    /// Compile patterns that ignore ASCII case.
    pub fn case_insensitive<S: AsRef<str>>(patterns: &[S]) -> Result<Self, GlobError> {
        Self::build(patterns, true)
    }

    /// An empty list that matches nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            matchers: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    fn build<S: AsRef<str>>(patterns: &[S], case_insensitive: bool) -> Result<Self, GlobError> {
        let mut builder = GlobSetBuilder::new();
        let mut matchers = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = GlobBuilder::new(&escape_non_star(pattern))
                .literal_separator(true)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|error| GlobError {
                    pattern: pattern.to_owned(),
                    reason: error.kind().to_string(),
                })?;
            matchers.push(glob.compile_matcher());
            builder.add(glob);
        }
        let set = builder.build().map_err(|error| GlobError {
            pattern: patterns
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join(", "),
            reason: error.to_string(),
        })?;
        Ok(Self {
            patterns: patterns.iter().map(|pattern| pattern.as_ref().into()).collect(),
            matchers,
            set,
        })
    }

    /// Returns true when any pattern matches the full `name`.
    #[must_use]
    pub fn is_match(&self, name: &str) -> bool {
        !self.patterns.is_empty() && self.set.is_match(name)
    }

    /// Per-pattern matchers in declaration order.
    pub fn matchers(&self) -> impl Iterator<Item = &GlobMatcher> {
        self.matchers.iter()
    }

    /// Source patterns in declaration order.
    #[must_use]
    pub fn patterns(&self) -> &[Box<str>] {
        &self.patterns
    }

    /// Returns true when no patterns were configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Number of configured patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

/// Check that a single pattern compiles in this dialect.
pub fn validate_glob(pattern: &str) -> Result<(), GlobError> {
    GlobList::new(&[pattern]).map(|_| ())
}

/// Escape everything except `*` so globset treats it literally.
fn escape_non_star(pattern: &str) -> String {
    pattern
        .split('*')
        .map(globset::escape)
        .collect::<Vec<_>>()
        .join("*")
}
