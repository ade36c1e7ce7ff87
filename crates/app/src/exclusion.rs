//! Candidate filtering: inclusion selectors and exclusion rules.
//!
//! A candidate survives when it is selected (or nothing is selected) and no
//! exclusion rule matches. Exclusion always wins over inclusion. Output keeps
//! the input order.
//!
//! Every selector and name or topic rule ignores case, as code hosts do for
//! owners and repository names. Only revision globs are case-sensitive.

use codesync_domain::{
    CandidateRepo, ConnectionConfig, ExclusionRules, GlobError, GlobList, InclusionSelectors,
    SizeRange,
};
use codesync_shared::{ErrorEnvelope, Result};

/// Why a candidate was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    /// `exclude.forks`.
    Fork,
    /// `exclude.archived`.
    Archived,
    /// `exclude.size`.
    Size,
    /// `exclude.repos` / `exclude.projects`.
    Name,
    /// `exclude.topics`.
    Topic,
    /// `exclude.readOnly`.
    ReadOnly,
    /// `exclude.hidden`.
    Hidden,
    /// `exclude.disabled`.
    Disabled,
    /// No inclusion selector matched.
    NotSelected,
}

impl ExclusionReason {
    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fork => "fork",
            Self::Archived => "archived",
            Self::Size => "size",
            Self::Name => "name",
            Self::Topic => "topic",
            Self::ReadOnly => "read_only",
            Self::Hidden => "hidden",
            Self::Disabled => "disabled",
            Self::NotSelected => "not_selected",
        }
    }
}

/// Compiled filter for one connection.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    forks: bool,
    archived: bool,
    read_only: bool,
    hidden: bool,
    disabled: bool,
    size: Option<SizeRange>,
    excluded_names: GlobList,
    excluded_topics: GlobList,
    selector: Selector,
}

#[derive(Debug, Clone)]
struct Selector {
    unrestricted: bool,
    owners: Vec<String>,
    namespaces: Vec<String>,
    names: GlobList,
    topics: GlobList,
}

impl ExclusionFilter {
    /// Compile normalized rules and selectors.
    pub fn new(
        rules: &ExclusionRules,
        selectors: &InclusionSelectors,
    ) -> std::result::Result<Self, GlobError> {
        Ok(Self {
            forks: rules.forks,
            archived: rules.archived,
            read_only: rules.read_only,
            hidden: rules.hidden,
            disabled: rules.disabled,
            size: rules.size,
            excluded_names: GlobList::case_insensitive(rules.names.as_slice())?,
            excluded_topics: GlobList::case_insensitive(rules.topics.as_slice())?,
            selector: Selector {
                unrestricted: selectors.is_unrestricted(),
                owners: selectors
                    .owners
                    .iter()
                    .map(|owner| owner.to_ascii_lowercase())
                    .collect(),
                namespaces: selectors
                    .namespaces
                    .iter()
                    .map(|namespace| namespace.trim_end_matches('/').to_ascii_lowercase())
                    .collect(),
                names: GlobList::case_insensitive(selectors.names.as_slice())?,
                topics: GlobList::case_insensitive(selectors.topics.as_slice())?,
            },
        })
    }

    /// Compile the filter of a connection config.
    pub fn from_config(config: &ConnectionConfig) -> std::result::Result<Self, GlobError> {
        Self::new(&config.exclusion_rules(), &config.inclusion_selectors())
    }

    /// Reason `repo` is dropped, or `None` when it survives.
    #[must_use]
    pub fn exclusion_reason(&self, repo: &CandidateRepo) -> Option<ExclusionReason> {
        if self.forks && repo.is_fork {
            return Some(ExclusionReason::Fork);
        }
        if self.archived && repo.is_archived {
            return Some(ExclusionReason::Archived);
        }
        if self.size.is_some_and(|range| outside(range, repo)) {
            return Some(ExclusionReason::Size);
        }
        if self.excluded_names.is_match(&repo.name) {
            return Some(ExclusionReason::Name);
        }
        if repo
            .topics
            .iter()
            .any(|topic| self.excluded_topics.is_match(topic))
        {
            return Some(ExclusionReason::Topic);
        }
        if self.read_only && repo.is_read_only {
            return Some(ExclusionReason::ReadOnly);
        }
        if self.hidden && repo.is_hidden {
            return Some(ExclusionReason::Hidden);
        }
        if self.disabled && repo.is_disabled {
            return Some(ExclusionReason::Disabled);
        }
        if !self.selector.selects(repo) {
            return Some(ExclusionReason::NotSelected);
        }
        None
    }

    /// Returns true when `repo` survives the filter.
    #[must_use]
    pub fn retains(&self, repo: &CandidateRepo) -> bool {
        self.exclusion_reason(repo).is_none()
    }

    /// Keep the surviving candidates, in input order.
    pub fn filter(&self, candidates: Vec<CandidateRepo>) -> Vec<CandidateRepo> {
        candidates
            .into_iter()
            .filter(|repo| self.retains(repo))
            .collect()
    }
}

impl Selector {
    fn selects(&self, repo: &CandidateRepo) -> bool {
        if self.unrestricted {
            return true;
        }
        let owner = repo.owner.to_ascii_lowercase();
        let name = repo.name.to_ascii_lowercase();
        self.owners.contains(&owner)
            || self.namespaces.iter().any(|namespace| {
                owner == *namespace
                    || name
                        .strip_prefix(namespace.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            || self.names.is_match(&repo.name)
            || repo
                .topics
                .iter()
                .any(|topic| self.topics.is_match(topic))
    }
}

/// Unknown sizes are never out of range.
fn outside(range: SizeRange, repo: &CandidateRepo) -> bool {
    let Some(size) = repo.size_bytes.or(repo.disk_usage_bytes) else {
        return false;
    };
    range.min.is_some_and(|min| size < min) || range.max.is_some_and(|max| size > max)
}

/// Filter `candidates` with normalized rules and selectors.
pub fn filter_candidates(
    candidates: Vec<CandidateRepo>,
    rules: &ExclusionRules,
    selectors: &InclusionSelectors,
) -> Result<Vec<CandidateRepo>> {
    let filter = ExclusionFilter::new(rules, selectors).map_err(ErrorEnvelope::from)?;
    Ok(filter.filter(candidates))
}
