//! Pick the branches and tags to index for one repository.
//!
//! The default branch always comes first. Globs are applied in declaration
//! order and a name is kept at its first match. The combined list is capped
//! at [`MAX_REVISIONS`]: trailing tags go first, then trailing branches, and
//! the default branch is never dropped.

use codesync_domain::{GlobError, GlobList, MAX_REVISIONS, RevisionSelection, RevisionsConfig};
use codesync_shared::{ErrorEnvelope, Result};
use std::collections::HashSet;

/// Compiled revision globs for one connection.
#[derive(Debug, Clone)]
pub struct RevisionMatcher {
    branches: GlobList,
    tags: GlobList,
}

impl RevisionMatcher {
    /// Compile the connection's branch and tag globs.
    pub fn new(config: &RevisionsConfig) -> std::result::Result<Self, GlobError> {
        Ok(Self {
            branches: GlobList::new(config.branches.as_slice())?,
            tags: GlobList::new(config.tags.as_slice())?,
        })
    }

    /// Select revisions from a repository's remote refs.
    #[must_use]
    pub fn select(
        &self,
        remote_branches: &[Box<str>],
        remote_tags: &[Box<str>],
        default_branch: &str,
    ) -> RevisionSelection {
        let mut branches = Vec::new();
        if !default_branch.is_empty() {
            branches.push(Box::from(default_branch));
        }
        collect_matches(&self.branches, remote_branches, &mut branches);

        let mut tags = Vec::new();
        collect_matches(&self.tags, remote_tags, &mut tags);

        let mut selection = RevisionSelection { branches, tags };
        truncate_to_cap(&mut selection);
        selection
    }
}

/// One-shot form of [`RevisionMatcher::select`].
pub fn select_revisions(
    config: &RevisionsConfig,
    remote_branches: &[Box<str>],
    remote_tags: &[Box<str>],
    default_branch: &str,
) -> Result<RevisionSelection> {
    let matcher = RevisionMatcher::new(config).map_err(ErrorEnvelope::from)?;
    Ok(matcher.select(remote_branches, remote_tags, default_branch))
}

fn collect_matches(globs: &GlobList, names: &[Box<str>], selected: &mut Vec<Box<str>>) {
    let mut seen: HashSet<Box<str>> = selected.iter().cloned().collect();
    for matcher in globs.matchers() {
        for name in names {
            if matcher.is_match(&**name) && seen.insert(name.clone()) {
                selected.push(name.clone());
            }
        }
    }
}

fn truncate_to_cap(selection: &mut RevisionSelection) {
    selection.branches.truncate(MAX_REVISIONS);
    let room_for_tags = MAX_REVISIONS - selection.branches.len();
    selection.tags.truncate(room_for_tags);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(values: &[&str]) -> Vec<Box<str>> {
        values.iter().map(|value| Box::from(*value)).collect()
    }

    fn config(branches: &[&str], tags: &[&str]) -> RevisionsConfig {
        RevisionsConfig {
            branches: names(branches),
            tags: names(tags),
        }
    }

    #[test]
    fn release_branches_follow_the_default() -> Result<()> {
        let selection = select_revisions(
            &config(&["release/*"], &[]),
            &names(&["main", "release/1.0", "release/2.0", "dev"]),
            &[],
            "main",
        )?;
        assert_eq!(selection.branches, names(&["main", "release/1.0", "release/2.0"]));
        assert!(selection.tags.is_empty());
        Ok(())
    }

    #[test]
    fn default_branch_is_not_duplicated_when_a_glob_matches_it() -> Result<()> {
        let selection = select_revisions(
            &config(&["*"], &[]),
            &names(&["dev", "main"]),
            &[],
            "main",
        )?;
        assert_eq!(selection.branches, names(&["main", "dev"]));
        Ok(())
    }

    #[test]
    fn globs_apply_in_declaration_order() -> Result<()> {
        let selection = select_revisions(
            &config(&["hotfix/*", "release/*"], &["v2.*", "v1.*"]),
            &names(&["release/1", "hotfix/a", "release/2", "hotfix/b"]),
            &names(&["v1.0", "v2.0", "v1.1"]),
            "main",
        )?;
        assert_eq!(
            selection.branches,
            names(&["main", "hotfix/a", "hotfix/b", "release/1", "release/2"])
        );
        assert_eq!(selection.tags, names(&["v2.0", "v1.0", "v1.1"]));
        Ok(())
    }

    #[test]
    fn empty_globs_index_only_the_default_branch() -> Result<()> {
        let selection = select_revisions(
            &RevisionsConfig::default(),
            &names(&["main", "dev"]),
            &names(&["v1"]),
            "main",
        )?;
        assert_eq!(selection.branches, names(&["main"]));
        assert!(selection.tags.is_empty());
        Ok(())
    }

    #[test]
    fn seventy_branches_are_capped_at_sixty_four() -> Result<()> {
        let remote: Vec<Box<str>> = (0..70).map(|n| format!("feature/{n:02}").into()).collect();
        let selection = select_revisions(&config(&["feature/*"], &[]), &remote, &[], "main")?;
        assert_eq!(selection.len(), 64);
        assert_eq!(selection.branches.first().map(|name| &**name), Some("main"));
        assert_eq!(selection.branches.last().map(|name| &**name), Some("feature/62"));
        Ok(())
    }

    #[test]
    fn tags_are_dropped_before_branches() -> Result<()> {
        let branches: Vec<Box<str>> = (0..40).map(|n| format!("b{n}").into()).collect();
        let tags: Vec<Box<str>> = (0..40).map(|n| format!("t{n}").into()).collect();
        let selection = select_revisions(&config(&["b*"], &["t*"]), &branches, &tags, "main")?;
        assert_eq!(selection.branches.len(), 41);
        assert_eq!(selection.tags.len(), 23);
        assert_eq!(selection.tags.last().map(|name| &**name), Some("t22"));
        Ok(())
    }

    #[test]
    fn invalid_globs_surface_as_field_shape_errors() {
        let error = select_revisions(&config(&["a**b"], &[]), &[], &[], "main").err();
        assert!(error.is_some_and(|error| error.code.is("config", "invalid_field_shape")));
    }

    fn ref_names() -> impl Strategy<Value = Vec<Box<str>>> {
        prop::collection::vec("[a-c]{1,2}(/[a-c]{1,2})?", 0..120)
            .prop_map(|values| values.into_iter().map(Box::from).collect())
    }

    proptest! {
        #[test]
        fn selection_respects_cap_and_keeps_default(
            branches in ref_names(),
            tags in ref_names(),
            default in "[a-c]{1,3}",
        ) {
            let matcher = RevisionMatcher::new(&config(&["**"], &["*"]))
                .map_err(|error| TestCaseError::fail(error.to_string()))?;
            let selection = matcher.select(&branches, &tags, &default);

            prop_assert!(selection.len() <= MAX_REVISIONS);
            prop_assert_eq!(selection.branches.first().map(|name| &**name), Some(default.as_str()));

            let unique: HashSet<_> = selection.branches.iter().collect();
            prop_assert_eq!(unique.len(), selection.branches.len());
            for tag in &selection.tags {
                prop_assert!(tags.contains(tag));
                prop_assert!(!tag.contains('/'));
            }
        }
    }
}
