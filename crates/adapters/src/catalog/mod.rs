//! Repository catalogs.

mod file;
mod memory;

pub use file::FileCatalog;
pub use memory::InMemoryCatalog;

use codesync_domain::{ConnectionName, PlanDiff, RepoIdentity, RepoRecord, SyncPlan};
use codesync_shared::{ErrorClass, ErrorCode, ErrorEnvelope, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const TABLE_VERSION: u32 = 1;

/// Serializable repository ownership table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTable {
    version: u32,
    #[serde(default)]
    repos: BTreeMap<RepoIdentity, RepoRecord>,
}

impl Default for CatalogTable {
    fn default() -> Self {
        Self {
            version: TABLE_VERSION,
            repos: BTreeMap::new(),
        }
    }
}

impl CatalogTable {
    fn check_version(&self) -> Result<()> {
        if self.version == TABLE_VERSION {
            return Ok(());
        }
        Err(ErrorEnvelope::unexpected(
            ErrorCode::new("store", "unsupported_version"),
            format!("catalog version {} is not supported", self.version),
            ErrorClass::NonRetriable,
        ))
    }

    /// Make `plan.connection` own exactly the plan's repositories.
    pub fn apply(&mut self, plan: &SyncPlan, at_ms: u64) -> Result<PlanDiff> {
        self.check_version()?;
        let mut diff = PlanDiff::default();
        let planned: BTreeSet<&RepoIdentity> = plan.identities().collect();

        for entry in &plan.entries {
            let record = self
                .repos
                .entry(entry.identity.clone())
                .or_insert_with(|| RepoRecord {
                    identity: entry.identity.clone(),
                    name: entry.name.clone(),
                    clone_url: entry.clone_url.clone(),
                    revisions: entry.revisions.clone(),
                    owners: BTreeSet::new(),
                    indexed_at_ms: None,
                    orphaned_at_ms: None,
                });
            if record.owners.insert(plan.connection.clone()) {
                diff.added.push(entry.identity.clone());
            } else {
                diff.retained.push(entry.identity.clone());
            }
            record.name.clone_from(&entry.name);
            record.clone_url.clone_from(&entry.clone_url);
            record.revisions.clone_from(&entry.revisions);
            record.orphaned_at_ms = None;
        }

        for (identity, record) in &mut self.repos {
            if planned.contains(identity) || !record.owners.remove(&plan.connection) {
                continue;
            }
            diff.removed.push(identity.clone());
            if record.owners.is_empty() {
                record.orphaned_at_ms = Some(at_ms);
            }
        }
        Ok(diff)
    }

    /// Drop `connection` from every owner set.
    ///
    /// Returns the repositories it owned. Those left without owners get
    /// `orphaned_at_ms = at_ms`.
    pub fn release_connection(
        &mut self,
        connection: &ConnectionName,
        at_ms: u64,
    ) -> Result<Vec<RepoIdentity>> {
        self.check_version()?;
        let mut released = Vec::new();
        for (identity, record) in &mut self.repos {
            if !record.owners.remove(connection) {
                continue;
            }
            released.push(identity.clone());
            if record.owners.is_empty() {
                record.orphaned_at_ms = Some(at_ms);
            }
        }
        Ok(released)
    }

    /// Every repository, ordered by identity.
    #[must_use]
    pub fn list(&self) -> Vec<RepoRecord> {
        self.repos.values().cloned().collect()
    }

    /// One repository.
    #[must_use]
    pub fn get(&self, identity: &RepoIdentity) -> Option<RepoRecord> {
        self.repos.get(identity).cloned()
    }

    /// Stamp a successful index.
    pub fn record_indexed(&mut self, identity: &RepoIdentity, at_ms: u64) -> Result<()> {
        self.check_version()?;
        let record = self.repos.get_mut(identity).ok_or_else(|| {
            ErrorEnvelope::expected(
                ErrorCode::not_found(),
                format!("repository `{identity}` is not in the catalog"),
            )
            .with_metadata("repo", identity.as_str())
        })?;
        record.indexed_at_ms = Some(at_ms);
        Ok(())
    }

    /// Remove an unowned repository; owned ones are kept and `false` returned.
    pub fn remove(&mut self, identity: &RepoIdentity) -> Result<bool> {
        self.check_version()?;
        match self.repos.get(identity) {
            Some(record) if !record.is_orphaned() => Ok(false),
            Some(_) => {
                self.repos.remove(identity);
                Ok(true)
            },
            None => Ok(true),
        }
    }
}
