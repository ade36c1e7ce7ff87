//! The set of configured connections, valid or rejected.

use crate::plan_builder::SyncPlanInput;
use codesync_domain::{ConnectionConfig, ConnectionName};
use codesync_shared::ErrorEnvelope;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

type Entry = std::result::Result<ConnectionConfig, ErrorEnvelope>;

/// Every connection named by the config file, keyed by name.
///
/// Rejected connections stay in the set so their sync jobs can fail with
/// `SyncAborted` instead of disappearing silently.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSet {
    entries: BTreeMap<ConnectionName, Entry>,
}

impl ConnectionSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parsed connection.
    pub fn insert_valid(&mut self, name: ConnectionName, config: ConnectionConfig) {
        self.entries.insert(name, Ok(config));
    }

    /// Add or replace a connection whose config was rejected.
    pub fn insert_rejected(&mut self, name: ConnectionName, error: ErrorEnvelope) {
        self.entries.insert(name, Err(error));
    }

    /// Look up one connection.
    #[must_use]
    pub fn get(&self, name: &ConnectionName) -> Option<std::result::Result<&ConnectionConfig, &ErrorEnvelope>> {
        self.entries.get(name).map(std::result::Result::as_ref)
    }

    /// Names in order.
    pub fn names(&self) -> impl Iterator<Item = &ConnectionName> {
        self.entries.keys()
    }

    /// Returns true when `name` is configured and parsed cleanly.
    #[must_use]
    pub fn is_valid(&self, name: &ConnectionName) -> bool {
        self.entries.get(name).is_some_and(std::result::Result::is_ok)
    }

    /// Number of connections, valid or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// SHA-256 of the connection's canonical JSON (or of its rejection),
    /// hex encoded. `None` when `name` is not configured.
    ///
    /// Token references are hashed, never token values.
    #[must_use]
    pub fn fingerprint(&self, name: &ConnectionName) -> Option<Box<str>> {
        let canonical = match self.entries.get(name)? {
            Ok(config) => serde_json::to_value(config).ok()?,
            Err(error) => serde_json::json!({
                "rejected": error.code.to_string(),
                "message": error.message.as_str(),
            }),
        };
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        Some(digest.iter().map(|byte| format!("{byte:02x}")).collect::<String>().into_boxed_str())
    }

    /// Plan-builder input for `name`, or `None` when it is not configured.
    #[must_use]
    pub fn sync_input(&self, name: &ConnectionName) -> Option<SyncPlanInput> {
        self.entries.get(name).map(|entry| SyncPlanInput {
            connection: name.clone(),
            config: entry.clone(),
        })
    }
}

impl FromIterator<(ConnectionName, Entry)> for ConnectionSet {
    fn from_iter<I: IntoIterator<Item = (ConnectionName, Entry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
