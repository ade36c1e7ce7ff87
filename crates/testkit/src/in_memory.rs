//! In-memory port implementations for tests.
//!
//! These implementations are intended for:
//! - Unit/integration tests of the sync use cases
//! - Deterministic scheduling tests (manual clock, scripted listers)
//! - Asserting on what was logged, counted, indexed, or fetched

use codesync_domain::{
    CandidateRepo, ConnectionConfig, ConnectionName, FailureKind, RepoIdentity, SecretResourcePath,
    SyncPlanEntry,
};
use codesync_ports::{
    BoxFuture, ClockPort, EnvironmentPort, IndexOutcome, IndexerPort, LogEvent, LogFields,
    LogLevel, LoggerPort, RepoListerPort, SecretManagerPort, TelemetryPort, TelemetryTags,
};
use codesync_shared::{ErrorEnvelope, RequestContext, Result, SecretString};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A no-op logger implementation.
#[derive(Debug, Default)]
pub struct NoopLogger;

impl LoggerPort for NoopLogger {
    fn log(&self, _event: LogEvent) {}

    fn child(&self, _fields: LogFields) -> Box<dyn LoggerPort> {
        Box::new(Self)
    }
}

/// Logger that keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingLogger {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl RecordingLogger {
    /// Recorded events in emission order.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Names of recorded events at `level`.
    pub fn event_names(&self, level: LogLevel) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|event| event.level == level)
            .map(|event| event.event.to_string())
            .collect()
    }

    /// Returns true when an event with this name was logged.
    pub fn contains(&self, name: &str) -> bool {
        self.events().iter().any(|event| &*event.event == name)
    }
}

impl LoggerPort for RecordingLogger {
    fn log(&self, event: LogEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }

    fn child(&self, _fields: LogFields) -> Box<dyn LoggerPort> {
        Box::new(self.clone())
    }
}

/// A no-op telemetry implementation.
#[derive(Debug, Default)]
pub struct NoopTelemetry;

impl TelemetryPort for NoopTelemetry {
    fn increment_counter(&self, _name: &str, _value: u64, _tags: Option<&TelemetryTags>) {}

    fn record_timer_ms(&self, _name: &str, _duration_ms: u64, _tags: Option<&TelemetryTags>) {}
}

/// Telemetry sink that sums counters by name.
#[derive(Debug, Clone, Default)]
pub struct RecordingTelemetry {
    counters: Arc<Mutex<BTreeMap<String, u64>>>,
    timers: Arc<Mutex<Vec<String>>>,
}

impl RecordingTelemetry {
    /// Current value of a counter (0 when never incremented).
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner).get(name).copied().unwrap_or(0)
    }

    /// Names of recorded timers.
    pub fn timers(&self) -> Vec<String> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TelemetryPort for RecordingTelemetry {
    fn increment_counter(&self, name: &str, value: u64, _tags: Option<&TelemetryTags>) {
        *self
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_owned())
            .or_default() += value;
    }

    fn record_timer_ms(&self, name: &str, _duration_ms: u64, _tags: Option<&TelemetryTags>) {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner).push(name.to_owned());
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Start at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(now_ms)),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    /// Move forward by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl ClockPort for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Environment backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MapEnv {
    /// Empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(self, name: &str, value: &str) -> Self {
        self.set(name, value);
        self
    }

    /// Set or replace a variable.
    pub fn set(&self, name: &str, value: &str) {
        self.vars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_owned(), value.to_owned());
    }

    /// Remove a variable.
    pub fn remove(&self, name: &str) {
        self.vars.lock().unwrap_or_else(PoisonError::into_inner).remove(name);
    }
}

impl EnvironmentPort for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.lock().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }
}

/// Secret manager with scripted responses keyed by resource path.
///
/// Unknown paths answer `secret_not_found`.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretManager {
    secrets: Arc<Mutex<BTreeMap<String, Result<SecretString>>>>,
    calls: Arc<AtomicUsize>,
}

impl StaticSecretManager {
    /// Empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `value` for `path`.
    #[must_use]
    pub fn with_secret(self, path: &str, value: &str) -> Self {
        self.set_secret(path, value);
        self
    }

    /// Fail every access to `path` with `error`.
    #[must_use]
    pub fn with_error(self, path: &str, error: ErrorEnvelope) -> Self {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_owned(), Err(error));
        self
    }

    /// Replace the payload served for `path` (secret rotation).
    pub fn set_secret(&self, path: &str, value: &str) {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_owned(), Ok(SecretString::new(value)));
    }

    /// Number of `access_secret` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SecretManagerPort for StaticSecretManager {
    fn access_secret<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        path: &'a SecretResourcePath,
    ) -> BoxFuture<'a, Result<SecretString>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let key = path.to_string();
            self.secrets
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&key)
                .cloned()
                .unwrap_or_else(|| {
                    Err(FailureKind::SecretNotFound
                        .envelope(format!("secret `{key}` not found"))
                        .with_metadata("path", key.clone()))
                })
        })
    }
}

/// Repo lister with scripted responses keyed by connection name.
///
/// Unknown connections list nothing.
#[derive(Debug, Clone, Default)]
pub struct StaticRepoLister {
    responses: Arc<Mutex<BTreeMap<String, Result<Vec<CandidateRepo>>>>>,
    tokens_seen: Arc<Mutex<Vec<Option<String>>>>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl StaticRepoLister {
    /// Empty lister.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lister serving every connection of a candidates fixture map.
    pub fn from_map(listings: BTreeMap<String, Vec<CandidateRepo>>) -> Self {
        let lister = Self::new();
        for (connection, candidates) in listings {
            lister.set_candidates(&connection, candidates);
        }
        lister
    }

    /// Serve `candidates` for `connection`.
    #[must_use]
    pub fn with_candidates(self, connection: &str, candidates: Vec<CandidateRepo>) -> Self {
        self.set_candidates(connection, candidates);
        self
    }

    /// Fail listing `connection` with `error`.
    #[must_use]
    pub fn with_error(self, connection: &str, error: ErrorEnvelope) -> Self {
        self.set_error(connection, error);
        self
    }

    /// Wait this long (cancellably) before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replace the listing for `connection`.
    pub fn set_candidates(&self, connection: &str, candidates: Vec<CandidateRepo>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connection.to_owned(), Ok(candidates));
    }

    /// Replace the listing for `connection` with a failure.
    pub fn set_error(&self, connection: &str, error: ErrorEnvelope) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connection.to_owned(), Err(error));
    }

    /// Number of `list_candidates` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Exposed tokens passed to each call, in call order.
    pub fn tokens_seen(&self) -> Vec<Option<String>> {
        self.tokens_seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl RepoListerPort for StaticRepoLister {
    fn list_candidates<'a>(
        &'a self,
        ctx: &'a RequestContext,
        connection: &'a ConnectionName,
        _config: &'a ConnectionConfig,
        token: Option<&'a SecretString>,
    ) -> BoxFuture<'a, Result<Vec<CandidateRepo>>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tokens_seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(token.map(|token| token.expose().to_owned()));
            if let Some(delay) = self.delay {
                ctx.run_cancellable("static_lister.list", async {
                    tokio::time::sleep(delay).await;
                    Ok(())
                })
                .await?;
            }
            self.responses
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(connection.as_str())
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        })
    }
}

/// Indexer that records what it was asked to do.
#[derive(Debug, Clone, Default)]
pub struct RecordingIndexer {
    indexed: Arc<Mutex<Vec<SyncPlanEntry>>>,
    removed: Arc<Mutex<Vec<RepoIdentity>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    cancelled: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl RecordingIndexer {
    /// Indexer that succeeds immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait this long (cancellably) per repository.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail indexing of `identity`.
    #[must_use]
    pub fn failing_on(self, identity: &str) -> Self {
        self.failing.lock().unwrap_or_else(PoisonError::into_inner).insert(identity.to_owned());
        self
    }

    /// Entries indexed so far.
    pub fn indexed(&self) -> Vec<SyncPlanEntry> {
        self.indexed.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Identities removed so far.
    pub fn removed(&self) -> Vec<RepoIdentity> {
        self.removed.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of index runs interrupted by cancellation.
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl IndexerPort for RecordingIndexer {
    fn index_repo<'a>(
        &'a self,
        ctx: &'a RequestContext,
        entry: &'a SyncPlanEntry,
    ) -> BoxFuture<'a, Result<IndexOutcome>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                let waited = ctx
                    .run_cancellable("recording_indexer.index", async {
                        tokio::time::sleep(delay).await;
                        Ok(())
                    })
                    .await;
                if let Err(error) = waited {
                    self.cancelled.fetch_add(1, Ordering::SeqCst);
                    return Err(error);
                }
            }
            if self.failing.lock().unwrap_or_else(PoisonError::into_inner).contains(entry.identity.as_str()) {
                return Err(ErrorEnvelope::expected(
                    codesync_shared::ErrorCode::new("indexer", "index_failed"),
                    format!("cannot index {}", entry.identity),
                ));
            }
            self.indexed.lock().unwrap_or_else(PoisonError::into_inner).push(entry.clone());
            Ok(IndexOutcome {
                indexed_revisions: entry.revisions.len(),
                warnings: Vec::new(),
            })
        })
    }

    fn remove_repo<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        identity: &'a RepoIdentity,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.removed.lock().unwrap_or_else(PoisonError::into_inner).push(identity.clone());
            Ok(())
        })
    }
}
