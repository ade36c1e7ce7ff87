//! Scheduler settings: defaults, bounds, and validated accessors.

use crate::schema::ConfigSchemaError;
use codesync_shared::{BoundedU32, BoundedU64};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const INTERVAL_MIN_MS: u64 = 1_000;
const INTERVAL_MAX_MS: u64 = 31_536_000_000;
const POLLING_MIN_MS: u64 = 100;
const POLLING_MAX_MS: u64 = 3_600_000;
const CONCURRENCY_MIN: u32 = 1;
const CONCURRENCY_MAX: u32 = 256;
const GC_GRACE_MIN_MS: u64 = 0;
const GC_GRACE_MAX_MS: u64 = 604_800_000;
const JOB_TIMEOUT_MIN_MS: u64 = 1_000;
const JOB_TIMEOUT_MAX_MS: u64 = 86_400_000;
const BACKOFF_BASE_MIN_MS: u64 = 100;
const BACKOFF_BASE_MAX_MS: u64 = 600_000;
const BACKOFF_MAX_MIN_MS: u64 = 1_000;
const BACKOFF_MAX_MAX_MS: u64 = 86_400_000;
const RETAINED_JOBS_MIN: u32 = 1;
const RETAINED_JOBS_MAX: u32 = 100_000;

type IntervalMs = BoundedU64<INTERVAL_MIN_MS, INTERVAL_MAX_MS>;
type PollingMs = BoundedU64<POLLING_MIN_MS, POLLING_MAX_MS>;
type Concurrency = BoundedU32<CONCURRENCY_MIN, CONCURRENCY_MAX>;
type GcGraceMs = BoundedU64<GC_GRACE_MIN_MS, GC_GRACE_MAX_MS>;
type JobTimeoutMs = BoundedU64<JOB_TIMEOUT_MIN_MS, JOB_TIMEOUT_MAX_MS>;
type BackoffBaseMs = BoundedU64<BACKOFF_BASE_MIN_MS, BACKOFF_BASE_MAX_MS>;
type BackoffMaxMs = BoundedU64<BACKOFF_MAX_MIN_MS, BACKOFF_MAX_MAX_MS>;
type RetainedJobs = BoundedU32<RETAINED_JOBS_MIN, RETAINED_JOBS_MAX>;

/// Raw scheduler settings as they appear under `settings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Settings {
    /// Minimum time between successful syncs of one connection.
    pub resync_connection_interval_ms: u64,
    /// How often due connections are looked for.
    pub resync_connection_polling_interval_ms: u64,
    /// Minimum age of an index before a repo is reindexed.
    pub reindex_interval_ms: u64,
    /// How often due repos are looked for.
    pub reindex_repo_polling_interval_ms: u64,
    /// Connection sync jobs running at once.
    pub max_connection_sync_job_concurrency: u32,
    /// Repo indexing jobs running at once.
    pub max_repo_indexing_job_concurrency: u32,
    /// Repo garbage collection jobs running at once.
    pub max_repo_garbage_collection_job_concurrency: u32,
    /// How long an orphaned repo is kept before collection.
    pub repo_garbage_collection_grace_period_ms: u64,
    /// Indexing job deadline.
    pub repo_index_timeout_ms: u64,
    /// Connection sync job deadline.
    pub connection_sync_timeout_ms: u64,
    /// First delay after a rate-limited sync.
    pub rate_limit_backoff_base_ms: u64,
    /// Ceiling for the rate-limit delay.
    pub rate_limit_backoff_max_ms: u64,
    /// Finished jobs kept per entity; older ones are pruned.
    pub max_terminal_jobs_per_entity: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resync_connection_interval_ms: 86_400_000,
            resync_connection_polling_interval_ms: 1_000,
            reindex_interval_ms: 3_600_000,
            reindex_repo_polling_interval_ms: 1_000,
            max_connection_sync_job_concurrency: 8,
            max_repo_indexing_job_concurrency: 8,
            max_repo_garbage_collection_job_concurrency: 8,
            repo_garbage_collection_grace_period_ms: 10_000,
            repo_index_timeout_ms: 7_200_000,
            connection_sync_timeout_ms: 7_200_000,
            rate_limit_backoff_base_ms: 3_000,
            rate_limit_backoff_max_ms: 3_600_000,
            max_terminal_jobs_per_entity: 100,
        }
    }
}

impl Settings {
    /// Range-check every setting.
    pub fn validate(&self) -> Result<ValidatedSettings, ConfigSchemaError> {
        let validated = ValidatedSettings {
            resync_connection_interval_ms: bounded_u64(
                "resyncConnectionIntervalMs",
                self.resync_connection_interval_ms,
            )?,
            resync_connection_polling_interval_ms: bounded_u64(
                "resyncConnectionPollingIntervalMs",
                self.resync_connection_polling_interval_ms,
            )?,
            reindex_interval_ms: bounded_u64("reindexIntervalMs", self.reindex_interval_ms)?,
            reindex_repo_polling_interval_ms: bounded_u64(
                "reindexRepoPollingIntervalMs",
                self.reindex_repo_polling_interval_ms,
            )?,
            max_connection_sync_job_concurrency: bounded_u32(
                "maxConnectionSyncJobConcurrency",
                self.max_connection_sync_job_concurrency,
            )?,
            max_repo_indexing_job_concurrency: bounded_u32(
                "maxRepoIndexingJobConcurrency",
                self.max_repo_indexing_job_concurrency,
            )?,
            max_repo_garbage_collection_job_concurrency: bounded_u32(
                "maxRepoGarbageCollectionJobConcurrency",
                self.max_repo_garbage_collection_job_concurrency,
            )?,
            repo_garbage_collection_grace_period_ms: bounded_u64(
                "repoGarbageCollectionGracePeriodMs",
                self.repo_garbage_collection_grace_period_ms,
            )?,
            repo_index_timeout_ms: bounded_u64("repoIndexTimeoutMs", self.repo_index_timeout_ms)?,
            connection_sync_timeout_ms: bounded_u64(
                "connectionSyncTimeoutMs",
                self.connection_sync_timeout_ms,
            )?,
            rate_limit_backoff_base_ms: bounded_u64(
                "rateLimitBackoffBaseMs",
                self.rate_limit_backoff_base_ms,
            )?,
            rate_limit_backoff_max_ms: bounded_u64(
                "rateLimitBackoffMaxMs",
                self.rate_limit_backoff_max_ms,
            )?,
            max_terminal_jobs_per_entity: bounded_u32(
                "maxTerminalJobsPerEntity",
                self.max_terminal_jobs_per_entity,
            )?,
        };

        if self.rate_limit_backoff_base_ms > self.rate_limit_backoff_max_ms {
            return Err(ConfigSchemaError::SettingConflict {
                field: "rateLimitBackoffBaseMs",
                reason: format!(
                    "must not exceed rateLimitBackoffMaxMs ({})",
                    self.rate_limit_backoff_max_ms
                ),
            });
        }
        Ok(validated)
    }
}

/// Settings after range validation.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedSettings {
    resync_connection_interval_ms: IntervalMs,
    resync_connection_polling_interval_ms: PollingMs,
    reindex_interval_ms: IntervalMs,
    reindex_repo_polling_interval_ms: PollingMs,
    max_connection_sync_job_concurrency: Concurrency,
    max_repo_indexing_job_concurrency: Concurrency,
    max_repo_garbage_collection_job_concurrency: Concurrency,
    repo_garbage_collection_grace_period_ms: GcGraceMs,
    repo_index_timeout_ms: JobTimeoutMs,
    connection_sync_timeout_ms: JobTimeoutMs,
    rate_limit_backoff_base_ms: BackoffBaseMs,
    rate_limit_backoff_max_ms: BackoffMaxMs,
    max_terminal_jobs_per_entity: RetainedJobs,
}

impl ValidatedSettings {
    /// Resync interval.
    #[must_use]
    pub const fn resync_connection_interval_ms(&self) -> u64 {
        self.resync_connection_interval_ms.get()
    }

    /// Connection polling interval.
    #[must_use]
    pub const fn resync_connection_polling_interval(&self) -> Duration {
        Duration::from_millis(self.resync_connection_polling_interval_ms.get())
    }

    /// Reindex interval.
    #[must_use]
    pub const fn reindex_interval_ms(&self) -> u64 {
        self.reindex_interval_ms.get()
    }

    /// Repo polling interval.
    #[must_use]
    pub const fn reindex_repo_polling_interval(&self) -> Duration {
        Duration::from_millis(self.reindex_repo_polling_interval_ms.get())
    }

    /// Connection sync ceiling.
    #[must_use]
    pub const fn max_connection_sync_job_concurrency(&self) -> usize {
        self.max_connection_sync_job_concurrency.get() as usize
    }

    /// Repo indexing ceiling.
    #[must_use]
    pub const fn max_repo_indexing_job_concurrency(&self) -> usize {
        self.max_repo_indexing_job_concurrency.get() as usize
    }

    /// Garbage collection ceiling.
    #[must_use]
    pub const fn max_repo_garbage_collection_job_concurrency(&self) -> usize {
        self.max_repo_garbage_collection_job_concurrency.get() as usize
    }

    /// Orphaned repo grace period.
    #[must_use]
    pub const fn repo_garbage_collection_grace_period_ms(&self) -> u64 {
        self.repo_garbage_collection_grace_period_ms.get()
    }

    /// Indexing job deadline.
    #[must_use]
    pub const fn repo_index_timeout(&self) -> Duration {
        Duration::from_millis(self.repo_index_timeout_ms.get())
    }

    /// Connection sync job deadline.
    #[must_use]
    pub const fn connection_sync_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_sync_timeout_ms.get())
    }

    /// Rate-limit backoff base.
    #[must_use]
    pub const fn rate_limit_backoff_base_ms(&self) -> u64 {
        self.rate_limit_backoff_base_ms.get()
    }

    /// Rate-limit backoff ceiling.
    #[must_use]
    pub const fn rate_limit_backoff_max_ms(&self) -> u64 {
        self.rate_limit_backoff_max_ms.get()
    }

    /// Finished jobs kept per entity.
    #[must_use]
    pub const fn max_terminal_jobs_per_entity(&self) -> usize {
        self.max_terminal_jobs_per_entity.get() as usize
    }

    /// Plain values, in the on-disk shape.
    #[must_use]
    pub const fn to_settings(&self) -> Settings {
        Settings {
            resync_connection_interval_ms: self.resync_connection_interval_ms.get(),
            resync_connection_polling_interval_ms: self
                .resync_connection_polling_interval_ms
                .get(),
            reindex_interval_ms: self.reindex_interval_ms.get(),
            reindex_repo_polling_interval_ms: self.reindex_repo_polling_interval_ms.get(),
            max_connection_sync_job_concurrency: self.max_connection_sync_job_concurrency.get(),
            max_repo_indexing_job_concurrency: self.max_repo_indexing_job_concurrency.get(),
            max_repo_garbage_collection_job_concurrency: self
                .max_repo_garbage_collection_job_concurrency
                .get(),
            repo_garbage_collection_grace_period_ms: self
                .repo_garbage_collection_grace_period_ms
                .get(),
            repo_index_timeout_ms: self.repo_index_timeout_ms.get(),
            connection_sync_timeout_ms: self.connection_sync_timeout_ms.get(),
            rate_limit_backoff_base_ms: self.rate_limit_backoff_base_ms.get(),
            rate_limit_backoff_max_ms: self.rate_limit_backoff_max_ms.get(),
            max_terminal_jobs_per_entity: self.max_terminal_jobs_per_entity.get(),
        }
    }
}

fn bounded_u64<const MIN: u64, const MAX: u64>(
    field: &'static str,
    value: u64,
) -> Result<BoundedU64<MIN, MAX>, ConfigSchemaError> {
    BoundedU64::try_new(value).map_err(|_| ConfigSchemaError::SettingOutOfRange {
        field,
        value,
        min: MIN,
        max: MAX,
    })
}

fn bounded_u32<const MIN: u32, const MAX: u32>(
    field: &'static str,
    value: u32,
) -> Result<BoundedU32<MIN, MAX>, ConfigSchemaError> {
    BoundedU32::try_new(value).map_err(|_| ConfigSchemaError::SettingOutOfRange {
        field,
        value: u64::from(value),
        min: u64::from(MIN),
        max: u64::from(MAX),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_range() -> Result<(), ConfigSchemaError> {
        let settings = Settings::default().validate()?;
        assert_eq!(settings.resync_connection_interval_ms(), 86_400_000);
        assert_eq!(settings.max_repo_indexing_job_concurrency(), 8);
        assert_eq!(settings.connection_sync_timeout(), Duration::from_secs(7_200));
        assert_eq!(settings.repo_garbage_collection_grace_period_ms(), 10_000);
        assert_eq!(settings.to_settings(), Settings::default());
        Ok(())
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let settings = Settings {
            max_connection_sync_job_concurrency: 0,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigSchemaError::SettingOutOfRange {
                field: "maxConnectionSyncJobConcurrency",
                value: 0,
                ..
            })
        ));
    }

    #[test]
    fn zero_grace_period_is_allowed() -> Result<(), ConfigSchemaError> {
        let settings = Settings {
            repo_garbage_collection_grace_period_ms: 0,
            ..Settings::default()
        };
        assert_eq!(settings.validate()?.repo_garbage_collection_grace_period_ms(), 0);
        Ok(())
    }

    #[test]
    fn job_retention_keeps_at_least_one_record() -> Result<(), ConfigSchemaError> {
        assert_eq!(Settings::default().validate()?.max_terminal_jobs_per_entity(), 100);
        let settings = Settings {
            max_terminal_jobs_per_entity: 0,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigSchemaError::SettingOutOfRange {
                field: "maxTerminalJobsPerEntity",
                min: 1,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn backoff_base_cannot_exceed_max() {
        let settings = Settings {
            rate_limit_backoff_base_ms: 500_000,
            rate_limit_backoff_max_ms: 2_000,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigSchemaError::SettingConflict { .. })
        ));
    }
}
