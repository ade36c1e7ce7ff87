//! Job records and the status state machine.
//!
//! `PENDING -> IN_PROGRESS -> {COMPLETED | FAILED}`. Terminal states are
//! final. A pending job may also fail directly (e.g. it was abandoned before a
//! worker picked it up).

use crate::failure::FailureKind;
use crate::primitives::{EntityRef, JobId};
use codesync_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error message recorded on jobs that exceeded their deadline.
pub const TIMEOUT_ERROR_MESSAGE: &str = "timeout";

/// Job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Waiting for a worker slot.
    Pending,
    /// Claimed by a worker.
    InProgress,
    /// Finished, possibly with warnings.
    Completed,
    /// Finished with an error.
    Failed,
}

impl JobStatus {
    /// Returns true for `COMPLETED` and `FAILED`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true for `PENDING` and `IN_PROGRESS`.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress | Self::Failed)
                | (Self::InProgress, Self::Completed | Self::Failed)
        )
    }

    /// Wire literal, e.g. `IN_PROGRESS`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ErrorEnvelope;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PENDING" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                format!("unknown job status `{value}`"),
            )),
        }
    }
}

/// What a job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobKind {
    /// Refresh a connection's repository list.
    ConnectionSync,
    /// Build or refresh one repository's index.
    RepoIndex,
    /// Remove artifacts of a repository no connection owns.
    RepoGarbageCollection,
}

impl JobKind {
    /// Every kind, in scheduling order.
    pub const ALL: [Self; 3] = [
        Self::ConnectionSync,
        Self::RepoIndex,
        Self::RepoGarbageCollection,
    ];

    /// Wire literal.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionSync => "connectionSync",
            Self::RepoIndex => "repoIndex",
            Self::RepoGarbageCollection => "repoGarbageCollection",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = ErrorEnvelope;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "connectionSync" | "connection-sync" | "sync" => Ok(Self::ConnectionSync),
            "repoIndex" | "repo-index" | "index" => Ok(Self::RepoIndex),
            "repoGarbageCollection" | "repo-gc" | "gc" => Ok(Self::RepoGarbageCollection),
            _ => Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                format!("unknown job kind `{value}`"),
            )),
        }
    }
}

/// A tracked job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Job id.
    pub id: JobId,
    /// Job kind.
    pub kind: JobKind,
    /// Entity the job works on.
    pub entity: EntityRef,
    /// Current status.
    pub status: JobStatus,
    /// Creation time (epoch ms).
    pub created_at_ms: u64,
    /// Store-assigned creation counter; orders jobs created in the same millisecond.
    #[serde(default)]
    pub seq: u64,
    /// Digest of the connection config a sync job was scheduled for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_fingerprint: Option<Box<str>>,
    /// Time the job entered `IN_PROGRESS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    /// Time the job reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    /// Failure description; exactly `"timeout"` for deadline failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<Box<str>>,
    /// Failure kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    /// Non-fatal findings.
    #[serde(default)]
    pub warning_messages: Vec<Box<str>>,
}

impl JobRecord {
    /// A new pending job.
    #[must_use]
    pub const fn pending(id: JobId, kind: JobKind, entity: EntityRef, now_ms: u64) -> Self {
        Self {
            id,
            kind,
            entity,
            status: JobStatus::Pending,
            created_at_ms: now_ms,
            seq: 0,
            config_fingerprint: None,
            started_at_ms: None,
            completed_at_ms: None,
            error_message: None,
            error_kind: None,
            warning_messages: Vec::new(),
        }
    }

    /// Apply `transition` when the current status equals `transition.from`.
    pub fn apply(&mut self, transition: &JobTransition) -> Result<(), TransitionRejected> {
        if self.status != transition.from {
            return Err(TransitionRejected::StatusMismatch {
                expected: transition.from,
                actual: self.status,
            });
        }
        if !transition.from.can_transition_to(transition.to) {
            return Err(TransitionRejected::Illegal {
                from: transition.from,
                to: transition.to,
            });
        }
        self.status = transition.to;
        match transition.to {
            JobStatus::InProgress => self.started_at_ms = Some(transition.at_ms),
            JobStatus::Completed | JobStatus::Failed => {
                self.completed_at_ms = Some(transition.at_ms);
            },
            JobStatus::Pending => {},
        }
        if let Some(kind) = transition.error_kind {
            self.error_kind = Some(kind);
        }
        if let Some(message) = &transition.error_message {
            self.error_message = Some(message.clone());
        }
        self.warning_messages
            .extend(transition.warning_messages.iter().cloned());
        Ok(())
    }

    /// Milliseconds spent in `IN_PROGRESS` at `now_ms`.
    #[must_use]
    pub fn running_for_ms(&self, now_ms: u64) -> Option<u64> {
        match (self.status, self.started_at_ms) {
            (JobStatus::InProgress, Some(started)) => Some(now_ms.saturating_sub(started)),
            _ => None,
        }
    }
}

/// A compare-and-swap status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTransition {
    /// Expected current status.
    pub from: JobStatus,
    /// Target status.
    pub to: JobStatus,
    /// Transition time (epoch ms).
    pub at_ms: u64,
    /// Failure kind for `FAILED`.
    pub error_kind: Option<FailureKind>,
    /// Failure message for `FAILED`.
    pub error_message: Option<Box<str>>,
    /// Warnings to append.
    pub warning_messages: Vec<Box<str>>,
}

impl JobTransition {
    const fn bare(from: JobStatus, to: JobStatus, at_ms: u64) -> Self {
        Self {
            from,
            to,
            at_ms,
            error_kind: None,
            error_message: None,
            warning_messages: Vec::new(),
        }
    }

    /// `PENDING -> IN_PROGRESS`.
    #[must_use]
    pub const fn start(at_ms: u64) -> Self {
        Self::bare(JobStatus::Pending, JobStatus::InProgress, at_ms)
    }

    /// `IN_PROGRESS -> COMPLETED`, recording warnings.
    #[must_use]
    pub fn complete(at_ms: u64, warnings: Vec<Box<str>>) -> Self {
        Self {
            warning_messages: warnings,
            ..Self::bare(JobStatus::InProgress, JobStatus::Completed, at_ms)
        }
    }

    /// `from -> FAILED` with the error's kind recorded as `"<Kind>: <message>"`.
    #[must_use]
    pub fn fail(from: JobStatus, at_ms: u64, error: &ErrorEnvelope) -> Self {
        let kind = FailureKind::from_code(&error.code);
        if kind == FailureKind::Timeout {
            return Self::timeout(from, at_ms);
        }
        Self {
            error_kind: Some(kind),
            error_message: Some(format!("{kind}: {}", error.message).into_boxed_str()),
            ..Self::bare(from, JobStatus::Failed, at_ms)
        }
    }

    /// `from -> FAILED` with `errorMessage = "timeout"`.
    #[must_use]
    pub fn timeout(from: JobStatus, at_ms: u64) -> Self {
        Self {
            error_kind: Some(FailureKind::Timeout),
            error_message: Some(TIMEOUT_ERROR_MESSAGE.into()),
            ..Self::bare(from, JobStatus::Failed, at_ms)
        }
    }

    /// `IN_PROGRESS -> FAILED` when every unit of work failed, keeping the warnings.
    #[must_use]
    pub fn fail_all(at_ms: u64, message: impl Into<Box<str>>, warnings: Vec<Box<str>>) -> Self {
        Self {
            error_kind: Some(FailureKind::Internal),
            error_message: Some(message.into()),
            warning_messages: warnings,
            ..Self::bare(JobStatus::InProgress, JobStatus::Failed, at_ms)
        }
    }
}

/// Why a transition did not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRejected {
    /// The job was not in the expected status.
    StatusMismatch {
        /// Status the caller expected.
        expected: JobStatus,
        /// Status actually stored.
        actual: JobStatus,
    },
    /// The transition is not part of the state machine.
    Illegal {
        /// Source status.
        from: JobStatus,
        /// Target status.
        to: JobStatus,
    },
}

impl fmt::Display for TransitionRejected {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatusMismatch { expected, actual } => {
                write!(formatter, "expected status {expected}, found {actual}")
            },
            Self::Illegal { from, to } => write!(formatter, "illegal transition {from} -> {to}"),
        }
    }
}

impl std::error::Error for TransitionRejected {}

impl From<TransitionRejected> for ErrorEnvelope {
    fn from(error: TransitionRejected) -> Self {
        let envelope = Self::expected(ErrorCode::new("jobs", "illegal_transition"), error.to_string());
        match error {
            TransitionRejected::StatusMismatch { expected, actual } => envelope
                .with_metadata("expected", expected.as_str())
                .with_metadata("actual", actual.as_str()),
            TransitionRejected::Illegal { from, to } => envelope
                .with_metadata("from", from.as_str())
                .with_metadata("to", to.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::ConnectionName;
    use proptest::prelude::*;

    fn job() -> Result<JobRecord, Box<dyn std::error::Error>> {
        Ok(JobRecord::pending(
            JobId::parse("job-1")?,
            JobKind::ConnectionSync,
            EntityRef::Connection(ConnectionName::parse("main")?),
            1_000,
        ))
    }

    fn status_strategy() -> impl Strategy<Value = JobStatus> {
        prop_oneof![
            Just(JobStatus::Pending),
            Just(JobStatus::InProgress),
            Just(JobStatus::Completed),
            Just(JobStatus::Failed),
        ]
    }

    #[test]
    fn happy_path_records_timestamps() -> Result<(), Box<dyn std::error::Error>> {
        let mut record = job()?;
        record.apply(&JobTransition::start(2_000))?;
        assert_eq!(record.running_for_ms(2_500), Some(500));
        record.apply(&JobTransition::complete(3_000, vec!["w".into()]))?;
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.started_at_ms, Some(2_000));
        assert_eq!(record.completed_at_ms, Some(3_000));
        assert_eq!(record.warning_messages.len(), 1);
        assert_eq!(record.running_for_ms(4_000), None);
        Ok(())
    }

    #[test]
    fn terminal_jobs_never_move() -> Result<(), Box<dyn std::error::Error>> {
        let mut record = job()?;
        record.apply(&JobTransition::start(2_000))?;
        record.apply(&JobTransition::timeout(JobStatus::InProgress, 3_000))?;
        assert_eq!(record.error_message.as_deref(), Some(TIMEOUT_ERROR_MESSAGE));

        let again = record.apply(&JobTransition::complete(4_000, Vec::new()));
        assert_eq!(
            again,
            Err(TransitionRejected::StatusMismatch {
                expected: JobStatus::InProgress,
                actual: JobStatus::Failed,
            })
        );
        assert_eq!(record.status, JobStatus::Failed);
        Ok(())
    }

    #[test]
    fn fail_records_error_kind() -> Result<(), Box<dyn std::error::Error>> {
        let mut record = job()?;
        record.apply(&JobTransition::start(2_000))?;
        let error = FailureKind::CodeHostRateLimited.envelope("secondary rate limit");
        record.apply(&JobTransition::fail(JobStatus::InProgress, 3_000, &error))?;
        assert_eq!(record.error_kind, Some(FailureKind::CodeHostRateLimited));
        assert_eq!(
            record.error_message.as_deref(),
            Some("CodeHostRateLimited: secondary rate limit")
        );
        Ok(())
    }

    #[test]
    fn status_serializes_screaming() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&JobStatus::InProgress)?, "\"IN_PROGRESS\"");
        assert_eq!("in-progress".parse::<JobStatus>().ok(), Some(JobStatus::InProgress));
        Ok(())
    }

    proptest! {
        #[test]
        fn terminal_states_have_no_successors(from in status_strategy(), to in status_strategy()) {
            if from.is_terminal() {
                prop_assert!(!from.can_transition_to(to));
            }
            if from.can_transition_to(to) {
                prop_assert!(from != to);
            }
        }
    }
}
