//! Helpers for structured log fields.

use codesync_ports::LogFields;
use serde_json::Value;
use std::time::Instant;

pub fn fields<const N: usize>(pairs: [(&str, Value); N]) -> LogFields {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_owned().into_boxed_str(), value))
        .collect()
}

pub fn duration_ms(started_at: Instant) -> u64 {
    u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
}
