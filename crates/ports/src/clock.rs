//! Wall clock contract.

/// Source of the current time in epoch milliseconds.
pub trait ClockPort: Send + Sync {
    /// Current time.
    fn now_ms(&self) -> u64;
}
