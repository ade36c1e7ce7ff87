//! Line sinks shared by the JSON logger and telemetry adapters.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// Receives pre-formatted, newline-terminated lines.
pub trait LogSink: Send + Sync {
    /// Write one line.
    fn write_line(&self, line: &str);
}

/// Writes to stderr so stdout stays free for command output.
#[derive(Debug, Default)]
pub struct StderrLogSink;

impl LogSink for StderrLogSink {
    fn write_line(&self, line: &str) {
        let mut stderr = std::io::stderr().lock();
        if let Err(error) = stderr.write_all(line.as_bytes()) {
            eprintln!("log sink write failed: {error}");
        }
    }
}

/// Keeps lines in memory; cloning shares the buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryLogSink {
    /// Lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the buffer.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl LogSink for MemoryLogSink {
    fn write_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_shares_lines_between_clones() {
        let sink = MemoryLogSink::default();
        let writer = sink.clone();
        writer.write_line("first\n");
        writer.write_line("second\n");

        assert_eq!(sink.lines(), vec!["first\n", "second\n"]);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.lines().is_empty());
    }
}
