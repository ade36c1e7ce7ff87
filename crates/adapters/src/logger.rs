//! Logger adapters: JSON lines and a `tracing` bridge.

use crate::log_sink::LogSink;
use codesync_ports::{LogEvent, LogFields, LogLevel, LoggerPort};
use codesync_shared::redaction::{REDACTED, is_secret_key};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Logger writing one JSON object per event.
///
/// Field and error values under secret-looking keys are replaced with
/// `[REDACTED]` at any nesting depth.
#[derive(Clone)]
pub struct JsonLogger {
    sink: Arc<dyn LogSink>,
    base_fields: LogFields,
    min_level: LogLevel,
}

impl JsonLogger {
    /// Logger at `info` level with no base fields.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            base_fields: LogFields::new(),
            min_level: LogLevel::Info,
        }
    }

    /// Fields merged into every event.
    #[must_use]
    pub fn with_base_fields(mut self, fields: LogFields) -> Self {
        self.base_fields = fields;
        self
    }

    /// Drop events below `level`.
    #[must_use]
    pub const fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    fn render(&self, event: LogEvent) -> String {
        let mut fields = self.base_fields.clone();
        fields.extend(event.fields.unwrap_or_default());

        let mut payload = Map::new();
        payload.insert("timestampMs".into(), Value::from(now_epoch_ms()));
        payload.insert("level".into(), Value::from(event.level.as_str()));
        payload.insert("event".into(), Value::from(&*event.event));
        payload.insert("message".into(), Value::from(&*event.message));
        if !fields.is_empty() {
            let mut rendered: Map<String, Value> = fields
                .into_iter()
                .map(|(key, value)| (key.into_string(), value))
                .collect();
            redact_map(&mut rendered);
            payload.insert("fields".into(), Value::Object(rendered));
        }
        if let Some(mut error) = event.error {
            redact_value(&mut error);
            payload.insert("error".into(), error);
        }

        let mut line = serde_json::to_string(&Value::Object(payload)).unwrap_or_else(|_| {
            json!({
                "timestampMs": 0,
                "level": "error",
                "event": "logger.serialize_failed",
                "message": "log serialization failed",
            })
            .to_string()
        });
        line.push('\n');
        line
    }
}

impl LoggerPort for JsonLogger {
    fn log(&self, event: LogEvent) {
        if event.level < self.min_level {
            return;
        }
        let line = self.render(event);
        self.sink.write_line(&line);
    }

    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort> {
        let mut merged = self.base_fields.clone();
        merged.extend(fields);
        Box::new(Self {
            sink: Arc::clone(&self.sink),
            base_fields: merged,
            min_level: self.min_level,
        })
    }
}

/// Forwards events to the active `tracing` subscriber.
///
/// Fields are rendered as one redacted JSON value so subscribers without
/// structured-field support still show them.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    base_fields: LogFields,
}

impl TracingLogger {
    /// Bridge with no base fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoggerPort for TracingLogger {
    fn log(&self, event: LogEvent) {
        let mut fields = self.base_fields.clone();
        fields.extend(event.fields.unwrap_or_default());
        let mut rendered: Map<String, Value> = fields
            .into_iter()
            .map(|(key, value)| (key.into_string(), value))
            .collect();
        redact_map(&mut rendered);
        let fields = Value::Object(rendered);
        let error = event.error.map(|mut error| {
            redact_value(&mut error);
            error
        });
        let error = error.unwrap_or(Value::Null);
        let name = &*event.event;
        let message = &*event.message;

        match event.level {
            LogLevel::Debug => {
                tracing::debug!(event = name, fields = %fields, "{message}");
            },
            LogLevel::Info => {
                tracing::info!(event = name, fields = %fields, "{message}");
            },
            LogLevel::Warn => {
                tracing::warn!(event = name, fields = %fields, "{message}");
            },
            LogLevel::Error => {
                tracing::error!(event = name, fields = %fields, error = %error, "{message}");
            },
        }
    }

    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort> {
        let mut merged = self.base_fields.clone();
        merged.extend(fields);
        Box::new(Self {
            base_fields: merged,
        })
    }
}

fn redact_map(map: &mut Map<String, Value>) {
    for (key, value) in map.iter_mut() {
        if is_secret_key(key) {
            *value = Value::from(REDACTED);
        } else {
            redact_value(value);
        }
    }
}

fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => redact_map(map),
        Value::Array(items) => items.iter_mut().for_each(redact_value),
        _ => {},
    }
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|duration| u64::try_from(duration.as_millis()).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::MemoryLogSink;
    use codesync_shared::{ErrorCode, ErrorEnvelope};

    fn parse(line: &str) -> Result<Value, serde_json::Error> {
        serde_json::from_str(line.trim())
    }

    #[test]
    fn tokens_in_fields_and_errors_are_redacted() -> Result<(), Box<dyn std::error::Error>> {
        let sink = MemoryLogSink::default();
        let logger = JsonLogger::new(Arc::new(sink.clone()));

        let mut fields = LogFields::new();
        fields.insert("githubToken".into(), Value::from("ghp_live"));
        fields.insert("connection".into(), Value::from("acme"));
        fields.insert("nested".into(), json!({ "password": "hunter2", "count": 3 }));
        logger.info("sync.plan.start", "Sync plan started", Some(fields));

        let error = ErrorEnvelope::expected(ErrorCode::internal(), "boom")
            .with_metadata("connection", "acme");
        logger.error("jobs.sync.failed", &error, None);

        let lines = sink.take();
        assert_eq!(lines.len(), 2);
        let first = parse(&lines[0])?;
        assert_eq!(first["fields"]["githubToken"], Value::from(REDACTED));
        assert_eq!(first["fields"]["connection"], Value::from("acme"));
        assert_eq!(first["fields"]["nested"]["password"], Value::from(REDACTED));
        assert_eq!(first["fields"]["nested"]["count"], Value::from(3));

        let second = parse(&lines[1])?;
        assert_eq!(second["level"], Value::from("error"));
        assert_eq!(second["message"], Value::from("boom"));
        assert!(second.get("error").is_some());
        Ok(())
    }

    #[test]
    fn events_below_min_level_are_dropped() {
        let sink = MemoryLogSink::default();
        let logger = JsonLogger::new(Arc::new(sink.clone())).with_min_level(LogLevel::Warn);
        logger.debug("a", "debug", None);
        logger.info("b", "info", None);
        logger.warn("c", "warn", None);
        assert_eq!(sink.lines().len(), 1);
    }

    #[test]
    fn child_loggers_carry_base_fields() -> Result<(), Box<dyn std::error::Error>> {
        let sink = MemoryLogSink::default();
        let logger = JsonLogger::new(Arc::new(sink.clone()));
        let mut base = LogFields::new();
        base.insert("jobId".into(), Value::from("job-1"));
        logger.child(base).info("jobs.sync.start", "Job started", None);

        let lines = sink.take();
        assert_eq!(parse(&lines[0])?["fields"]["jobId"], Value::from("job-1"));
        Ok(())
    }

    #[test]
    fn tracing_bridge_accepts_every_level() {
        let logger = TracingLogger::new().child(LogFields::new());
        logger.debug("a", "debug", None);
        logger.info("b", "info", None);
        logger.warn("c", "warn", None);
        logger.error(
            "d",
            &ErrorEnvelope::expected(ErrorCode::internal(), "error"),
            None,
        );
    }
}
