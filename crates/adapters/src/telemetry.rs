//! JSON-lines telemetry: counters and millisecond timers.

use crate::log_sink::LogSink;
use codesync_ports::{TelemetryPort, TelemetryTags};
use codesync_shared::redaction::{REDACTED, is_secret_key};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Telemetry adapter that writes each sample as one JSON line.
#[derive(Clone)]
pub struct JsonTelemetry {
    sink: Arc<dyn LogSink>,
    base_tags: TelemetryTags,
}

impl JsonTelemetry {
    /// Telemetry backed by `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            base_tags: TelemetryTags::new(),
        }
    }

    /// Tags added to every sample.
    #[must_use]
    pub fn with_base_tags(mut self, tags: TelemetryTags) -> Self {
        self.base_tags = tags;
        self
    }

    fn emit(&self, metric_type: &str, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        let tags = merge_tags(&self.base_tags, tags);
        let mut payload = Map::new();
        payload.insert("type".into(), Value::from("metric"));
        payload.insert("timestampMs".into(), Value::from(now_epoch_ms()));
        payload.insert("metricType".into(), Value::from(metric_type));
        payload.insert("name".into(), Value::from(name));
        payload.insert("value".into(), Value::from(value));
        if metric_type == "timer" {
            payload.insert("unit".into(), Value::from("ms"));
        }
        if !tags.is_empty() {
            let tags: Map<String, Value> = tags
                .into_iter()
                .map(|(key, value)| (key.into_string(), Value::from(value.into_string())))
                .collect();
            payload.insert("tags".into(), Value::Object(tags));
        }
        if let Ok(mut line) = serde_json::to_string(&Value::Object(payload)) {
            line.push('\n');
            self.sink.write_line(&line);
        }
    }
}

impl TelemetryPort for JsonTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        self.emit("counter", name, value, tags);
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        self.emit("timer", name, duration_ms, tags);
    }
}

/// Adds fixed tags (for example the job kind) to an inner sink.
#[derive(Clone)]
pub struct TaggedTelemetry {
    inner: Arc<dyn TelemetryPort>,
    tags: TelemetryTags,
}

impl TaggedTelemetry {
    /// Wrap `inner` with `tags`.
    #[must_use]
    pub fn new(inner: Arc<dyn TelemetryPort>, tags: TelemetryTags) -> Self {
        Self { inner, tags }
    }
}

impl TelemetryPort for TaggedTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        let merged = merge_tags(&self.tags, tags);
        self.inner.increment_counter(name, value, Some(&merged));
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        let merged = merge_tags(&self.tags, tags);
        self.inner.record_timer_ms(name, duration_ms, Some(&merged));
    }
}

fn merge_tags(base: &TelemetryTags, extra: Option<&TelemetryTags>) -> TelemetryTags {
    let mut merged = base.clone();
    if let Some(extra) = extra {
        merged.extend(extra.iter().map(|(key, value)| (key.clone(), value.clone())));
    }
    for (key, value) in &mut merged {
        if is_secret_key(key) {
            *value = REDACTED.into();
        }
    }
    merged
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|duration| u64::try_from(duration.as_millis()).ok())
        .unwrap_or_default()
}
