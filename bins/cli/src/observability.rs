//! Tracing subscriber and observability ports for CLI runs.

use crate::format::OutputMode;
use codesync_adapters::{JsonTelemetry, StderrLogSink, TracingLogger};
use codesync_infra::Observability;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the tracing filter directive.
pub const LOG_ENV: &str = "CODESYNC_LOG";
const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber. Events go to stderr so stdout stays
/// parseable; structured output modes get JSON events.
pub fn init_tracing(mode: OutputMode, directive: Option<&str>) {
    let filter = directive
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let _ = if mode.is_structured() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Logger bridged into tracing, plus JSON telemetry when requested.
pub fn observability(metrics: bool) -> Observability {
    Observability {
        logger: Some(Arc::new(TracingLogger::new())),
        telemetry: if metrics {
            Some(Arc::new(JsonTelemetry::new(Arc::new(StderrLogSink))))
        } else {
            None
        },
    }
}
