//! `codesync` command-line entrypoint.

mod commands;
mod error;
mod format;
mod observability;

use clap::{Parser, Subcommand, ValueEnum};
use codesync_infra::{ConfigRenderFormat, DEFAULT_MAX_ROUNDS};
use codesync_shared::ErrorEnvelope;
use commands::{
    JobsStatusArgs, SyncArgs, run_config_show, run_config_validate, run_connection_check,
    run_jobs_status, run_plan, run_sync,
};
use error::{CliError, ExitCode};
use format::{OutputArgs, OutputMode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Prefix of every environment variable the CLI reads.
const ENV_PREFIX: &str = "CODESYNC_";
/// Default directory for local job and catalog state.
const DEFAULT_STATE_DIR: &str = ".codesync";

#[derive(Debug, Parser)]
#[command(
    name = "codesync",
    version,
    about = "Keep code-host repositories synced and indexed",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,

    /// Config file (JSON or TOML). Defaults to `CODESYNC_CONFIG`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Config file commands.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Single connection commands.
    Connection {
        #[command(subcommand)]
        command: ConnectionCommands,
    },
    /// Print the sync plan for one connection without changing any state.
    Plan {
        /// Connection name from the config.
        #[arg(long)]
        connection: String,
        /// Candidate listings fixture (JSON map of connection to repositories).
        #[arg(long)]
        candidates: PathBuf,
    },
    /// Run the scheduler against a candidates fixture.
    Sync {
        /// Candidate listings fixture (JSON map of connection to repositories).
        #[arg(long)]
        candidates: PathBuf,
        /// State directory for jobs, catalog, and manifests.
        #[arg(long, default_value = DEFAULT_STATE_DIR)]
        state: PathBuf,
        /// Stop when no work is left instead of polling until Ctrl-C.
        #[arg(long)]
        once: bool,
        /// Round limit for `--once`.
        #[arg(long, default_value_t = DEFAULT_MAX_ROUNDS)]
        max_rounds: usize,
        /// Emit counters and timers as JSON lines on stderr.
        #[arg(long)]
        metrics: bool,
    },
    /// Job commands.
    Jobs {
        #[command(subcommand)]
        command: JobsCommands,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Validate the config and summarize each connection.
    Validate,
    /// Print the effective config with defaults applied.
    Show {
        /// Rendering of the effective config.
        #[arg(long, value_enum, default_value_t = ConfigFormat::Json)]
        format: ConfigFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ConfigFormat {
    Json,
    Toml,
}

impl From<ConfigFormat> for ConfigRenderFormat {
    fn from(format: ConfigFormat) -> Self {
        match format {
            ConfigFormat::Json => Self::Json,
            ConfigFormat::Toml => Self::Toml,
        }
    }
}

#[derive(Debug, Subcommand)]
enum ConnectionCommands {
    /// Parse one connection config file (JSON) and print its defaulted form.
    Check {
        /// Connection config file.
        path: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum JobsCommands {
    /// Show jobs from a state directory.
    Status {
        /// Show exactly this job.
        #[arg(long)]
        job_id: Option<String>,
        /// Connection name, repository identity, or `connection:`/`repo:` form.
        #[arg(long)]
        entity: Option<String>,
        /// Job kind (`sync`, `index`, `gc`, or the full kind name).
        #[arg(long)]
        kind: Option<String>,
        /// Job status (`pending`, `in_progress`, `completed`, `failed`).
        #[arg(long)]
        status: Option<String>,
        /// Maximum number of jobs listed.
        #[arg(long)]
        limit: Option<usize>,
        /// State directory for jobs, catalog, and manifests.
        #[arg(long, default_value = DEFAULT_STATE_DIR)]
        state: PathBuf,
    },
}

pub(crate) struct CliOutput {
    stdout: String,
    stderr: String,
    exit_code: ExitCode,
}

/// Per-invocation context shared by command handlers.
pub(crate) struct Invocation<'a> {
    pub mode: OutputMode,
    pub env: &'a BTreeMap<String, String>,
    pub config_path: Option<&'a Path>,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let mode = OutputMode::from_args(&cli.output);
    let env = collect_scoped_env(ENV_PREFIX);
    observability::init_tracing(mode, env.get(observability::LOG_ENV).map(String::as_str));

    let invocation = Invocation {
        mode,
        env: &env,
        config_path: cli.config.as_deref(),
    };
    match run(&cli.command, &invocation) {
        Ok(output) => match write_output(&output) {
            Ok(()) => std::process::ExitCode::from(output.exit_code.as_u8()),
            Err(error) => exit_with_error(&error),
        },
        Err(error) => exit_with_error(&error),
    }
}

fn exit_with_error(error: &CliError) -> std::process::ExitCode {
    let _ = writeln!(io::stderr(), "error: {error}");
    std::process::ExitCode::from(error.exit_code().as_u8())
}

fn run(command: &Commands, invocation: &Invocation<'_>) -> Result<CliOutput, CliError> {
    match command {
        Commands::Config { command } => match command {
            ConfigCommands::Validate => run_config_validate(invocation),
            ConfigCommands::Show { format } => run_config_show(invocation, (*format).into()),
        },
        Commands::Connection { command } => match command {
            ConnectionCommands::Check { path } => run_connection_check(invocation, path),
        },
        Commands::Plan {
            connection,
            candidates,
        } => run_plan(invocation, connection, candidates),
        Commands::Sync {
            candidates,
            state,
            once,
            max_rounds,
            metrics,
        } => run_sync(
            invocation,
            &SyncArgs {
                candidates,
                state,
                once: *once,
                max_rounds: *max_rounds,
                metrics: *metrics,
            },
        ),
        Commands::Jobs { command } => match command {
            JobsCommands::Status {
                job_id,
                entity,
                kind,
                status,
                limit,
                state,
            } => run_jobs_status(
                invocation,
                &JobsStatusArgs {
                    job_id: job_id.as_deref(),
                    entity: entity.as_deref(),
                    kind: kind.as_deref(),
                    status: status.as_deref(),
                    limit: *limit,
                    state,
                },
            ),
        },
    }
}

/// Error payload shared by JSON and NDJSON output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorView<'a> {
    code: String,
    message: &'a str,
    kind: String,
    class: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    meta: BTreeMap<String, String>,
}

impl<'a> ErrorView<'a> {
    fn new(error: &'a ErrorEnvelope) -> Self {
        Self {
            code: format!("{}:{}", error.code.namespace(), error.code.code()),
            message: &error.message,
            kind: error.kind.to_string(),
            class: error.class.to_string(),
            meta: error.metadata.clone(),
        }
    }
}

pub(crate) fn format_error_output(mode: OutputMode, error: &ErrorEnvelope) -> CliOutput {
    let view = ErrorView::new(error);

    let mut stderr = String::new();
    log_info(&mut stderr, "command failed", mode.no_progress);

    let stdout = if mode.is_ndjson() {
        let payload = serde_json::json!({
            "type": "error",
            "status": "error",
            "error": view,
        });
        let mut out = serde_json::to_string(&payload).unwrap_or_else(|_| {
            "{\"type\":\"error\",\"status\":\"error\",\"error\":{\"code\":\"core:internal\",\"message\":\"internal error\"}}".to_string()
        });
        out.push('\n');
        out
    } else if mode.is_json() {
        let payload = serde_json::json!({
            "status": "error",
            "error": view,
        });
        // This is a CLI boundary, so JSON serialization errors are internal.
        let mut out = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| {
            "{\"status\":\"error\",\"error\":{\"code\":\"core:internal\",\"message\":\"internal error\"}}".to_string()
        });
        out.push('\n');
        out
    } else {
        format_error_text(&view)
    };

    CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::for_error(error),
    }
}

fn format_error_text(view: &ErrorView<'_>) -> String {
    let mut out = String::new();
    out.push_str("status: error\n");
    out.push_str("code: ");
    out.push_str(&view.code);
    out.push('\n');
    out.push_str("message: ");
    out.push_str(view.message);
    out.push('\n');
    out.push_str("kind: ");
    out.push_str(&view.kind);
    out.push('\n');

    if !view.meta.is_empty() {
        out.push_str("meta:\n");
        for (key, value) in &view.meta {
            out.push_str("  ");
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
    }

    out
}

/// Render a successful structured payload, or `text` in text mode.
///
/// JSON output is `{"status": .., ..payload}`; NDJSON output is one
/// summary line carrying the same fields.
pub(crate) fn format_success(
    mode: OutputMode,
    kind: &str,
    status: &str,
    payload: serde_json::Value,
    text: impl FnOnce() -> String,
) -> Result<String, CliError> {
    if mode.is_ndjson() {
        return Ok(format_ndjson_summary(status, kind, Some(payload)));
    }
    if mode.is_json() {
        let mut object = serde_json::Map::new();
        object.insert("status".to_string(), serde_json::Value::String(status.to_string()));
        if let serde_json::Value::Object(map) = payload {
            object.extend(map);
        }
        let mut out = serde_json::to_string_pretty(&serde_json::Value::Object(object))?;
        out.push('\n');
        return Ok(out);
    }
    Ok(text())
}

pub(crate) fn log_info(stderr: &mut String, message: &str, no_progress: bool) {
    if no_progress {
        return;
    }
    stderr.push_str("info: ");
    stderr.push_str(message);
    stderr.push('\n');
}

fn format_ndjson_summary(status: &str, kind: &str, extra: Option<serde_json::Value>) -> String {
    let mut payload = serde_json::Map::new();
    payload.insert(
        "type".to_string(),
        serde_json::Value::String("summary".to_string()),
    );
    payload.insert(
        "status".to_string(),
        serde_json::Value::String(status.to_string()),
    );
    payload.insert(
        "kind".to_string(),
        serde_json::Value::String(kind.to_string()),
    );
    if let Some(serde_json::Value::Object(map)) = extra {
        for (key, value) in map {
            payload.insert(key, value);
        }
    }
    let mut out = serde_json::to_string(&serde_json::Value::Object(payload)).unwrap_or_else(|_| {
        "{\"type\":\"summary\",\"status\":\"error\",\"kind\":\"internal\"}".to_string()
    });
    out.push('\n');
    out
}

fn write_output(output: &CliOutput) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;

    if !output.stderr.is_empty() {
        let mut stderr = io::stderr();
        stderr.write_all(output.stderr.as_bytes())?;
        stderr.flush()?;
    }

    Ok(())
}

fn collect_scoped_env(prefix: &str) -> BTreeMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(prefix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OutputFormat;
    use clap::CommandFactory;
    use codesync_shared::ErrorCode;

    fn mode(format: OutputFormat) -> OutputMode {
        OutputMode {
            format,
            no_progress: true,
        }
    }

    fn sample_error() -> ErrorEnvelope {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "unexpected_field"),
            "unknown field `lables`",
        )
        .with_metadata("field", "lables")
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommands() -> Result<(), clap::Error> {
        let matches = Cli::command().try_get_matches_from([
            "codesync",
            "config",
            "validate",
            "--output",
            "json",
            "--config",
            "codesync.toml",
        ])?;
        assert_eq!(
            matches.get_one::<OutputFormat>("output").copied(),
            Some(OutputFormat::Json)
        );
        assert_eq!(
            matches.get_one::<PathBuf>("config"),
            Some(&PathBuf::from("codesync.toml"))
        );
        Ok(())
    }

    #[test]
    fn sync_requires_candidates() {
        let result = Cli::command().try_get_matches_from(["codesync", "sync", "--once"]);
        assert!(result.is_err());
    }

    #[test]
    fn jobs_status_defaults_state_dir() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from(["codesync", "jobs", "status", "--kind", "sync"])?;
        let Commands::Jobs {
            command: JobsCommands::Status { state, kind, .. },
        } = cli.command
        else {
            return Err(clap::Error::new(clap::error::ErrorKind::InvalidSubcommand));
        };
        assert_eq!(state, PathBuf::from(DEFAULT_STATE_DIR));
        assert_eq!(kind.as_deref(), Some("sync"));
        Ok(())
    }

    #[test]
    fn text_errors_list_code_and_metadata() {
        let output = format_error_output(mode(OutputFormat::Text), &sample_error());
        assert!(output.stdout.starts_with("status: error\n"));
        assert!(output.stdout.contains("code: config:unexpected_field\n"));
        assert!(output.stdout.contains("  field: lables\n"));
        assert_eq!(output.exit_code, ExitCode::InvalidInput);
        assert!(output.stderr.is_empty());
    }

    #[test]
    fn json_errors_are_parseable() -> Result<(), serde_json::Error> {
        let output = format_error_output(mode(OutputFormat::Json), &sample_error());
        let value: serde_json::Value = serde_json::from_str(&output.stdout)?;
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], "config:unexpected_field");
        assert_eq!(value["error"]["kind"], "expected");
        Ok(())
    }

    #[test]
    fn ndjson_summaries_are_single_lines() -> Result<(), serde_json::Error> {
        let line = format_ndjson_summary(
            "ok",
            "config",
            Some(serde_json::json!({ "valid": 2 })),
        );
        assert_eq!(line.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(&line)?;
        assert_eq!(value["type"], "summary");
        assert_eq!(value["valid"], 2);
        Ok(())
    }

    #[test]
    fn json_success_merges_payload_fields() -> Result<(), CliError> {
        let out = format_success(
            mode(OutputFormat::Json),
            "plan",
            "ok",
            serde_json::json!({ "repos": 3 }),
            String::new,
        )?;
        let value: serde_json::Value = serde_json::from_str(&out)?;
        assert_eq!(value["status"], "ok");
        assert_eq!(value["repos"], 3);
        Ok(())
    }

    #[test]
    fn log_info_respects_no_progress() {
        let mut stderr = String::new();
        log_info(&mut stderr, "message", true);
        assert!(stderr.is_empty());
        log_info(&mut stderr, "message", false);
        assert_eq!(stderr, "info: message\n");
    }
}
