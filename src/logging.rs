// src/logging.rs

//! Logging setup for `protoprimer` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `-v` count on the command line (`-v` info, `-vv` debug, `-vvv` trace)
//! 2. `PROTOPRIMER_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `warn`
//!
//! Logs are sent to STDERR. Every line carries the interpreter stride the
//! process runs under and the stride the bootstrap has reached, taken from
//! process-wide [`LogFields`].

use std::fmt::{self, Write as _};
use std::path::Path;
use std::sync::RwLock;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::types::PyExec;

/// Environment variable consulted when no `-v` is given.
pub const LOG_LEVEL_VAR: &str = "PROTOPRIMER_LOG";

/// Fields injected into every log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFields {
    /// Stride of the interpreter this process runs under.
    pub py_exec: PyExec,
    /// Furthest stride the bootstrap has reached so far.
    pub state_stride: PyExec,
}

static LOG_FIELDS: RwLock<Option<LogFields>> = RwLock::new(None);

/// Install the process-wide log fields. Formatting fails until this ran.
pub fn install_log_fields(fields: LogFields) {
    if let Ok(mut slot) = LOG_FIELDS.write() {
        *slot = Some(fields);
    }
}

pub fn current_log_fields() -> Option<LogFields> {
    LOG_FIELDS.read().ok().and_then(|slot| *slot)
}

/// Record the interpreter stride read from the environment.
pub fn set_py_exec(py_exec: PyExec) {
    update_log_fields(|fields| fields.py_exec = py_exec);
}

/// Record a newly reached stride.
pub fn set_state_stride(stride: PyExec) {
    update_log_fields(|fields| fields.state_stride = stride);
}

fn update_log_fields(f: impl FnOnce(&mut LogFields)) {
    if let Ok(mut slot) = LOG_FIELDS.write() {
        if let Some(fields) = slot.as_mut() {
            f(fields);
        }
    }
}

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(verbose: u8) -> Result<()> {
    let env_level = std::env::var(LOG_LEVEL_VAR).ok();
    let level = resolve_level(verbose, env_level.as_deref());

    install_log_fields(LogFields {
        py_exec: PyExec::Unknown,
        state_stride: PyExec::Unknown,
    });

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .event_format(PrimerFormatter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))?;

    Ok(())
}

/// Pick the level from the `-v` count, falling back to the env var.
pub fn resolve_level(verbose: u8, env_level: Option<&str>) -> Level {
    match verbose {
        0 => env_level.and_then(parse_level_str).unwrap_or(Level::WARN),
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

/// What a single log line is made of.
#[derive(Debug, Clone)]
pub struct LogRecord<'a> {
    pub timestamp: DateTime<Utc>,
    pub pid: u32,
    pub level: Level,
    pub file: Option<&'a str>,
    pub line: Option<u32>,
    pub message: &'a str,
    pub extra: &'a [(String, String)],
}

/// Render one line (without the trailing newline).
///
/// Fails when `fields` is `None` so missing enrichment is never silent.
pub fn format_line(record: &LogRecord<'_>, fields: Option<&LogFields>) -> Result<String, fmt::Error> {
    let fields = fields.ok_or(fmt::Error)?;
    let basename = record
        .file
        .and_then(|file| Path::new(file).file_name())
        .and_then(|name| name.to_str())
        .unwrap_or("?");

    let mut out = String::new();
    write!(
        out,
        "{} pid:{} {} py:{} s:{} {}:{} {}",
        record.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        record.pid,
        record.level,
        fields.py_exec.name(),
        fields.state_stride.name(),
        basename,
        record.line.unwrap_or(0),
        record.message,
    )?;
    for (key, value) in record.extra {
        write!(out, " {key}={value}")?;
    }
    Ok(out)
}

/// Event formatter producing the single-line protoprimer format.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimerFormatter;

impl<S, N> FormatEvent<S, N> for PrimerFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);

        let record = LogRecord {
            timestamp: Utc::now(),
            pid: std::process::id(),
            level: *meta.level(),
            file: meta.file(),
            line: meta.line(),
            message: &visitor.message,
            extra: &visitor.extra,
        };
        let line = format_line(&record, current_log_fields().as_ref())?;
        writeln!(writer, "{line}")
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    extra: Vec<(String, String)>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.extra.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.extra.push((field.name().to_string(), format!("{value:?}")));
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record<'a>(extra: &'a [(String, String)]) -> LogRecord<'a> {
        LogRecord {
            timestamp: Utc
                .with_ymd_and_hms(2024, 3, 9, 7, 5, 1)
                .unwrap()
                .checked_add_signed(chrono::Duration::milliseconds(42))
                .unwrap(),
            pid: 4242,
            level: Level::INFO,
            file: Some("src/states/venv.rs"),
            line: Some(17),
            message: "venv ready",
            extra,
        }
    }

    #[test]
    fn line_format_is_exact() {
        let fields = LogFields {
            py_exec: PyExec::Arbitrary,
            state_stride: PyExec::Required,
        };
        let line = format_line(&record(&[]), Some(&fields)).unwrap();
        assert_eq!(
            line,
            "2024-03-09T07:05:01.042Z pid:4242 INFO py:arbitrary s:required venv.rs:17 venv ready"
        );
    }

    #[test]
    fn extra_fields_are_appended() {
        let fields = LogFields {
            py_exec: PyExec::Venv,
            state_stride: PyExec::Venv,
        };
        let extra = vec![("count".to_string(), "2".to_string())];
        let line = format_line(&record(&extra), Some(&fields)).unwrap();
        assert!(line.ends_with("venv.rs:17 venv ready count=2"), "{line}");
    }

    #[test]
    fn missing_fields_are_a_format_error() {
        assert!(format_line(&record(&[]), None).is_err());
    }

    #[test]
    fn level_resolution() {
        assert_eq!(resolve_level(0, None), Level::WARN);
        assert_eq!(resolve_level(0, Some("debug")), Level::DEBUG);
        assert_eq!(resolve_level(0, Some("nonsense")), Level::WARN);
        assert_eq!(resolve_level(1, Some("error")), Level::INFO);
        assert_eq!(resolve_level(2, None), Level::DEBUG);
        assert_eq!(resolve_level(9, None), Level::TRACE);
    }
}
