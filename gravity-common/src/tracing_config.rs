//! Process-wide structured logging setup.
//!
//! JSON mode writes one object per line with `timestamp`, `level`, `logger`,
//! `service` and `message` plus any extra event fields. Text mode writes
//! `<time> - <logger> - <LEVEL> - <message>`.

use crate::error::{GravityError, Result};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::env;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Field that overrides the event target as the `logger` name.
pub const LOGGER_FIELD: &str = "logger";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Service name stamped on every JSON record
    pub service_name: String,
    /// Log level (DEBUG, INFO, WARNING, ERROR, CRITICAL)
    pub log_level: String,
    /// Emit JSON lines instead of text
    pub json_logs: bool,
}

impl LoggingConfig {
    /// Config for `service_name` at INFO with JSON output.
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: "INFO".to_string(),
            json_logs: true,
        }
    }

    /// Load from `SERVICE_NAME`, `LOG_LEVEL` and `JSON_LOGS`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `SERVICE_NAME` is missing or `JSON_LOGS`
    /// is not a boolean.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let service_name = env::var("SERVICE_NAME")
            .map_err(|_| GravityError::validation("SERVICE_NAME is not set"))?;
        let mut config = Self::new(service_name);
        if let Ok(level) = env::var("LOG_LEVEL") {
            config.log_level = level;
        }
        if let Ok(json) = env::var("JSON_LOGS") {
            config.json_logs = json
                .parse()
                .map_err(|_| GravityError::validation(format!("Invalid JSON_LOGS: {json}")))?;
        }
        Ok(config)
    }

    /// Create config with custom log level.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Toggle JSON output.
    #[must_use]
    pub const fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// Parse a level name.
///
/// Accepts `WARNING` for `WARN` and maps `CRITICAL` to `ERROR`.
///
/// # Errors
///
/// Returns a validation error for unknown names.
pub fn parse_level(name: &str) -> Result<Level> {
    match name.trim().to_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" | "CRITICAL" => Ok(Level::ERROR),
        _ => Err(GravityError::validation(format!("Invalid log level: {name}"))),
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "TRACE",
        Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARNING",
        _ => "ERROR",
    }
}

/// Collects event fields into a JSON map.
#[derive(Default)]
struct FieldCollector {
    fields: Map<String, Value>,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }

    fn take_string(&mut self, key: &str) -> Option<String> {
        self.fields.remove(key).map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }
}

/// Event formatter producing the service log layout.
#[derive(Debug, Clone)]
pub struct ServiceFormat {
    service_name: String,
    json: bool,
}

impl ServiceFormat {
    /// Formatter for `service_name`, JSON or text.
    #[must_use]
    pub fn new(service_name: impl Into<String>, json: bool) -> Self {
        Self {
            service_name: service_name.into(),
            json,
        }
    }
}

impl<S, N> FormatEvent<S, N> for ServiceFormat
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
        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let message = collector.take_string("message").unwrap_or_default();
        let logger = collector
            .take_string(LOGGER_FIELD)
            .unwrap_or_else(|| meta.target().to_string());
        let now = Utc::now();

        if !self.json {
            return writeln!(
                writer,
                "{} - {} - {} - {}",
                now.format("%Y-%m-%d %H:%M:%S,%3f"),
                logger,
                level_name(meta.level()),
                message
            );
        }

        let mut record = Map::new();
        record.insert(
            "timestamp".to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        record.insert("level".to_string(), Value::from(level_name(meta.level())));
        record.insert("logger".to_string(), Value::String(logger));
        record.insert("service".to_string(), Value::String(self.service_name.clone()));
        record.insert("message".to_string(), Value::String(message));
        for (key, value) in collector.fields {
            record.entry(key).or_insert(value);
        }

        writeln!(writer, "{}", Value::Object(record))
    }
}

/// Install the global subscriber writing to stdout.
///
/// `RUST_LOG` takes precedence over `config.log_level` when set.
///
/// # Errors
///
/// Returns a validation error for an unknown level, or a conflict error if a
/// global subscriber is already installed.
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let level = parse_level(&config.log_level)?;
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let layer = tracing_subscriber::fmt::layer()
        .event_format(ServiceFormat::new(&config.service_name, config.json_logs))
        .with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| GravityError::conflict(format!("Logging already initialized: {e}")))
}

/// Named logger whose name is reported in the `logger` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    name: String,
}

impl Logger {
    /// Logger name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Log at DEBUG.
    pub fn debug(&self, message: &str) {
        tracing::debug!(logger = %self.name, "{message}");
    }

    /// Log at INFO.
    pub fn info(&self, message: &str) {
        tracing::info!(logger = %self.name, "{message}");
    }

    /// Log at WARNING.
    pub fn warn(&self, message: &str) {
        tracing::warn!(logger = %self.name, "{message}");
    }

    /// Log at ERROR.
    pub fn error(&self, message: &str) {
        tracing::error!(logger = %self.name, "{message}");
    }
}

/// Logger reporting itself as `name`.
#[must_use]
pub fn get_logger(name: impl Into<String>) -> Logger {
    Logger { name: name.into() }
}
