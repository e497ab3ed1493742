//! Structured events for a pipeline run.
//!
//! Every stage transition, tolerated window failure and quiz verdict is
//! recorded as a [`LogEntry`] and fanned out to the attached sinks.
//!
//! ```text
//! LearningPipeline::run
//!           │
//!      RunLogger::log(entry)
//!           │
//!      ┌────┴────┐
//!      ▼         ▼
//!  TracingSink MemorySink
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for run log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// A structured log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// Emitting component, e.g. `pipeline` or `stage:concepts`.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            source: source.into(),
            run_id: None,
            message: message.into(),
            payload: None,
        }
    }

    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Format as a single-line log string.
    pub fn format_line(&self) -> String {
        let ts = self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ");
        let run = self
            .run_id
            .map(|id| format!(" [{id}]"))
            .unwrap_or_default();
        format!("{ts} {} {}{} {}", self.level, self.source, run, self.message)
    }
}

/// Output target for log entries.
pub trait LogSink: Send + Sync {
    fn write(&self, entry: &LogEntry);
}

/// Dispatches entries to every sink at or above `min_level`.
#[derive(Clone)]
pub struct RunLogger {
    sinks: Vec<Arc<dyn LogSink>>,
    min_level: LogLevel,
}

impl RunLogger {
    /// A logger with no sinks (drops everything).
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            min_level: LogLevel::Trace,
        }
    }

    /// A logger forwarding to `tracing`.
    pub fn tracing() -> Self {
        let mut logger = Self::new();
        logger.add_sink(Arc::new(TracingSink));
        logger
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn LogSink>) {
        self.sinks.push(sink);
    }

    pub fn log(&self, entry: &LogEntry) {
        if entry.level < self.min_level {
            return;
        }
        for sink in &self.sinks {
            sink.write(entry);
        }
    }

    /// Scope entries to a single run.
    pub fn for_run(&self, run_id: Uuid) -> RunScope<'_> {
        RunScope {
            logger: self,
            run_id,
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

impl Default for RunLogger {
    fn default() -> Self {
        Self::tracing()
    }
}

/// A logger bound to one run id.
pub struct RunScope<'a> {
    logger: &'a RunLogger,
    run_id: Uuid,
}

impl RunScope<'_> {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn emit(&self, level: LogLevel, source: &str, message: impl Into<String>) {
        self.logger
            .log(&LogEntry::new(level, source, message).with_run(self.run_id));
    }

    pub fn emit_with(
        &self,
        level: LogLevel,
        source: &str,
        message: impl Into<String>,
        payload: serde_json::Value,
    ) {
        self.logger.log(
            &LogEntry::new(level, source, message)
                .with_run(self.run_id)
                .with_payload(payload),
        );
    }

    pub fn info(&self, source: &str, message: impl Into<String>) {
        self.emit(LogLevel::Info, source, message);
    }

    pub fn warn(&self, source: &str, message: impl Into<String>) {
        self.emit(LogLevel::Warn, source, message);
    }

    pub fn error(&self, source: &str, message: impl Into<String>) {
        self.emit(LogLevel::Error, source, message);
    }
}

// ─── Built-in Sinks ────────────────────────────────────────────────────────

/// Forwards entries to the `tracing` subscriber.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, entry: &LogEntry) {
        let run_id = entry.run_id.map(|id| id.to_string()).unwrap_or_default();
        let payload = entry
            .payload
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_default();
        let source = entry.source.as_str();
        let message = entry.message.as_str();

        match entry.level {
            LogLevel::Trace => tracing::trace!(source, %run_id, %payload, "{message}"),
            LogLevel::Debug => tracing::debug!(source, %run_id, %payload, "{message}"),
            LogLevel::Info => tracing::info!(source, %run_id, %payload, "{message}"),
            LogLevel::Warn => tracing::warn!(source, %run_id, %payload, "{message}"),
            LogLevel::Error => tracing::error!(source, %run_id, %payload, "{message}"),
        }
    }
}

/// Collects entries in memory (for testing / inspection).
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries whose source matches exactly.
    pub fn entries_from(&self, source: &str) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.source == source)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for MemorySink {
    fn write(&self, entry: &LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
    }
}
