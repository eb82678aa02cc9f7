//! Structured JSONL logging for pool workloads.
//!
//! Provides:
//! - [`LogEntry`]: canonical JSONL record with required + optional fields.
//! - [`LogEmitter`]: writes JSONL lines to a file or an in-memory buffer.
//! - [`ArtifactIndex`]: links a run's outputs with SHA-256 integrity.
//! - [`validate_log_line`] / [`validate_log_file`]: schema checks.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use poolalloc_core::{PoolLogLevel, PoolLogRecord, PoolStats, ValidationMode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<PoolLogLevel> for LogLevel {
    fn from(level: PoolLogLevel) -> Self {
        match level {
            PoolLogLevel::Trace => Self::Trace,
            PoolLogLevel::Debug => Self::Debug,
            PoolLogLevel::Info => Self::Info,
            PoolLogLevel::Warn => Self::Warn,
            PoolLogLevel::Error => Self::Error,
        }
    }
}

/// Pool counters as serialized into logs and reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub releases: u64,
    pub resizes: u64,
    pub free_list_hits: u64,
    pub refills: u64,
    pub arena_growths: u64,
    pub leftover_splices: u64,
    pub salvages: u64,
    pub system_alloc_calls: u64,
    pub system_alloc_failures: u64,
    pub system_free_calls: u64,
    pub large_live: usize,
    pub heap_size: usize,
    pub arena_remaining: usize,
    pub free_blocks: usize,
}

impl From<PoolStats> for StatsSnapshot {
    fn from(s: PoolStats) -> Self {
        Self {
            requests: s.requests,
            releases: s.releases,
            resizes: s.resizes,
            free_list_hits: s.free_list_hits,
            refills: s.refills,
            arena_growths: s.arena_growths,
            leftover_splices: s.leftover_splices,
            salvages: s.salvages,
            system_alloc_calls: s.system_alloc_calls,
            system_alloc_failures: s.system_alloc_failures,
            system_free_calls: s.system_free_calls,
            large_live: s.large_live,
            heap_size: s.heap_size,
            arena_remaining: s.arena_remaining,
            free_blocks: s.free_blocks,
        }
    }
}

/// Canonical structured log entry.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    // Required
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    // Optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Handle validation mode (`strict` or `off`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Pool entry point that produced the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<u64>,
    /// Block handle rendered as `r<region>+0x<offset>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create a new log entry with required fields only.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            run_id: None,
            mode: None,
            symbol: None,
            decision_id: None,
            block: None,
            size: None,
            class: None,
            outcome: None,
            stats: None,
            details: None,
        }
    }

    /// Build an entry from a pool lifecycle record.
    ///
    /// The record's own trace id and decision id are carried over unchanged.
    #[must_use]
    pub fn from_pool_record(record: &PoolLogRecord, mode: ValidationMode) -> Self {
        let mut entry = Self::new(record.trace_id.clone(), record.level.into(), record.event)
            .with_mode(mode.as_str())
            .with_symbol(record.symbol)
            .with_outcome(record.outcome)
            .with_stats(record.stats.into());
        entry.decision_id = Some(record.decision_id);
        entry.block = record.block.map(|b| b.to_string());
        entry.size = record.size;
        entry.class = record.class;
        if !record.details.is_empty() {
            entry.details = Some(serde_json::Value::String(record.details.clone()));
        }
        entry
    }

    #[must_use]
    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Set the validation mode.
    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    #[must_use]
    pub fn with_stats(mut self, stats: StatsSnapshot) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Set free-form details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Artifact index
// ---------------------------------------------------------------------------

/// A single artifact entry in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
    pub kind: String,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Artifact index linking a run's log and report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub index_version: u32,
    pub run_id: String,
    pub generated_utc: String,
    pub artifacts: Vec<ArtifactEntry>,
}

impl ArtifactIndex {
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            index_version: 1,
            run_id: run_id.into(),
            generated_utc: now_utc(),
            artifacts: Vec::new(),
        }
    }

    /// Add an artifact, hashing its contents.
    pub fn add(&mut self, path: impl Into<String>, kind: impl Into<String>, data: &[u8]) -> &mut Self {
        self.artifacts.push(ArtifactEntry {
            path: path.into(),
            kind: kind.into(),
            sha256: sha256_hex(data),
            size_bytes: Some(data.len() as u64),
        });
        self
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Lowercase hex SHA-256 of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    use std::fmt::Write as _;
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

// ---------------------------------------------------------------------------
// Log emitter
// ---------------------------------------------------------------------------

/// Writes structured JSONL log entries.
pub struct LogEmitter<W: Write = BufWriter<File>> {
    writer: W,
    seq: u64,
    run_id: String,
    timestamp: Option<String>,
    lines: usize,
}

impl LogEmitter {
    /// Create an emitter that writes to a file.
    pub fn to_file(path: &Path, run_id: &str) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), run_id))
    }
}

impl LogEmitter<Vec<u8>> {
    /// Create an emitter that writes to an in-memory buffer.
    #[must_use]
    pub fn to_buffer(run_id: &str) -> Self {
        Self::new(Vec::new(), run_id)
    }
}

impl<W: Write> LogEmitter<W> {
    pub fn new(writer: W, run_id: &str) -> Self {
        Self {
            writer,
            seq: 0,
            run_id: run_id.to_string(),
            timestamp: None,
            lines: 0,
        }
    }

    /// Stamp every entry with `timestamp` instead of the wall clock.
    #[must_use]
    pub fn with_fixed_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("harness::{}::{:03}", self.run_id, self.seq)
    }

    /// Emit a log entry with an auto-generated trace id.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let trace_id = self.next_trace_id();
        let entry = LogEntry::new(trace_id, level, event);
        self.emit_entry(entry.clone())?;
        Ok(entry)
    }

    /// Emit a fully-populated log entry.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        if entry.run_id.is_none() {
            entry.run_id = Some(self.run_id.clone());
        }
        if let Some(ts) = &self.timestamp {
            entry.timestamp = ts.clone();
        }
        let line = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")?;
        self.lines += 1;
        Ok(())
    }

    /// Emit one entry per pool lifecycle record.
    pub fn emit_pool_records<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a PoolLogRecord>,
        mode: ValidationMode,
    ) -> std::io::Result<usize> {
        let mut n = 0;
        for record in records {
            self.emit_entry(LogEntry::from_pool_record(record, mode))?;
            n += 1;
        }
        Ok(n)
    }

    /// Lines written so far.
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(mut self) -> std::io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validation error for a log line.
#[derive(Debug)]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for LogValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}: field '{}': {}",
            self.line_number, self.field, self.message
        )
    }
}

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const MODES: [&str; 2] = ["strict", "off"];

/// Validate a single JSONL line against the schema.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let mut errors = Vec::new();
    let mut fail = |field: &str, message: String| {
        errors.push(LogValidationError {
            line_number,
            field: field.to_string(),
            message,
        });
    };

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            fail("<json>", format!("invalid JSON: {e}"));
            return Err(errors);
        }
    };

    let Some(obj) = value.as_object() else {
        fail("<root>", "expected JSON object".to_string());
        return Err(errors);
    };

    for field in ["timestamp", "trace_id", "level", "event"] {
        if !obj.contains_key(field) {
            fail(field, "required field missing".to_string());
        }
    }

    if let Some(level) = obj.get("level").and_then(|v| v.as_str())
        && !LEVELS.contains(&level)
    {
        fail("level", format!("invalid level: '{level}'"));
    }

    if let Some(mode) = obj.get("mode").and_then(|v| v.as_str())
        && !MODES.contains(&mode)
    {
        fail("mode", format!("invalid mode: '{mode}'"));
    }

    if let Some(trace_id) = obj.get("trace_id").and_then(|v| v.as_str())
        && !trace_id.contains("::")
    {
        fail(
            "trace_id",
            format!("trace_id should follow <scope>::<symbol>::<seq> format, got: '{trace_id}'"),
        );
    }

    // Pool records carry a symbol and a non-zero decision id together.
    if let Some(id) = obj.get("decision_id") {
        if id.as_u64().is_none_or(|id| id == 0) {
            fail("decision_id", "decision_id must be a positive integer".to_string());
        }
        if !obj.get("symbol").is_some_and(serde_json::Value::is_string) {
            fail("symbol", "pool records must include symbol".to_string());
        }
    }

    if let Some(class) = obj.get("class").and_then(|v| v.as_u64())
        && class >= poolalloc_core::pool::NUM_SIZE_CLASSES as u64
    {
        fail("class", format!("size class out of range: {class}"));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    match serde_json::from_value::<LogEntry>(value) {
        Ok(entry) => Ok(entry),
        Err(e) => {
            errors.push(LogValidationError {
                line_number,
                field: "<deserialization>".to_string(),
                message: format!("failed to deserialize: {e}"),
            });
            Err(errors)
        }
    }
}

/// Validate an entire JSONL file.
///
/// Returns the total line count and any validation errors found.
pub fn validate_log_file(path: &Path) -> Result<(usize, Vec<LogValidationError>), std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    let mut all_errors = Vec::new();
    let mut line_count = 0;

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        line_count += 1;
        if let Err(errs) = validate_log_line(line, i + 1) {
            all_errors.extend(errs);
        }
    }

    Ok((line_count, all_errors))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    // Approximate calendar fields; only ordering matters for these logs.
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        1970 + secs / 31_557_600,
        (secs % 31_557_600) / 2_629_800 + 1,
        (secs % 2_629_800) / 86400 + 1,
        (secs % 86400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
        millis,
    )
}
