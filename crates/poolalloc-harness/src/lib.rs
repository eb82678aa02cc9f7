//! Workload harness for poolalloc.
//!
//! This crate provides:
//! - Deterministic workloads that drive a pool and collect its lifecycle log
//! - JSONL structured logging and schema validation for those logs
//! - Artifact indexing with SHA-256 digests for reproducible runs

#![forbid(unsafe_code)]

pub mod structured_log;
pub mod workload;

pub use structured_log::{LogEmitter, LogEntry, LogLevel, validate_log_file, validate_log_line};
pub use workload::{HarnessError, WorkloadReport, WorkloadRun, WorkloadSpec, run_workload};
