//! Integration test: pool lifecycle logs round-trip through the JSONL
//! contract.
//!
//! Validates that:
//! 1. Every lifecycle record of a workload becomes a valid JSONL line.
//! 2. `validate_log_file` accepts emitted files and flags broken lines.
//! 3. Logs with a fixed timestamp are byte-identical across runs.
//!
//! Run: cargo test -p poolalloc-harness --test structured_log_test

use std::path::PathBuf;

use poolalloc_core::{PoolConfig, ValidationMode};
use poolalloc_harness::structured_log::{LogEmitter, LogLevel, sha256_hex};
use poolalloc_harness::{WorkloadSpec, run_workload, validate_log_file, validate_log_line};

fn scratch_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("poolalloc-harness-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

fn render(spec: &WorkloadSpec, mode: ValidationMode) -> Vec<u8> {
    let config = PoolConfig::default().with_validation(mode);
    let run = run_workload(spec, config).unwrap();
    let mut emitter =
        LogEmitter::to_buffer("it").with_fixed_timestamp("2026-01-01T00:00:00.000Z");
    emitter.emit(LogLevel::Info, "run_start").unwrap();
    let n = emitter.emit_pool_records(&run.records, mode).unwrap();
    assert_eq!(n, run.records.len());
    emitter.into_inner().unwrap()
}

#[test]
fn every_emitted_line_validates() {
    let spec = WorkloadSpec {
        seed: 42,
        steps: 500,
        slots: 16,
        ..WorkloadSpec::default()
    };
    let bytes = render(&spec, ValidationMode::Strict);
    let text = String::from_utf8(bytes).unwrap();
    let mut saw_grow = false;
    for (i, line) in text.lines().enumerate() {
        let entry = validate_log_line(line, i + 1)
            .unwrap_or_else(|errs| panic!("line {} invalid: {:?}", i + 1, errs));
        assert_eq!(entry.run_id.as_deref(), Some("it"));
        saw_grow |= entry.event == "arena_grow";
    }
    assert!(saw_grow, "workload never grew the arena");
}

#[test]
fn validate_log_file_counts_lines_and_errors() {
    let spec = WorkloadSpec {
        seed: 5,
        steps: 200,
        slots: 8,
        ..WorkloadSpec::default()
    };
    let mut bytes = render(&spec, ValidationMode::Off);
    let good_lines = bytes.iter().filter(|&&b| b == b'\n').count();

    let path = scratch_path("valid.jsonl");
    std::fs::write(&path, &bytes).unwrap();
    let (lines, errors) = validate_log_file(&path).unwrap();
    assert_eq!(lines, good_lines);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    bytes.extend_from_slice(b"{\"level\":\"info\"}\n");
    let path = scratch_path("broken.jsonl");
    std::fs::write(&path, &bytes).unwrap();
    let (lines, errors) = validate_log_file(&path).unwrap();
    assert_eq!(lines, good_lines + 1);
    assert!(errors.iter().all(|e| e.line_number == good_lines + 1));
    assert!(errors.iter().any(|e| e.field == "trace_id"));
}

#[test]
fn fixed_timestamp_logs_are_reproducible() {
    let spec = WorkloadSpec {
        seed: 0xC0FFEE,
        steps: 1_000,
        budget: Some(16 * 1024),
        ..WorkloadSpec::default()
    };
    let a = render(&spec, ValidationMode::Strict);
    let b = render(&spec, ValidationMode::Strict);
    assert_eq!(sha256_hex(&a), sha256_hex(&b));

    let other = WorkloadSpec { seed: 0xC0FFEF, ..spec };
    assert_ne!(sha256_hex(&a), sha256_hex(&render(&other, ValidationMode::Strict)));
}
