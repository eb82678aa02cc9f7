//! CLI entrypoint for the poolalloc workload harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use poolalloc_core::{PoolConfig, ValidationMode};
use poolalloc_harness::structured_log::{ArtifactIndex, LogEmitter, LogLevel, sha256_hex};
use poolalloc_harness::{HarnessError, WorkloadSpec, run_workload, validate_log_file};
use serde::Serialize;

/// Workload tooling for poolalloc.
#[derive(Debug, Parser)]
#[command(name = "poolalloc-harness")]
#[command(about = "Deterministic workload harness for poolalloc")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a deterministic workload and emit its lifecycle log as JSONL.
    Run {
        /// Root seed (decimal or 0x...).
        #[arg(long, default_value = "0xDEAD_BEEF")]
        seed: String,
        /// Number of operations.
        #[arg(long, default_value_t = 10_000)]
        steps: usize,
        /// Maximum simultaneously live allocations.
        #[arg(long, default_value_t = 64)]
        slots: usize,
        /// Percentage of requests above the small-block limit.
        #[arg(long, default_value_t = 5)]
        large_pct: u8,
        /// System allocator budget in bytes (unbounded if omitted).
        #[arg(long)]
        budget: Option<usize>,
        /// Refill batch (defaults to POOLALLOC_BATCH or 20).
        #[arg(long)]
        batch: Option<usize>,
        /// Handle validation mode (`strict` or `off`).
        #[arg(long)]
        mode: Option<String>,
        /// Output JSONL log path.
        #[arg(long)]
        log: PathBuf,
        /// Output report path (if omitted, prints to stdout).
        #[arg(long)]
        report: Option<PathBuf>,
        /// Optional artifact index path.
        #[arg(long)]
        artifact_index: Option<PathBuf>,
        /// Fixed timestamp for byte-identical logs across runs.
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// Validate a JSONL log against the structured-log schema.
    ValidateLog {
        /// JSONL log path.
        #[arg(long)]
        log: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct RunOutput<'a> {
    run_id: &'a str,
    log_path: String,
    log_lines: usize,
    log_sha256: String,
    report: &'a poolalloc_harness::WorkloadReport,
}

fn parse_seed(raw: &str) -> Result<u64, String> {
    let cleaned = raw.trim().replace('_', "");
    let parsed = match cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => cleaned.parse::<u64>(),
    };
    parsed.map_err(|err| format!("invalid seed '{raw}': {err}"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            seed,
            steps,
            slots,
            large_pct,
            budget,
            batch,
            mode,
            log,
            report,
            artifact_index,
            timestamp,
        } => {
            let seed = parse_seed(&seed)?;
            let mut config = PoolConfig::from_env();
            if let Some(batch) = batch {
                config = config.with_batch(batch);
            }
            if let Some(mode) = mode {
                config = config.with_validation(ValidationMode::from_str_loose(&mode));
            }
            let spec = WorkloadSpec {
                seed,
                steps,
                slots,
                large_pct: large_pct.min(100),
                budget,
                ..WorkloadSpec::default()
            };
            let run_id = format!("seed-{seed:016x}");
            eprintln!(
                "Running {steps} steps (seed={seed:#x}, mode={}, batch={})",
                config.validation().as_str(),
                config.batch()
            );

            let run = run_workload(&spec, config)?;

            let mut emitter = LogEmitter::to_buffer(&run_id);
            if let Some(ts) = &timestamp {
                emitter = emitter.with_fixed_timestamp(ts.clone());
            }
            emitter.emit(LogLevel::Info, "run_start")?;
            emitter.emit_pool_records(&run.records, config.validation())?;
            emitter.emit(LogLevel::Info, "run_end")?;
            let log_lines = emitter.lines();
            let bytes = emitter.into_inner()?;
            std::fs::write(&log, &bytes)?;
            eprintln!("Wrote {log_lines} log lines to {}", log.display());

            let output = RunOutput {
                run_id: &run_id,
                log_path: log.display().to_string(),
                log_lines,
                log_sha256: sha256_hex(&bytes),
                report: &run.report,
            };
            let json = serde_json::to_string_pretty(&output)?;
            match &report {
                Some(path) => {
                    std::fs::write(path, &json)?;
                    eprintln!("Wrote report to {}", path.display());
                }
                None => println!("{json}"),
            }

            if let Some(index_path) = artifact_index {
                let mut index = ArtifactIndex::new(&run_id);
                index.add(log.display().to_string(), "log", &bytes);
                if let Some(path) = &report {
                    index.add(path.display().to_string(), "report", json.as_bytes());
                }
                std::fs::write(&index_path, index.to_json()?)?;
                eprintln!("Wrote artifact index to {}", index_path.display());
            }

            if run.report.corrupted > 0 {
                eprintln!("{} live allocation(s) lost their contents", run.report.corrupted);
                std::process::exit(1);
            }
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for err in &errors {
                eprintln!("{err}");
            }
            eprintln!("Validated {lines} line(s), {} error(s)", errors.len());
            if !errors.is_empty() {
                return Err(Box::new(HarnessError::InvalidLog(errors.len())));
            }
        }
    }
    Ok(())
}
