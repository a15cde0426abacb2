// Numan Thabit 2025
use std::{
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    config::BenchConfig,
    executor::{endpoint_url, MeasureExecutor, RequestKind},
    phase::{format_average, run_phase, Console, PhaseDescriptor, PhaseResult},
};

const SUMMARY_RULE_WIDTH: usize = 50;

/// Deterministic token set: `fake-token-00000`, `fake-token-00001`, ...
pub fn generate_tokens(count: usize) -> Vec<String> {
    (0..count).map(|idx| format!("fake-token-{idx:05}")).collect()
}

/// Write, distinct-read and repeated-read phases over `tokens`, in run order.
pub fn plan_phases(tokens: &[String]) -> Vec<PhaseDescriptor> {
    let mut phases = vec![
        PhaseDescriptor {
            name: "Phase 1: PUT (one per token)".to_string(),
            kind: RequestKind::Write,
            tokens: tokens.to_vec(),
            token_label: None,
        },
        PhaseDescriptor {
            name: "Phase 2: GET (different key each request)".to_string(),
            kind: RequestKind::Read,
            tokens: tokens.to_vec(),
            token_label: None,
        },
    ];
    if let Some(last) = tokens.last() {
        phases.push(PhaseDescriptor {
            name: "Phase 3: GET (same key every request)".to_string(),
            kind: RequestKind::Read,
            tokens: vec![last.clone(); tokens.len()],
            token_label: Some(last.clone()),
        });
    }
    phases
}

/// Logs what a run would do without sending any request.
pub fn log_dry_run(config: &BenchConfig) {
    let tokens = generate_tokens(config.token_count);
    for phase in plan_phases(&tokens) {
        info!(
            phase = %phase.name,
            requests = phase.total(),
            url = %endpoint_url(&config.base_url, phase.kind),
            first_token = phase.tokens.first().map(String::as_str).unwrap_or("<none>"),
            token_label = phase.token_label.as_deref().unwrap_or("<none>"),
            "dry run: would execute phase"
        );
    }
    if let Some(path) = &config.output_json {
        info!(path = %path.display(), "dry run: would persist report");
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub base_url: String,
    pub token_count: usize,
    pub phases: Vec<PhaseReport>,
    pub total_failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    #[serde(flatten)]
    pub result: PhaseResult,
    pub average_ms: Option<f64>,
}

impl BenchReport {
    fn new(config: &BenchConfig, results: Vec<PhaseResult>) -> Self {
        let total_failed = results.iter().map(|r| r.failed).sum();
        let phases = results
            .into_iter()
            .map(|result| PhaseReport {
                average_ms: result.average_ms(),
                result,
            })
            .collect();
        Self {
            base_url: config.base_url.to_string(),
            token_count: config.token_count,
            phases,
            total_failed,
        }
    }

    pub fn results(&self) -> impl Iterator<Item = &PhaseResult> {
        self.phases.iter().map(|p| &p.result)
    }

    /// 0 when no request in any phase failed, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.total_failed == 0 {
            0
        } else {
            1
        }
    }
}

/// Entry point for one invocation: logs the plan on a dry run, otherwise
/// runs the benchmark. Returns `None` when nothing was sent.
pub async fn execute_run<E, O, D>(
    executor: &E,
    config: &BenchConfig,
    console: &mut Console<O, D>,
) -> Option<BenchReport>
where
    E: MeasureExecutor,
    O: Write,
    D: Write,
{
    if config.dry_run {
        log_dry_run(config);
        return None;
    }
    Some(run_benchmark(executor, config, console).await)
}

/// Runs all phases in order and prints the summary table.
pub async fn run_benchmark<E, O, D>(
    executor: &E,
    config: &BenchConfig,
    console: &mut Console<O, D>,
) -> BenchReport
where
    E: MeasureExecutor,
    O: Write,
    D: Write,
{
    console.line(format_args!("Base URL: {}", config.base_url));
    console.line(format_args!("NUM_TOKENS: {}", config.token_count));

    let tokens = generate_tokens(config.token_count);
    let mut results = Vec::with_capacity(3);
    for phase in plan_phases(&tokens) {
        let result = run_phase(executor, &phase, console).await;
        if phase.kind == RequestKind::Write && result.failed > 0 {
            console.diagnostic(format_args!("Put phase had {} failures.", result.failed));
        }
        results.push(result);
    }

    let report = BenchReport::new(config, results);
    render_summary(&report, console);
    if report.total_failed > 0 {
        warn!(total_failed = report.total_failed, "benchmark finished with failures");
    } else {
        info!("benchmark finished without failures");
    }
    report
}

fn render_summary<O: Write, D: Write>(report: &BenchReport, console: &mut Console<O, D>) {
    let rule = "=".repeat(SUMMARY_RULE_WIDTH);
    console.line(format_args!(""));
    console.line(format_args!("{rule}"));
    console.line(format_args!("Summary"));
    console.line(format_args!("{rule}"));

    let labels = [
        "PUT ",
        "GET  (different)  ",
        "GET  (same key)   ",
    ];
    for (label, result) in labels.iter().zip(report.results()) {
        console.line(format_args!(
            "  {label} cumulative ms: {}  avg ms: {}  (failed: {})",
            result.cumulative_ms,
            format_average(result.average_ms()),
            result.failed
        ));
    }
}

/// Persists `report` as pretty JSON, creating parent directories as needed.
pub fn write_report(path: &Path, report: &BenchReport) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).with_context(|| {
                format!("failed to create report directory {}", dir.display())
            })?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("failed to open report path {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to flush report to {}", path.display()))?;
    Ok(())
}
