// Numan Thabit 2025
use std::{
    fmt,
    io::{self, Stderr, Stdout, Write},
    time::{Duration, Instant},
};

use humantime::format_duration;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    executor::{MeasureExecutor, RequestError, RequestKind},
    timing::parse_timing_ms,
};

/// Operator-facing output: report lines on `out`, per-request diagnostics on `diag`.
#[derive(Debug)]
pub struct Console<O, D> {
    pub out: O,
    pub diag: D,
}

impl Console<Stdout, Stderr> {
    pub fn stdio() -> Self {
        Self {
            out: io::stdout(),
            diag: io::stderr(),
        }
    }
}

impl<O: Write, D: Write> Console<O, D> {
    pub fn line(&mut self, args: fmt::Arguments<'_>) {
        if let Err(err) = writeln!(self.out, "{args}") {
            debug!(%err, "failed to write report line");
        }
    }

    pub fn diagnostic(&mut self, args: fmt::Arguments<'_>) {
        if let Err(err) = writeln!(self.diag, "{args}") {
            debug!(%err, "failed to write diagnostic line");
        }
    }
}

/// One fixed sequence of requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseDescriptor {
    pub name: String,
    pub kind: RequestKind,
    pub tokens: Vec<String>,
    /// Printed with the phase summary when every request shares one token.
    pub token_label: Option<String>,
}

impl PhaseDescriptor {
    pub fn total(&self) -> usize {
        self.tokens.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseResult {
    pub name: String,
    pub total: usize,
    pub failed: usize,
    pub cumulative_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_label: Option<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl PhaseResult {
    pub fn successful(&self) -> usize {
        self.total - self.failed
    }

    /// Mean over requests that produced a timing; `None` when none did.
    pub fn average_ms(&self) -> Option<f64> {
        match self.successful() {
            0 => None,
            n => Some(self.cumulative_ms as f64 / n as f64),
        }
    }
}

/// Renders an average with two fractional digits, or `n/a`.
pub fn format_average(average: Option<f64>) -> String {
    average
        .map(|avg| format!("{avg:.2}"))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Runs every request of `phase` in order. Failed requests are counted and
/// reported but never stop the phase.
pub async fn run_phase<E, O, D>(
    executor: &E,
    phase: &PhaseDescriptor,
    console: &mut Console<O, D>,
) -> PhaseResult
where
    E: MeasureExecutor,
    O: Write,
    D: Write,
{
    let total = phase.total();
    let start = Instant::now();
    let mut cumulative_ms: u64 = 0;
    let mut failed = 0usize;

    console.line(format_args!(""));
    console.line(format_args!("--- {} ({} requests) ---", phase.name, total));
    info!(phase = %phase.name, total, kind = ?phase.kind, "starting phase");

    for (idx, token) in phase.tokens.iter().enumerate() {
        let position = idx + 1;
        match executor.execute(phase.kind, token).await {
            Ok(raw) => match parse_timing_ms(&raw) {
                Some(ms) => {
                    debug!(phase = %phase.name, position, ms, "request timed");
                    cumulative_ms = cumulative_ms.saturating_add(ms);
                }
                None => {
                    debug!(phase = %phase.name, position, "response carried no timing signal");
                    failed += 1;
                }
            },
            Err(RequestError::Timeout) => {
                warn!(phase = %phase.name, position, "request timed out");
                failed += 1;
                console.diagnostic(format_args!("  [{position:4}/{total}] timeout"));
            }
            Err(RequestError::Transport(cause)) => {
                warn!(phase = %phase.name, position, %cause, "request failed");
                failed += 1;
                console.diagnostic(format_args!("  [{position:4}/{total}] error: {cause}"));
            }
        }
    }

    let label = phase
        .token_label
        .as_deref()
        .map(|token| format!(" token={token}"))
        .unwrap_or_default();
    console.line(format_args!(
        "  Cumulative ms: {cumulative_ms}, Failed: {failed}{label}"
    ));

    let elapsed = start.elapsed();
    info!(
        phase = %phase.name,
        cumulative_ms,
        failed,
        elapsed = %format_duration(Duration::from_millis(elapsed.as_millis() as u64)),
        "phase complete"
    );

    PhaseResult {
        name: phase.name.clone(),
        total,
        failed,
        cumulative_ms,
        token_label: phase.token_label.clone(),
        elapsed,
    }
}
