// Numan Thabit 2025
//! kv-latency-bench: sequential write/read latency harness for a KV service
//! that reports per-request timing in its responses.

/// Phase orchestration, summary rendering and JSON reports.
pub mod bench;
/// Command-line and environment configuration.
pub mod config;
/// HTTP request execution.
pub mod executor;
/// Per-phase request loop and accounting.
pub mod phase;
/// Timing extraction from raw responses.
pub mod timing;

pub use bench::{run_benchmark, BenchReport};
pub use config::{BenchConfig, CliArgs};
pub use executor::{HttpExecutor, MeasureExecutor, RequestError, RequestKind};
pub use phase::{run_phase, Console, PhaseDescriptor, PhaseResult};
pub use timing::parse_timing_ms;
