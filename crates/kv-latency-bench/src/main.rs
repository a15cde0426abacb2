// Numan Thabit 2025
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use kv_latency_bench::{
    bench::{execute_run, write_report},
    BenchConfig, CliArgs, Console, HttpExecutor,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = CliArgs::parse();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let config = BenchConfig::from_cli(&cli)?;

    let executor = HttpExecutor::new(&config.base_url)?;
    let mut console = Console::stdio();
    let Some(report) = execute_run(&executor, &config, &mut console).await else {
        return Ok(ExitCode::SUCCESS);
    };

    if let Some(path) = &config.output_json {
        write_report(path, &report)?;
        info!(
            path = %path.display(),
            phases = report.phases.len(),
            "persisted benchmark report"
        );
    }

    Ok(ExitCode::from(report.exit_code()))
}
