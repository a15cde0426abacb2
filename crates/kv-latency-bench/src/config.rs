// Numan Thabit 2025
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use url::Url;

use crate::executor::{endpoint_url, RequestKind, REQUEST_TIMEOUT};

const DEFAULT_BASE_URL: &str = "http://cf-worker-kv.boldorider4.workers.dev";
const DEFAULT_TOKEN_COUNT: u32 = 30;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Write/read latency harness for the KV measure endpoints",
    rename_all = "kebab-case"
)]
pub struct CliArgs {
    /// Base URL of the service exposing /measure/put/ and /measure/get/.
    #[arg(long, env = "MEASURE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Number of fake tokens; every phase issues this many requests.
    #[arg(
        long,
        env = "MEASURE_NUM_TOKENS",
        default_value_t = DEFAULT_TOKEN_COUNT,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub tokens: u32,

    /// Optional path to persist the phase results as JSON.
    #[arg(long, value_name = "PATH")]
    pub output_json: Option<PathBuf>,

    /// Only print the actions that would be taken.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub base_url: Url,
    pub token_count: usize,
    pub output_json: Option<PathBuf>,
    pub dry_run: bool,
}

impl BenchConfig {
    pub fn from_cli(cli: &CliArgs) -> Result<Self> {
        let base_url = Url::parse(cli.base_url.trim())
            .with_context(|| format!("invalid base url '{}'", cli.base_url))?;
        let config = Self {
            base_url,
            token_count: cli.tokens as usize,
            output_json: cli.output_json.clone(),
            dry_run: cli.dry_run,
        };
        config.validate()?;
        config.log_summary();
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !matches!(self.base_url.scheme(), "http" | "https") {
            bail!(
                "base url must use http or https, got '{}'",
                self.base_url.scheme()
            );
        }
        if self.base_url.cannot_be_a_base() {
            bail!("base url '{}' cannot carry a path", self.base_url);
        }
        if self.token_count == 0 {
            bail!("token count must be greater than 0");
        }
        Ok(())
    }

    fn log_summary(&self) {
        info!(
            base_url = %self.base_url,
            put_url = %endpoint_url(&self.base_url, RequestKind::Write),
            get_url = %endpoint_url(&self.base_url, RequestKind::Read),
            tokens = self.token_count,
            request_timeout = ?REQUEST_TIMEOUT,
            output_json = ?self.output_json,
            dry_run = self.dry_run,
            "kv-latency-bench configuration"
        );
    }
}
