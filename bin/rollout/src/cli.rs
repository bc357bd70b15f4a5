use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "rollout")]
#[command(
    author,
    version,
    about = "Deploy dependency-ordered contract plans to an Ethereum-compatible network"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "ROLLOUT_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the TOML deployment plan.
    #[arg(short, long, env = "ROLLOUT_PLAN")]
    pub plan: PathBuf,

    /// Path to a TOML file of named environment constants.
    ///
    /// Constants can also be supplied as `ROLLOUT_CONST_<name>` process
    /// environment variables, which override the file.
    #[arg(long, alias = "env", env = "ROLLOUT_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// JSON report from a prior run; steps whose components it records as
    /// deployed are skipped instead of redeployed.
    #[arg(long, env = "ROLLOUT_SEED")]
    pub seed: Option<PathBuf>,

    /// Where to write the finalized JSON report.
    #[arg(short, long, env = "ROLLOUT_OUT")]
    pub out: Option<PathBuf>,

    /// JSON-RPC endpoint of the target network.
    #[arg(long, env = "ROLLOUT_RPC_URL", default_value = "http://127.0.0.1:8545")]
    pub rpc_url: Url,

    /// Sender address for deployment transactions. Required unless --dry-run.
    #[arg(long, env = "ROLLOUT_FROM")]
    pub from: Option<Address>,

    /// Validate the plan and print the execution order without deploying.
    #[arg(long, env = "ROLLOUT_DRY_RUN", default_value_t = false)]
    pub dry_run: bool,
}
