use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Args, Parser, Subcommand};
use luv_deploy::{MigrateConfig, MigrationKind};
use tracing::level_filters::LevelFilter;
use url::Url;

/// The first account of a fresh Anvil/Ganache-style dev chain.
const DEFAULT_DRY_RUN_DEPLOYER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

#[derive(Parser)]
#[command(name = "luv-migrate")]
#[command(
    author,
    version,
    about = "Deploy the LuvNFT contract suite, one confirmed step at a time"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "LUV_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a LuvDeploy.toml file, or to the directory containing it.
    ///
    /// Defaults to ./LuvDeploy.toml when present. Values from the file are
    /// overridden by LUV_* environment variables, then by command-line flags.
    #[arg(long, alias = "conf", global = true, env = "LUV_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the ordered steps of a migration.
    Plan(PlanArgs),
    /// Run a migration against a node and record the deployed addresses.
    Migrate(MigrateArgs),
    /// Print the recorded deployment of a network.
    Status(StatusArgs),
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// The migration to plan. Defaults to the configured migration.
    #[arg(short, long)]
    pub migration: Option<MigrationKind>,

    /// Simulate the migration and print the predicted addresses.
    #[arg(long)]
    pub dry_run: bool,

    /// Account the dry run deploys from.
    #[arg(long, requires = "dry_run", default_value = DEFAULT_DRY_RUN_DEPLOYER)]
    pub deployer: Address,

    /// Nonce of the deployer's first deployment.
    #[arg(long, requires = "dry_run", default_value_t = 0)]
    pub nonce: u64,

    /// Link and encode against the artifacts in this directory during the dry run.
    #[arg(long, requires = "dry_run")]
    pub artifacts: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// The migration to run.
    #[arg(short, long)]
    pub migration: Option<MigrationKind>,

    /// Name of the target network. Keys the deployment ledger.
    #[arg(short, long)]
    pub network: Option<String>,

    /// The node's HTTP endpoint.
    #[arg(long, alias = "rpc")]
    pub rpc_url: Option<Url>,

    /// The unlocked account to deploy from. Defaults to the node's first account.
    #[arg(long)]
    pub from: Option<Address>,

    /// Directory holding the compiled contract artifacts.
    #[arg(long, alias = "build-dir")]
    pub artifacts: Option<PathBuf>,

    /// Directory receiving the deployment ledgers.
    #[arg(long)]
    pub outdata: Option<PathBuf>,

    /// Run the migration even if this network already has a matching deployment.
    #[arg(long, default_value_t = false)]
    pub reset: bool,

    /// Write the resolved configuration to this file before deploying.
    #[arg(long)]
    pub save_config: Option<PathBuf>,
}

impl MigrateArgs {
    /// Override the loaded configuration with the flags that were given.
    pub fn apply(&self, config: &mut MigrateConfig) {
        if let Some(migration) = self.migration {
            config.migration = migration;
        }
        if let Some(network) = &self.network {
            config.network = network.clone();
        }
        if let Some(rpc_url) = &self.rpc_url {
            config.rpc_url = rpc_url.clone();
        }
        if let Some(from) = self.from {
            config.from = Some(from);
        }
        if let Some(artifacts) = &self.artifacts {
            config.artifacts_dir = artifacts.clone();
        }
        if let Some(outdata) = &self.outdata {
            config.outdata = outdata.clone();
        }
    }
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Name of the network to show.
    #[arg(short, long)]
    pub network: Option<String>,

    /// Directory holding the deployment ledgers.
    #[arg(long)]
    pub outdata: Option<PathBuf>,
}
