//! Layered migration configuration.
//!
//! Values are resolved from, in increasing priority: built-in defaults, a TOML
//! file (`LuvDeploy.toml` by default), and `LUV_`-prefixed environment variables
//! such as `LUV_RPC_URL` or `LUV_NETWORK`.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    DeploymentLedger, MigrationKind, RpcBackendConfig,
    backend::rpc::{DEFAULT_POLL_INTERVAL, DEFAULT_RECEIPT_TIMEOUT, duration_secs},
};

/// The default name of the configuration file.
pub const CONFIG_FILENAME: &str = "LuvDeploy.toml";

/// Prefix of the environment variables overriding the configuration.
pub const ENV_PREFIX: &str = "LUV_";

/// Default node endpoint: a local development chain.
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545/";

/// Default network name.
pub const DEFAULT_NETWORK: &str = "development";

/// Default build directory of the compiled artifacts.
pub const DEFAULT_ARTIFACTS_DIR: &str = "build/contracts";

/// Everything needed to run a migration against one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateConfig {
    /// Name of the target network, used to key the deployment ledger.
    pub network: String,
    /// The node's HTTP endpoint.
    pub rpc_url: Url,
    /// Sender account. Defaults to the node's first unlocked account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Directory holding the compiled artifacts.
    pub artifacts_dir: PathBuf,
    /// Directory receiving the deployment ledgers.
    pub outdata: PathBuf,
    /// The migration to run.
    pub migration: MigrationKind,
    /// Interval between receipt polls, in seconds.
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
    /// Maximum time to wait for a receipt, in seconds.
    #[serde(with = "duration_secs")]
    pub receipt_timeout: Duration,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            rpc_url: Url::parse(DEFAULT_RPC_URL).expect("default RPC URL is valid"),
            from: None,
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            outdata: PathBuf::from("."),
            migration: MigrationKind::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }
}

impl MigrateConfig {
    /// The provider chain: defaults, then the TOML file, then the environment.
    pub fn figment(config_path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Resolve the configuration.
    ///
    /// An explicit `path` must exist; it may be the file itself or the directory
    /// containing `LuvDeploy.toml`. Without a path, `./LuvDeploy.toml` is used
    /// when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) if !path.exists() => {
                anyhow::bail!(
                    "Configuration file or directory not found: {}",
                    path.display()
                );
            }
            Some(path) if path.is_dir() => path.join(CONFIG_FILENAME),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(CONFIG_FILENAME),
        };

        let config: Self = Self::figment(&config_path)
            .extract()
            .with_context(|| format!("Failed to resolve configuration from {}", config_path.display()))?;

        tracing::debug!(path = %config_path.display(), network = %config.network, "Configuration loaded");
        Ok(config)
    }

    /// Save the configuration as TOML.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Settings of the JSON-RPC backend.
    pub fn rpc_backend_config(&self) -> RpcBackendConfig {
        RpcBackendConfig {
            rpc_url: self.rpc_url.clone(),
            from: self.from,
            poll_interval: self.poll_interval,
            receipt_timeout: self.receipt_timeout,
        }
    }

    /// Path of this network's deployment ledger.
    pub fn ledger_path(&self) -> PathBuf {
        DeploymentLedger::path(&self.outdata, &self.network)
    }
}
