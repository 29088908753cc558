//! Per-network record of completed migrations.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{Contract, DeploymentReport, Migration};

/// Directory, relative to the output directory, holding one ledger per network.
pub const DEPLOYMENTS_DIR: &str = "deployments";

/// Where and how a contract was deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEntry {
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

/// The outcome of a migration on one network.
///
/// Saved as `{outdata}/deployments/{network}.json` after a successful run. The
/// fingerprint identifies the migration steps, so an unchanged migration is not
/// executed twice against the same network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentLedger {
    /// Network name the migration ran against.
    pub network: String,
    /// Name of the migration.
    pub migration: String,
    /// Fingerprint of the migration steps.
    pub fingerprint: String,
    /// Unix timestamp of the run.
    pub deployed_at: i64,
    /// Version of the tool that performed the run.
    pub tool_version: String,
    /// Deployed contracts by artifact name.
    pub contracts: BTreeMap<Contract, ContractEntry>,
}

impl DeploymentLedger {
    /// Build a ledger from a completed run.
    pub fn from_report(
        network: impl Into<String>,
        migration: &Migration,
        report: &DeploymentReport,
    ) -> Result<Self> {
        let contracts = report
            .records
            .iter()
            .map(|record| {
                (
                    record.contract,
                    ContractEntry {
                        address: record.address,
                        transaction_hash: record.transaction_hash,
                        block_number: record.block_number,
                    },
                )
            })
            .collect();

        Ok(Self {
            network: network.into(),
            migration: migration.name.clone(),
            fingerprint: migration.fingerprint()?,
            deployed_at: chrono::Utc::now().timestamp(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            contracts,
        })
    }

    /// Path of the ledger for `network` under `outdata`.
    pub fn path(outdata: &Path, network: &str) -> PathBuf {
        outdata.join(DEPLOYMENTS_DIR).join(format!("{network}.json"))
    }

    /// Whether this ledger was produced by the same steps as `migration`.
    pub fn matches(&self, migration: &Migration) -> Result<bool> {
        Ok(self.fingerprint == migration.fingerprint()?)
    }

    /// Whether `migrate` should leave this network alone.
    ///
    /// True when the recorded run used the same steps as `migration`, unless
    /// `reset` forces a redeploy.
    pub fn should_skip(&self, migration: &Migration, reset: bool) -> Result<bool> {
        Ok(!reset && self.matches(migration)?)
    }

    /// Deployed address of `contract`.
    pub fn address(&self, contract: Contract) -> Option<Address> {
        self.contracts.get(&contract).map(|entry| entry.address)
    }

    /// Save the ledger as pretty JSON, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize deployment ledger")?;

        std::fs::write(path, json)
            .with_context(|| format!("Failed to write deployment ledger to {}", path.display()))?;

        tracing::info!(path = %path.display(), "Deployment ledger saved");
        Ok(())
    }

    /// Load a ledger file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Deployment ledger does not exist: {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read deployment ledger from {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse deployment ledger JSON")
    }

    /// Load the ledger of `network`, if the migration already ran there.
    pub fn load_for_network(outdata: &Path, network: &str) -> Result<Option<Self>> {
        let path = Self::path(outdata, network);
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from_file(&path).map(Some)
    }
}
