//! Backend deploying through an Ethereum JSON-RPC node.

use std::time::Duration;

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{DeploymentBackend, DeploymentRecord};
use crate::{
    ArtifactStore, Contract, DeployOptions,
    abi::DynSolValue,
    rpc::{DEFAULT_REQUEST_TIMEOUT, RpcClient, TransactionReceipt},
};

/// Default interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default time to wait for a creation transaction to be mined.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration of the JSON-RPC backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcBackendConfig {
    /// The node's HTTP endpoint.
    pub rpc_url: Url,
    /// The unlocked account sending creation transactions. Defaults to the node's first account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Interval between receipt polls.
    #[serde(default = "default_poll_interval", with = "duration_secs")]
    pub poll_interval: Duration,
    /// Maximum time to wait for a receipt.
    #[serde(default = "default_receipt_timeout", with = "duration_secs")]
    pub receipt_timeout: Duration,
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_receipt_timeout() -> Duration {
    DEFAULT_RECEIPT_TIMEOUT
}

/// Durations as whole seconds in config files.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

impl RpcBackendConfig {
    /// Configuration for `rpc_url` with default timings.
    pub fn new(rpc_url: Url) -> Self {
        Self {
            rpc_url,
            from: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }
}

/// Receipt not available yet.
#[derive(Debug, Display, Error)]
#[display("transaction {hash} is still pending")]
struct ReceiptPending {
    hash: B256,
}

/// Deploys contracts with `eth_sendTransaction` from an unlocked account.
pub struct RpcBackend {
    client: RpcClient,
    from: Address,
    artifacts: ArtifactStore,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

impl RpcBackend {
    /// Connect to the node and pick the sender account.
    pub async fn connect(config: RpcBackendConfig, artifacts: ArtifactStore) -> Result<Self> {
        let client = RpcClient::new(config.rpc_url.clone(), DEFAULT_REQUEST_TIMEOUT)?;

        let chain_id = client
            .chain_id()
            .await
            .with_context(|| format!("Failed to reach node at {}", config.rpc_url))?;

        let from = match config.from {
            Some(from) => from,
            None => *client
                .accounts()
                .await?
                .first()
                .context("Node has no unlocked accounts and no sender was configured")?,
        };

        tracing::info!(
            rpc_url = %config.rpc_url,
            chain_id,
            from = %from,
            "Connected to deployment node"
        );

        Ok(Self {
            client,
            from,
            artifacts,
            poll_interval: config.poll_interval,
            receipt_timeout: config.receipt_timeout,
        })
    }

    /// The sender account.
    pub fn sender(&self) -> Address {
        self.from
    }

    /// Poll for the receipt of `hash` until it is mined or the timeout elapses.
    async fn wait_for_receipt(&self, hash: B256) -> Result<TransactionReceipt> {
        let max_polls = (self.receipt_timeout.as_millis() / self.poll_interval.as_millis().max(1))
            .max(1) as usize;
        let client = &self.client;

        (|| async move {
            client
                .transaction_receipt(hash)
                .await?
                .ok_or_else(|| anyhow::Error::new(ReceiptPending { hash }))
        })
        .retry(
            ConstantBuilder::default()
                .with_delay(self.poll_interval)
                .with_max_times(max_polls),
        )
        .when(|e| e.is::<ReceiptPending>())
        .notify(|_, _| tracing::trace!(tx_hash = %hash, "Waiting for receipt..."))
        .await
        .with_context(|| {
            format!(
                "No receipt for {} within {}s",
                hash,
                self.receipt_timeout.as_secs()
            )
        })
    }

    async fn send_creation(
        &mut self,
        contract: Contract,
        args: &[DynSolValue],
        options: DeployOptions,
    ) -> Result<DeploymentRecord> {
        let code = self.artifacts.creation_code(contract, args)?;

        let hash = self
            .client
            .send_creation(self.from, &code, options.gas)
            .await
            .with_context(|| format!("Failed to send creation transaction for {contract}"))?;

        tracing::info!(contract = %contract, tx_hash = %hash, "Creation transaction sent");

        let receipt = self.wait_for_receipt(hash).await?;
        if !receipt.succeeded() {
            anyhow::bail!(
                "Deployment of {} reverted in transaction {} (block {})",
                contract,
                hash,
                receipt.block_number
            );
        }

        let address = receipt
            .contract_address
            .with_context(|| format!("Receipt of {hash} has no contract address"))?;

        Ok(DeploymentRecord {
            contract,
            address,
            transaction_hash: Some(receipt.transaction_hash),
            block_number: Some(receipt.block_number),
        })
    }
}

impl DeploymentBackend for RpcBackend {
    async fn deploy_library(&mut self, library: Contract) -> Result<DeploymentRecord> {
        self.send_creation(library, &[], DeployOptions::default())
            .await
    }

    async fn link_library(&mut self, library: &DeploymentRecord, consumer: Contract) -> Result<()> {
        self.artifacts
            .link(library.contract, library.address, consumer)
    }

    async fn deploy_contract(
        &mut self,
        contract: Contract,
        args: &[DynSolValue],
        options: DeployOptions,
    ) -> Result<DeploymentRecord> {
        self.send_creation(contract, args, options).await
    }

    async fn resolve_address(&mut self, record: &DeploymentRecord) -> Result<DeploymentRecord> {
        let code = self.client.code_at(record.address).await?;
        if code.is_empty() {
            anyhow::bail!(
                "No code at {} for {}; the deployment is not final",
                record.address,
                record.contract
            );
        }

        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_toml() {
        let config: RpcBackendConfig = toml::from_str(r#"rpc_url = "http://localhost:8545/""#).unwrap();

        assert_eq!(config, RpcBackendConfig::new("http://localhost:8545/".parse().unwrap()));
    }

    #[test]
    fn test_config_durations_in_seconds() {
        let config: RpcBackendConfig = toml::from_str(
            r#"
            rpc_url = "http://localhost:7545/"
            from = "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1"
            poll_interval = 3
            receipt_timeout = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.receipt_timeout, Duration::from_secs(60));
        assert!(config.from.is_some());
    }
}
