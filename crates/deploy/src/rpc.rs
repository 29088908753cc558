//! Ethereum JSON-RPC client used by the RPC backend.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

/// Default timeout for a single RPC request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Deserialize a u64 from a hex quantity (with 0x prefix).
fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(serde::de::Error::custom)
}

/// The fields of a transaction receipt the deployer cares about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    /// Hash of the mined transaction.
    pub transaction_hash: B256,
    /// Block the transaction was included in.
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    pub block_number: u64,
    /// `1` on success, `0` when execution reverted.
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    pub status: u64,
    /// Address of the created contract. Absent for calls and reverted creations.
    #[serde(default)]
    pub contract_address: Option<Address>,
}

impl TransactionReceipt {
    /// Whether the transaction executed without reverting.
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}

/// A JSON-RPC client bound to one endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    url: Url,
}

impl RpcClient {
    /// Create a client for `url` with the given per-request timeout.
    pub fn new(url: Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, url })
    }

    /// The endpoint this client talks to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Make a JSON-RPC call and deserialize the result.
    ///
    /// # Arguments
    /// * `method` - The RPC method name
    /// * `params` - The method parameters
    ///
    /// # Returns
    /// The deserialized result, or an error if the request failed or returned an error response.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> anyhow::Result<T> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?;

        let result: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(error) = result.get("error") {
            anyhow::bail!(
                "RPC error from {}: {}",
                method,
                error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown")
            );
        }

        let result_value = result
            .get("result")
            .with_context(|| format!("No result in {} response", method))?
            .clone();

        serde_json::from_value(result_value)
            .with_context(|| format!("Failed to deserialize {} result", method))
    }

    /// Chain ID of the connected node.
    pub async fn chain_id(&self) -> anyhow::Result<u64> {
        let hex: String = self.call("eth_chainId", vec![]).await?;
        u64::from_str_radix(hex.trim_start_matches("0x"), 16)
            .with_context(|| format!("Invalid chain id: {}", hex))
    }

    /// Accounts unlocked on the node.
    pub async fn accounts(&self) -> anyhow::Result<Vec<Address>> {
        self.call("eth_accounts", vec![]).await
    }

    /// Send a contract creation transaction from an unlocked account.
    ///
    /// # Arguments
    /// * `from` - The unlocked sender account
    /// * `data` - Creation code: linked bytecode followed by the encoded constructor arguments
    /// * `gas` - Explicit gas ceiling; the node estimates it when `None`
    ///
    /// # Returns
    /// The transaction hash. The transaction may still be pending.
    pub async fn send_creation(
        &self,
        from: Address,
        data: &[u8],
        gas: Option<u64>,
    ) -> anyhow::Result<B256> {
        let mut tx = serde_json::json!({
            "from": from,
            "data": format!("0x{}", hex::encode(data)),
        });
        if let Some(gas) = gas {
            tx["gas"] = Value::String(format!("0x{:x}", gas));
        }

        self.call("eth_sendTransaction", vec![tx]).await
    }

    /// Receipt of a transaction, or `None` while it is pending.
    pub async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> anyhow::Result<Option<TransactionReceipt>> {
        self.call("eth_getTransactionReceipt", vec![serde_json::json!(hash)])
            .await
    }

    /// Runtime code stored at `address` in the latest block.
    pub async fn code_at(&self, address: Address) -> anyhow::Result<Bytes> {
        self.call(
            "eth_getCode",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }
}
