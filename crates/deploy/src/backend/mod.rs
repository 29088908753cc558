//! Deployment backends.
//!
//! A backend performs the individual operations of a migration: deploying
//! libraries and contracts, linking library addresses into bytecode, and
//! confirming deployed addresses. The [`crate::Sequencer`] decides the order.

use std::future::Future;

use alloy_core::primitives::{Address, B256};
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{Contract, DeployOptions, abi::DynSolValue};

mod dry_run;
pub(crate) mod rpc;

pub use dry_run::DryRunBackend;
pub use rpc::{RpcBackend, RpcBackendConfig};

/// Outcome of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// The deployed contract.
    pub contract: Contract,
    /// Address of the new contract instance.
    pub address: Address,
    /// Hash of the creation transaction, when the backend sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    /// Block the creation transaction was mined in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

impl DeploymentRecord {
    /// A record with only an address, as produced by backends that do not send transactions.
    pub fn new(contract: Contract, address: Address) -> Self {
        Self {
            contract,
            address,
            transaction_hash: None,
            block_number: None,
        }
    }
}

/// The external collaborator executing deployment steps.
///
/// Every operation completes only once the backend considers it done; the
/// sequencer awaits each call before issuing the next one.
pub trait DeploymentBackend: Send {
    /// Deploy a standalone library. Libraries take no constructor arguments.
    fn deploy_library(
        &mut self,
        library: Contract,
    ) -> impl Future<Output = Result<DeploymentRecord>> + Send;

    /// Substitute a deployed library's address into a not-yet-deployed consumer's bytecode.
    fn link_library(
        &mut self,
        library: &DeploymentRecord,
        consumer: Contract,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Deploy a contract with resolved constructor arguments.
    fn deploy_contract(
        &mut self,
        contract: Contract,
        args: &[DynSolValue],
        options: DeployOptions,
    ) -> impl Future<Output = Result<DeploymentRecord>> + Send;

    /// Confirm that a previous deployment is final and return its record.
    fn resolve_address(
        &mut self,
        record: &DeploymentRecord,
    ) -> impl Future<Output = Result<DeploymentRecord>> + Send;
}
