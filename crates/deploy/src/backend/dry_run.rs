//! Offline backend predicting deployment addresses.

use alloy_core::primitives::Address;
use anyhow::Result;

use super::{DeploymentBackend, DeploymentRecord};
use crate::{ArtifactStore, Contract, DeployOptions, abi::DynSolValue};

/// Simulates a migration without sending transactions.
///
/// Addresses follow the `CREATE` rule for `deployer`, starting at `nonce` and
/// incrementing once per deployment, so a dry run against a fresh account matches
/// what a real run will produce. When artifacts are attached, bytecode is linked
/// and encoded exactly as for a real deployment, which surfaces missing links and
/// bad artifacts offline.
#[derive(Debug, Clone)]
pub struct DryRunBackend {
    deployer: Address,
    nonce: u64,
    artifacts: Option<ArtifactStore>,
}

impl DryRunBackend {
    /// Simulate deployments from `deployer`, whose next nonce is `nonce`.
    pub fn new(deployer: Address, nonce: u64) -> Self {
        Self {
            deployer,
            nonce,
            artifacts: None,
        }
    }

    /// Link and encode against real artifacts.
    pub fn with_artifacts(mut self, artifacts: ArtifactStore) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// The nonce the next deployment will use.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    fn create(&mut self, contract: Contract, args: &[DynSolValue]) -> Result<DeploymentRecord> {
        if let Some(artifacts) = self.artifacts.as_mut() {
            let code = artifacts.creation_code(contract, args)?;
            tracing::debug!(contract = %contract, bytes = code.len(), "Encoded creation code");
        }

        let address = self.deployer.create(self.nonce);
        self.nonce += 1;

        Ok(DeploymentRecord::new(contract, address))
    }
}

impl DeploymentBackend for DryRunBackend {
    async fn deploy_library(&mut self, library: Contract) -> Result<DeploymentRecord> {
        self.create(library, &[])
    }

    async fn link_library(&mut self, library: &DeploymentRecord, consumer: Contract) -> Result<()> {
        if let Some(artifacts) = self.artifacts.as_mut() {
            artifacts.link(library.contract, library.address, consumer)?;
        }
        Ok(())
    }

    async fn deploy_contract(
        &mut self,
        contract: Contract,
        args: &[DynSolValue],
        _options: DeployOptions,
    ) -> Result<DeploymentRecord> {
        self.create(contract, args)
    }

    async fn resolve_address(&mut self, record: &DeploymentRecord) -> Result<DeploymentRecord> {
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::address;

    use super::*;
    use crate::{Sequencer, migration};

    const ANVIL_DEPLOYER: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");

    #[tokio::test]
    async fn test_addresses_follow_create_nonces() {
        let mut sequencer = Sequencer::new(DryRunBackend::new(ANVIL_DEPLOYER, 0));
        let report = sequencer.run(&migration::luv_nft()).await.unwrap();

        assert_eq!(
            report.address(Contract::IterableMapping),
            Some(address!("5fbdb2315678afecb367f032d93f642f64180aa3"))
        );
        assert_eq!(
            report.address(Contract::NftDescriptor),
            Some(address!("e7f1725e7734ce288f8367e1bb143e90bb3f0512"))
        );
        assert_eq!(sequencer.backend().nonce(), 3);
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_dry_run() {
        let backend =
            DryRunBackend::new(ANVIL_DEPLOYER, 0).with_artifacts(ArtifactStore::default());
        let mut sequencer = Sequencer::new(backend);

        let err = sequencer.run(&migration::luv_nft()).await.unwrap_err();
        assert!(err.to_string().contains("step 0"), "{err}");
        assert_eq!(sequencer.backend().nonce(), 0);
    }
}
