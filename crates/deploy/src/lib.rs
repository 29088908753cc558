//! luv-deploy - Deployment library for the LuvNFT contract suite.
//!
//! This crate deploys the LuvNFT contracts as an ordered migration: libraries are
//! deployed and linked into their consumers, then the consumers are deployed with
//! their constructor arguments, one awaited step at a time.
//!
//! # Example
//!
//! ```no_run
//! use luv_deploy::{DryRunBackend, MigrationKind, Sequencer};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let deployer = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".parse()?;
//! let mut sequencer = Sequencer::new(DryRunBackend::new(deployer, 0));
//! let report = sequencer.run(&MigrationKind::LuvNftAuction.migration()).await?;
//! println!("LuvNFT will be deployed at {:?}", report.address(luv_deploy::Contract::LuvNft));
//! # Ok(())
//! # }
//! ```

pub mod abi;
mod artifact;
pub mod backend;
mod config;
mod contracts;
mod errors;
mod ledger;
pub mod migration;
pub mod rpc;
mod sequencer;

pub use artifact::{Artifact, ArtifactStore};
pub use backend::{
    DeploymentBackend, DeploymentRecord, DryRunBackend, RpcBackend, RpcBackendConfig,
};
pub use config::{
    CONFIG_FILENAME, DEFAULT_ARTIFACTS_DIR, DEFAULT_NETWORK, DEFAULT_RPC_URL, ENV_PREFIX,
    MigrateConfig,
};
pub use contracts::Contract;
pub use errors::SequenceError;
pub use ledger::{ContractEntry, DEPLOYMENTS_DIR, DeploymentLedger};
pub use migration::{ConstructorArg, DeployOptions, LUV_NFT_GAS_LIMIT, Migration, MigrationKind, Step};
pub use sequencer::{DeploymentReport, Sequencer};
