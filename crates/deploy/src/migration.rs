//! Ordered deployment steps and the built-in LuvNFT migrations.
//!
//! A [`Migration`] is an explicit list of [`Step`]s. Order is data: the
//! [`crate::Sequencer`] interprets the list top to bottom, and
//! [`Migration::validate`] can check the ordering rules without a backend.
//!
//! # Example
//!
//! ```
//! use luv_deploy::{Contract, DeployOptions, Migration};
//!
//! let migration = Migration::new("libraries")
//!     .deploy_library(Contract::IterableMapping)
//!     .link(Contract::IterableMapping, Contract::LuvNft)
//!     .deploy_library(Contract::NftDescriptor)
//!     .link(Contract::NftDescriptor, Contract::LuvNft)
//!     .deploy(Contract::LuvNft, vec![], DeployOptions::with_gas(10_000_000))
//!     .resolve(Contract::LuvNft);
//!
//! assert!(migration.validate().is_ok());
//! ```

use alloy_core::primitives::{Address, U256};
use anyhow::{Context, Result};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Contract, sequencer::OrderTracker};

/// Gas ceiling used for the LuvNFT deployment, which exceeds the default block estimate.
pub const LUV_NFT_GAS_LIMIT: u64 = 10_000_000;

/// A constructor argument for a contract deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructorArg {
    /// A literal address.
    Address(Address),
    /// The confirmed address of a contract deployed earlier in the same run.
    AddressOf(Contract),
    /// An unsigned 256-bit integer.
    Uint(U256),
    /// A boolean.
    Bool(bool),
    /// A UTF-8 string.
    String(String),
}

/// Transaction options attached to a deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployOptions {
    /// Explicit gas ceiling. When absent, the backend estimates it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
}

impl DeployOptions {
    /// Options with an explicit gas ceiling.
    pub fn with_gas(gas: u64) -> Self {
        Self { gas: Some(gas) }
    }
}

/// A single deployment step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Deploy a standalone library.
    #[display("deploy library {contract}")]
    DeployLibrary { contract: Contract },
    /// Substitute a deployed library's address into a consumer's bytecode.
    #[display("link {library} into {consumer}")]
    Link {
        library: Contract,
        consumer: Contract,
    },
    /// Deploy a contract with constructor arguments.
    #[display("deploy {contract}")]
    Deploy {
        contract: Contract,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<ConstructorArg>,
        #[serde(default)]
        options: DeployOptions,
    },
    /// Wait for a deployed contract to be confirmed and make its address referenceable.
    #[display("resolve {contract}")]
    ResolveAddress { contract: Contract },
}

/// An ordered list of deployment steps, executed once per network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    /// Name recorded in the deployment ledger.
    pub name: String,
    /// Steps, in execution order.
    pub steps: Vec<Step>,
}

impl Migration {
    /// Create an empty migration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a library deployment.
    pub fn deploy_library(mut self, contract: Contract) -> Self {
        self.steps.push(Step::DeployLibrary { contract });
        self
    }

    /// Append a link directive.
    pub fn link(mut self, library: Contract, consumer: Contract) -> Self {
        self.steps.push(Step::Link { library, consumer });
        self
    }

    /// Append a contract deployment.
    pub fn deploy(
        mut self,
        contract: Contract,
        args: Vec<ConstructorArg>,
        options: DeployOptions,
    ) -> Self {
        self.steps.push(Step::Deploy {
            contract,
            args,
            options,
        });
        self
    }

    /// Append an address resolution.
    pub fn resolve(mut self, contract: Contract) -> Self {
        self.steps.push(Step::ResolveAddress { contract });
        self
    }

    /// Check the ordering rules without touching a backend.
    ///
    /// Returns the first violation, wrapped with the index of the offending step.
    /// The inner error is a [`crate::SequenceError`].
    pub fn validate(&self) -> Result<()> {
        let mut tracker = OrderTracker::default();

        for (index, step) in self.steps.iter().enumerate() {
            tracker
                .check(step)
                .with_context(|| format!("step {index} ({step}) is out of order"))?;
            tracker.record(step);
        }

        Ok(())
    }

    /// Deterministic SHA-256 fingerprint of the steps.
    ///
    /// Two migrations with the same steps share a fingerprint regardless of their name.
    pub fn fingerprint(&self) -> Result<String> {
        let json =
            serde_json::to_string(&self.steps).context("Failed to serialize migration steps")?;

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());

        Ok(hex::encode(hasher.finalize()))
    }

    /// Contracts deployed by this migration, in deployment order.
    pub fn deployed_contracts(&self) -> Vec<Contract> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::DeployLibrary { contract } | Step::Deploy { contract, .. } => Some(*contract),
                _ => None,
            })
            .collect()
    }
}

/// The built-in migrations.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MigrationKind {
    /// Libraries and the LuvNFT token.
    #[default]
    LuvNft,
    /// Everything in [`MigrationKind::LuvNft`], plus the auction house.
    LuvNftAuction,
}

impl MigrationKind {
    /// Build the migration's steps.
    pub fn migration(&self) -> Migration {
        match self {
            MigrationKind::LuvNft => luv_nft(),
            MigrationKind::LuvNftAuction => luv_nft_auction(),
        }
    }
}

/// Deploy both libraries, link them into LuvNFT, then deploy and confirm LuvNFT.
pub fn luv_nft() -> Migration {
    Migration::new(MigrationKind::LuvNft.to_string())
        .deploy_library(Contract::IterableMapping)
        .link(Contract::IterableMapping, Contract::LuvNft)
        .deploy_library(Contract::NftDescriptor)
        .link(Contract::NftDescriptor, Contract::LuvNft)
        .deploy(
            Contract::LuvNft,
            vec![],
            DeployOptions::with_gas(LUV_NFT_GAS_LIMIT),
        )
        .resolve(Contract::LuvNft)
}

/// The LuvNFT migration followed by the auction house, constructed with the token address.
pub fn luv_nft_auction() -> Migration {
    let mut migration = luv_nft()
        .deploy(
            Contract::NftAuction,
            vec![ConstructorArg::AddressOf(Contract::LuvNft)],
            DeployOptions::default(),
        )
        .resolve(Contract::NftAuction);
    migration.name = MigrationKind::LuvNftAuction.to_string();
    migration
}
