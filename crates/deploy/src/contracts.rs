//! Catalogue of the contracts deployed by the LuvNFT migrations.

use serde::{Deserialize, Serialize};

/// A compiled contract of the LuvNFT suite.
///
/// Each variant maps to exactly one artifact in the build directory, so lookups
/// never go through free-form strings once the migration is built.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Contract {
    /// Iterable key/value mapping library used by the token contract.
    #[serde(rename = "IterableMapping")]
    #[strum(to_string = "IterableMapping", serialize = "iterable-mapping")]
    IterableMapping,
    /// On-chain token URI renderer library.
    #[serde(rename = "NFTDescriptor")]
    #[strum(to_string = "NFTDescriptor", serialize = "nft-descriptor")]
    NftDescriptor,
    /// The LuvNFT token.
    #[serde(rename = "LuvNFT")]
    #[strum(to_string = "LuvNFT", serialize = "luv-nft")]
    LuvNft,
    /// Auction house for LuvNFT tokens.
    #[serde(rename = "NFTAuction")]
    #[strum(to_string = "NFTAuction", serialize = "nft-auction")]
    NftAuction,
}

impl Contract {
    /// The artifact name, as emitted by the compiler.
    pub fn artifact_name(&self) -> &'static str {
        match self {
            Contract::IterableMapping => "IterableMapping",
            Contract::NftDescriptor => "NFTDescriptor",
            Contract::LuvNft => "LuvNFT",
            Contract::NftAuction => "NFTAuction",
        }
    }

    /// Whether this contract is a linkable library rather than a regular contract.
    pub fn is_library(&self) -> bool {
        matches!(self, Contract::IterableMapping | Contract::NftDescriptor)
    }

    /// Libraries that must be linked into this contract's bytecode before it is deployed.
    pub fn libraries(&self) -> &'static [Contract] {
        match self {
            Contract::LuvNft => &[Contract::IterableMapping, Contract::NftDescriptor],
            Contract::IterableMapping | Contract::NftDescriptor | Contract::NftAuction => &[],
        }
    }
}
