//! Compiled contract artifacts and library linking.
//!
//! Artifacts are the JSON files emitted by the contract build, one per contract,
//! named `<ArtifactName>.json`. Their creation bytecode may contain placeholders
//! for library addresses, in either of the two formats compilers emit:
//!
//! - `__IterableMapping_______________________`: the library name, padded with
//!   underscores to 40 characters.
//! - `__$<34 hex chars>$__`: a prefix of `keccak256("<source path>:<library name>")`.
//!
//! Linking replaces every placeholder for a library with its deployed address.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, keccak256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{Contract, abi};

/// Length of a library placeholder, which is also the length of a hex address.
const PLACEHOLDER_LEN: usize = 40;

/// A compiled contract artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Name of the contract in its source file.
    pub contract_name: String,
    /// Hex creation bytecode, possibly with unlinked library placeholders.
    pub bytecode: String,
    /// Path of the source file the contract was compiled from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
}

impl Artifact {
    /// Load the artifact of `contract` from a build directory.
    pub fn load(dir: &Path, contract: Contract) -> Result<Self> {
        let path = dir.join(format!("{}.json", contract.artifact_name()));
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;

        let artifact: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        if artifact.contract_name != contract.artifact_name() {
            anyhow::bail!(
                "Artifact {} declares contract {}, expected {}",
                path.display(),
                artifact.contract_name,
                contract.artifact_name()
            );
        }

        Ok(artifact)
    }

    /// Placeholders a library may appear as in a consumer's bytecode.
    fn placeholders(&self) -> Vec<String> {
        let mut placeholders = vec![legacy_placeholder(&self.contract_name)];
        if let Some(source_path) = &self.source_path {
            placeholders.push(hashed_placeholder(source_path, &self.contract_name));
        }
        placeholders
    }

    /// Replace every placeholder for `library` with `address`.
    ///
    /// Returns the number of substituted placeholders.
    pub fn link(&mut self, library: &Artifact, address: Address) -> usize {
        let address_hex = hex::encode(address.as_slice());
        let mut count = 0;

        for placeholder in library.placeholders() {
            count += self.bytecode.matches(placeholder.as_str()).count();
            self.bytecode = self.bytecode.replace(&placeholder, &address_hex);
        }

        count
    }

    /// Placeholders still present in the bytecode.
    pub fn unlinked_placeholders(&self) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        // Bytes, not chars: a malformed artifact may hold non-ASCII text.
        let mut rest = self.bytecode.as_bytes();

        while let Some(start) = rest.windows(2).position(|pair| pair == b"__") {
            let end = (start + PLACEHOLDER_LEN).min(rest.len());
            found.insert(String::from_utf8_lossy(&rest[start..end]).into_owned());
            rest = &rest[end..];
        }

        found
    }

    /// Creation code: the linked bytecode followed by the encoded constructor arguments.
    pub fn creation_code(&self, args: &[abi::DynSolValue]) -> Result<Vec<u8>> {
        let unlinked = self.unlinked_placeholders();
        if !unlinked.is_empty() {
            anyhow::bail!(
                "{} has unlinked libraries: {}",
                self.contract_name,
                unlinked
                    .iter()
                    .map(|p| p.trim_matches('_'))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        let mut code = hex::decode(self.bytecode.trim_start_matches("0x"))
            .with_context(|| format!("Invalid bytecode for {}", self.contract_name))?;

        if code.is_empty() {
            anyhow::bail!(
                "{} has empty bytecode (abstract contract or interface?)",
                self.contract_name
            );
        }

        code.extend(abi::encode_constructor_args(args)?);
        Ok(code)
    }
}

/// `__<name>` right-padded with underscores to 40 characters.
fn legacy_placeholder(name: &str) -> String {
    let truncated: String = name.chars().take(PLACEHOLDER_LEN - 4).collect();
    format!("__{truncated:_<width$}", width = PLACEHOLDER_LEN - 2)
}

/// `__$<hash prefix>$__` for `<source path>:<name>`.
fn hashed_placeholder(source_path: &str, name: &str) -> String {
    let hash = keccak256(format!("{source_path}:{name}").as_bytes());
    format!("__${}$__", &hex::encode(hash)[..PLACEHOLDER_LEN - 6])
}

/// Artifacts of one build directory, loaded on first use and linked in place.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    dir: Option<PathBuf>,
    artifacts: BTreeMap<Contract, Artifact>,
}

impl ArtifactStore {
    /// A store reading artifacts from `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            artifacts: BTreeMap::new(),
        }
    }

    /// A store holding only the given artifacts.
    pub fn from_artifacts(artifacts: impl IntoIterator<Item = (Contract, Artifact)>) -> Self {
        Self {
            dir: None,
            artifacts: artifacts.into_iter().collect(),
        }
    }

    /// The artifact of `contract`, loading it if needed.
    pub fn artifact(&mut self, contract: Contract) -> Result<&mut Artifact> {
        if !self.artifacts.contains_key(&contract) {
            let dir = self
                .dir
                .as_deref()
                .with_context(|| format!("No artifact available for {contract}"))?;
            let artifact = Artifact::load(dir, contract)?;
            self.artifacts.insert(contract, artifact);
        }

        self.artifacts
            .get_mut(&contract)
            .with_context(|| format!("No artifact available for {contract}"))
    }

    /// Link a deployed library into a consumer's bytecode.
    pub fn link(&mut self, library: Contract, address: Address, consumer: Contract) -> Result<()> {
        let library_artifact = self.artifact(library)?.clone();
        let substituted = self.artifact(consumer)?.link(&library_artifact, address);

        if substituted == 0 {
            tracing::warn!(
                library = %library,
                consumer = %consumer,
                "Consumer bytecode does not reference the library"
            );
        } else {
            tracing::debug!(
                library = %library,
                consumer = %consumer,
                substituted,
                "Substituted library placeholders"
            );
        }

        Ok(())
    }

    /// Creation code of `contract` with encoded constructor arguments.
    pub fn creation_code(&mut self, contract: Contract, args: &[abi::DynSolValue]) -> Result<Vec<u8>> {
        self.artifact(contract)?.creation_code(args)
    }
}
