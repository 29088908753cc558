//! Ordering violations detected before a step reaches the backend.

use derive_more::{Display, Error};

use crate::Contract;

/// A step that would break the deployment ordering rules.
///
/// These are raised both by static validation of a [`crate::Migration`] and by the
/// [`crate::Sequencer`] right before issuing a step, so the offending call never
/// reaches the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum SequenceError {
    /// A constructor argument refers to a contract whose address is not confirmed yet.
    #[display("address of {contract} is referenced before its deployment was confirmed")]
    UnresolvedAddress { contract: Contract },
    /// A contract is deployed while one of its libraries is still unlinked.
    #[display("{consumer} requires {library} to be linked before it is deployed")]
    MissingLink {
        library: Contract,
        consumer: Contract,
    },
    /// A library is linked before it was deployed.
    #[display("{library} must be deployed before it can be linked")]
    LibraryNotDeployed { library: Contract },
    /// A contract is deployed twice, or linked into after its deployment.
    #[display("{contract} was already deployed in this run")]
    AlreadyDeployed { contract: Contract },
    /// A regular contract is used where a library is expected.
    #[display("{contract} is not a library")]
    NotALibrary { contract: Contract },
    /// A library is deployed through the contract path.
    #[display("{library} is a library and must be deployed as one")]
    LibraryDeployedAsContract { library: Contract },
    /// A library is linked into a contract that does not depend on it.
    #[display("{consumer} does not link against {library}")]
    UnexpectedLink {
        library: Contract,
        consumer: Contract,
    },
    /// An address is resolved for a contract never deployed in this run.
    #[display("{contract} has not been deployed in this run")]
    NotDeployed { contract: Contract },
}
