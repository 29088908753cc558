//! Sequential execution of a migration against a deployment backend.

use std::collections::{BTreeMap, BTreeSet};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    ConstructorArg, Contract, DeploymentBackend, DeploymentRecord, Migration, SequenceError, Step,
    abi::DynSolValue,
};

/// Ordering state accumulated while walking a migration.
///
/// Shared by static validation and by the sequencer, so both enforce the same rules.
#[derive(Debug, Default)]
pub(crate) struct OrderTracker {
    deployed: BTreeSet<Contract>,
    confirmed: BTreeSet<Contract>,
    linked: BTreeMap<Contract, BTreeSet<Contract>>,
}

impl OrderTracker {
    /// Check that `step` may run given everything recorded so far.
    pub(crate) fn check(&self, step: &Step) -> Result<(), SequenceError> {
        match step {
            Step::DeployLibrary { contract } => {
                if !contract.is_library() {
                    return Err(SequenceError::NotALibrary {
                        contract: *contract,
                    });
                }
                self.check_not_deployed(*contract)
            }
            Step::Link { library, consumer } => {
                if !library.is_library() {
                    return Err(SequenceError::NotALibrary { contract: *library });
                }
                if !self.deployed.contains(library) {
                    return Err(SequenceError::LibraryNotDeployed { library: *library });
                }
                if !consumer.libraries().contains(library) {
                    return Err(SequenceError::UnexpectedLink {
                        library: *library,
                        consumer: *consumer,
                    });
                }
                self.check_not_deployed(*consumer)
            }
            Step::Deploy { contract, args, .. } => {
                if contract.is_library() {
                    return Err(SequenceError::LibraryDeployedAsContract {
                        library: *contract,
                    });
                }
                self.check_not_deployed(*contract)?;

                let linked = self.linked.get(contract);
                if let Some(library) = contract
                    .libraries()
                    .iter()
                    .copied()
                    .find(|library| !linked.is_some_and(|l| l.contains(library)))
                {
                    return Err(SequenceError::MissingLink {
                        library,
                        consumer: *contract,
                    });
                }

                let unresolved = args.iter().find_map(|arg| match arg {
                    ConstructorArg::AddressOf(referenced) if !self.confirmed.contains(referenced) => {
                        Some(*referenced)
                    }
                    _ => None,
                });
                if let Some(contract) = unresolved {
                    return Err(SequenceError::UnresolvedAddress { contract });
                }

                Ok(())
            }
            Step::ResolveAddress { contract } => {
                if !self.deployed.contains(contract) {
                    return Err(SequenceError::NotDeployed {
                        contract: *contract,
                    });
                }
                Ok(())
            }
        }
    }

    /// Record the effect of a completed step.
    pub(crate) fn record(&mut self, step: &Step) {
        match step {
            Step::DeployLibrary { contract } | Step::Deploy { contract, .. } => {
                self.deployed.insert(*contract);
            }
            Step::Link { library, consumer } => {
                self.linked.entry(*consumer).or_default().insert(*library);
            }
            Step::ResolveAddress { contract } => {
                self.confirmed.insert(*contract);
            }
        }
    }

    fn check_not_deployed(&self, contract: Contract) -> Result<(), SequenceError> {
        if self.deployed.contains(&contract) {
            return Err(SequenceError::AlreadyDeployed { contract });
        }
        Ok(())
    }
}

/// Addresses produced by a migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReport {
    /// Name of the executed migration.
    pub migration: String,
    /// One record per deployed contract, in deployment order.
    ///
    /// Records of resolved contracts are replaced by the backend's confirmed record.
    pub records: Vec<DeploymentRecord>,
}

impl DeploymentReport {
    /// The record of a deployed contract.
    pub fn record(&self, contract: Contract) -> Option<&DeploymentRecord> {
        self.records.iter().find(|r| r.contract == contract)
    }

    /// The address of a deployed contract.
    pub fn address(&self, contract: Contract) -> Option<Address> {
        self.record(contract).map(|r| r.address)
    }
}

/// Executes migrations one step at a time against a backend.
///
/// Steps run strictly in order. Each step is awaited before the next is issued,
/// and the first failure aborts the run: nothing is retried or rolled back.
pub struct Sequencer<B> {
    backend: B,
}

impl<B: DeploymentBackend> Sequencer<B> {
    /// Create a sequencer driving `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Consume the sequencer, returning the backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Run every step of `migration`.
    ///
    /// Ordering violations are reported as [`SequenceError`]s before the offending
    /// step reaches the backend. Errors carry the index and description of the step.
    pub async fn run(&mut self, migration: &Migration) -> Result<DeploymentReport> {
        tracing::info!(
            migration = %migration.name,
            steps = migration.steps.len(),
            "Starting migration"
        );

        let mut tracker = OrderTracker::default();
        let mut report = DeploymentReport {
            migration: migration.name.clone(),
            records: Vec::new(),
        };

        for (index, step) in migration.steps.iter().enumerate() {
            tracing::debug!(index, %step, "Executing step");

            self.execute(step, &tracker, &mut report)
                .await
                .with_context(|| format!("step {index} ({step}) failed"))?;

            tracker.record(step);
        }

        tracing::info!(
            migration = %migration.name,
            deployed = report.records.len(),
            "Migration complete"
        );

        Ok(report)
    }

    async fn execute(
        &mut self,
        step: &Step,
        tracker: &OrderTracker,
        report: &mut DeploymentReport,
    ) -> Result<()> {
        tracker.check(step)?;

        match step {
            Step::DeployLibrary { contract } => {
                let record = self.backend.deploy_library(*contract).await?;
                tracing::info!(library = %contract, address = %record.address, "Library deployed");
                report.records.push(record);
            }
            Step::Link { library, consumer } => {
                let library_record = report
                    .record(*library)
                    .context("Library record missing from report")?;
                self.backend.link_library(library_record, *consumer).await?;
                tracing::info!(library = %library, consumer = %consumer, "Library linked");
            }
            Step::Deploy {
                contract,
                args,
                options,
            } => {
                let values = resolve_args(args, report)?;
                let record = self
                    .backend
                    .deploy_contract(*contract, &values, *options)
                    .await?;
                tracing::info!(
                    contract = %contract,
                    address = %record.address,
                    gas = ?options.gas,
                    "Contract deployed"
                );
                report.records.push(record);
            }
            Step::ResolveAddress { contract } => {
                let position = report
                    .records
                    .iter()
                    .position(|r| r.contract == *contract)
                    .context("Deployment record missing from report")?;

                let confirmed = self.backend.resolve_address(&report.records[position]).await?;
                if confirmed.address != report.records[position].address {
                    anyhow::bail!(
                        "Backend confirmed {} at {} but it was deployed at {}",
                        contract,
                        confirmed.address,
                        report.records[position].address
                    );
                }

                tracing::info!(contract = %contract, address = %confirmed.address, "Address resolved");
                report.records[position] = confirmed;
            }
        }

        Ok(())
    }
}

/// Turn constructor arguments into ABI values, substituting confirmed addresses.
fn resolve_args(args: &[ConstructorArg], report: &DeploymentReport) -> Result<Vec<DynSolValue>> {
    args.iter()
        .map(|arg| -> Result<DynSolValue> {
            Ok(match arg {
                ConstructorArg::Address(address) => DynSolValue::Address(*address),
                ConstructorArg::AddressOf(contract) => DynSolValue::Address(
                    report
                        .address(*contract)
                        .ok_or(SequenceError::UnresolvedAddress {
                            contract: *contract,
                        })?,
                ),
                ConstructorArg::Uint(value) => DynSolValue::Uint(*value, 256),
                ConstructorArg::Bool(value) => DynSolValue::Bool(*value),
                ConstructorArg::String(value) => DynSolValue::String(value.clone()),
            })
        })
        .collect()
}
