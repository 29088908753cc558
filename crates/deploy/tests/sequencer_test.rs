//! Ordering guarantees of the sequencer, checked against a backend that records every call.

use alloy_core::primitives::Address;
use anyhow::Result;
use luv_deploy::{
    ConstructorArg, Contract, DeployOptions, DeploymentBackend, DeploymentRecord, LUV_NFT_GAS_LIMIT,
    Migration, MigrationKind, SequenceError, Sequencer, abi::DynSolValue, migration,
};
use strum::IntoEnumIterator;

/// A backend call, as observed by the backend.
#[derive(Debug, Clone, PartialEq)]
enum Call {
    DeployLibrary(Contract),
    Link {
        library: Contract,
        consumer: Contract,
    },
    Deploy {
        contract: Contract,
        args: Vec<DynSolValue>,
        gas: Option<u64>,
    },
    Resolve(Contract),
}

/// Records calls and hands out sequential addresses. Optionally rejects the n-th call.
#[derive(Debug, Default)]
struct RecordingBackend {
    calls: Vec<Call>,
    fail_at: Option<usize>,
    misreport_resolve: bool,
}

impl RecordingBackend {
    fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::default()
        }
    }

    fn push(&mut self, call: Call) -> Result<()> {
        self.calls.push(call);
        if self.fail_at == Some(self.calls.len() - 1) {
            anyhow::bail!("backend rejected call {}", self.calls.len() - 1);
        }
        Ok(())
    }

    fn next_address(&self) -> Address {
        Address::repeat_byte(self.calls.len() as u8)
    }

    fn position(&self, wanted: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.iter().position(wanted)
    }
}

impl DeploymentBackend for RecordingBackend {
    async fn deploy_library(&mut self, library: Contract) -> Result<DeploymentRecord> {
        self.push(Call::DeployLibrary(library))?;
        Ok(DeploymentRecord::new(library, self.next_address()))
    }

    async fn link_library(&mut self, library: &DeploymentRecord, consumer: Contract) -> Result<()> {
        self.push(Call::Link {
            library: library.contract,
            consumer,
        })
    }

    async fn deploy_contract(
        &mut self,
        contract: Contract,
        args: &[DynSolValue],
        options: DeployOptions,
    ) -> Result<DeploymentRecord> {
        self.push(Call::Deploy {
            contract,
            args: args.to_vec(),
            gas: options.gas,
        })?;
        Ok(DeploymentRecord::new(contract, self.next_address()))
    }

    async fn resolve_address(&mut self, record: &DeploymentRecord) -> Result<DeploymentRecord> {
        self.push(Call::Resolve(record.contract))?;
        let mut confirmed = record.clone();
        confirmed.block_number = Some(self.calls.len() as u64);
        if self.misreport_resolve {
            confirmed.address = Address::ZERO;
        }
        Ok(confirmed)
    }
}

/// The LuvNFT migration without its confirmation step, followed by the auction
/// constructed with the token address.
fn unconfirmed_auction_migration() -> Migration {
    let mut migration = Migration::new("unconfirmed-auction");
    migration.steps = migration::luv_nft()
        .steps
        .into_iter()
        .filter(|step| !matches!(step, luv_deploy::Step::ResolveAddress { .. }))
        .collect();

    migration.deploy(
        Contract::NftAuction,
        vec![ConstructorArg::AddressOf(Contract::LuvNft)],
        DeployOptions::default(),
    )
}

#[tokio::test]
async fn test_luv_nft_issues_links_then_gas_capped_deploy() {
    let mut sequencer = Sequencer::new(RecordingBackend::default());
    sequencer.run(&migration::luv_nft()).await.unwrap();

    let calls = &sequencer.backend().calls;
    assert_eq!(
        calls,
        &vec![
            Call::DeployLibrary(Contract::IterableMapping),
            Call::Link {
                library: Contract::IterableMapping,
                consumer: Contract::LuvNft
            },
            Call::DeployLibrary(Contract::NftDescriptor),
            Call::Link {
                library: Contract::NftDescriptor,
                consumer: Contract::LuvNft
            },
            Call::Deploy {
                contract: Contract::LuvNft,
                args: vec![],
                gas: Some(10_000_000)
            },
            Call::Resolve(Contract::LuvNft),
        ]
    );

    let deploy_index = sequencer
        .backend()
        .position(|c| matches!(c, Call::Deploy { contract: Contract::LuvNft, .. }))
        .unwrap();
    let links_before = calls[..deploy_index]
        .iter()
        .filter(|c| matches!(c, Call::Link { .. }))
        .count();
    assert_eq!(links_before, 2);
    assert_eq!(LUV_NFT_GAS_LIMIT, 10_000_000);
}

#[tokio::test]
async fn test_libraries_are_linked_before_consumer_deploy() {
    for kind in MigrationKind::iter() {
        let mut sequencer = Sequencer::new(RecordingBackend::default());
        sequencer.run(&kind.migration()).await.unwrap();
        let backend = sequencer.backend();

        for consumer in Contract::iter() {
            let Some(deploy_index) = backend
                .position(|c| matches!(c, Call::Deploy { contract, .. } if *contract == consumer))
            else {
                continue;
            };

            for library in consumer.libraries() {
                let library_deploy = backend
                    .position(|c| *c == Call::DeployLibrary(*library))
                    .expect("library deployed");
                let link = backend
                    .position(|c| {
                        *c == Call::Link {
                            library: *library,
                            consumer,
                        }
                    })
                    .expect("library linked");

                assert!(library_deploy < link, "{kind}: {library} linked before deployed");
                assert!(link < deploy_index, "{kind}: {consumer} deployed before linking {library}");
            }
        }
    }
}

#[tokio::test]
async fn test_resolve_only_after_deploy() {
    for kind in MigrationKind::iter() {
        let mut sequencer = Sequencer::new(RecordingBackend::default());
        sequencer.run(&kind.migration()).await.unwrap();
        let backend = sequencer.backend();

        for (index, call) in backend.calls.iter().enumerate() {
            if let Call::Resolve(contract) = call {
                let deploy_index = backend
                    .position(|c| match c {
                        Call::Deploy { contract: c, .. } | Call::DeployLibrary(c) => c == contract,
                        _ => false,
                    })
                    .expect("resolved contract was deployed");
                assert!(deploy_index < index, "{kind}: {contract} resolved before deployment");
            }
        }
    }
}

#[tokio::test]
async fn test_auction_receives_confirmed_token_address() {
    let mut sequencer = Sequencer::new(RecordingBackend::default());
    let report = sequencer.run(&migration::luv_nft_auction()).await.unwrap();

    let token = report.address(Contract::LuvNft).unwrap();
    let backend = sequencer.backend();

    let resolve_index = backend
        .position(|c| *c == Call::Resolve(Contract::LuvNft))
        .unwrap();
    let auction_index = backend
        .position(|c| matches!(c, Call::Deploy { contract: Contract::NftAuction, .. }))
        .unwrap();
    assert!(resolve_index < auction_index);

    assert_eq!(
        backend.calls[auction_index],
        Call::Deploy {
            contract: Contract::NftAuction,
            args: vec![DynSolValue::Address(token)],
            gas: None
        }
    );
}

#[tokio::test]
async fn test_unconfirmed_address_reference_is_a_race() {
    let migration = unconfirmed_auction_migration();

    // Static validation flags the ordering...
    let err = migration.validate().unwrap_err();
    assert_eq!(
        err.downcast_ref::<SequenceError>(),
        Some(&SequenceError::UnresolvedAddress {
            contract: Contract::LuvNft
        })
    );

    // ...and so does the sequencer, before the auction deploy is issued.
    let mut sequencer = Sequencer::new(RecordingBackend::default());
    let err = sequencer.run(&migration).await.unwrap_err();

    assert_eq!(
        err.downcast_ref::<SequenceError>(),
        Some(&SequenceError::UnresolvedAddress {
            contract: Contract::LuvNft
        })
    );
    assert!(err.to_string().contains("step 5 (deploy NFTAuction)"), "{err}");

    let backend = sequencer.backend();
    assert_eq!(backend.calls.len(), 5);
    assert!(
        backend
            .position(|c| matches!(c, Call::Deploy { contract: Contract::NftAuction, .. }))
            .is_none()
    );
}

#[tokio::test]
async fn test_sequence_halts_at_first_failure() {
    let migration = migration::luv_nft_auction();

    for fail_at in 0..migration.steps.len() {
        let mut sequencer = Sequencer::new(RecordingBackend::failing_at(fail_at));
        let err = sequencer.run(&migration).await.unwrap_err();

        assert_eq!(
            sequencer.backend().calls.len(),
            fail_at + 1,
            "steps issued after failure at {fail_at}"
        );
        assert!(
            err.to_string().starts_with(&format!("step {fail_at} (")),
            "{err}"
        );
        assert!(err.downcast_ref::<SequenceError>().is_none());
    }
}

#[tokio::test]
async fn test_deploy_without_links_is_not_issued() {
    let migration = Migration::new("no-links").deploy(
        Contract::LuvNft,
        vec![],
        DeployOptions::with_gas(LUV_NFT_GAS_LIMIT),
    );

    let mut sequencer = Sequencer::new(RecordingBackend::default());
    let err = sequencer.run(&migration).await.unwrap_err();

    assert_eq!(
        err.downcast_ref::<SequenceError>(),
        Some(&SequenceError::MissingLink {
            library: Contract::IterableMapping,
            consumer: Contract::LuvNft
        })
    );
    assert!(sequencer.backend().calls.is_empty());
}

#[tokio::test]
async fn test_resolving_undeployed_contract_is_rejected() {
    let migration = Migration::new("resolve-first").resolve(Contract::NftAuction);

    let mut sequencer = Sequencer::new(RecordingBackend::default());
    let err = sequencer.run(&migration).await.unwrap_err();

    assert_eq!(
        err.downcast_ref::<SequenceError>(),
        Some(&SequenceError::NotDeployed {
            contract: Contract::NftAuction
        })
    );
    assert!(sequencer.backend().calls.is_empty());
}

#[tokio::test]
async fn test_regular_contract_cannot_be_deployed_as_library() {
    let migration = Migration::new("not-a-library").deploy_library(Contract::NftAuction);

    let mut sequencer = Sequencer::new(RecordingBackend::default());
    let err = sequencer.run(&migration).await.unwrap_err();

    assert_eq!(
        err.downcast_ref::<SequenceError>(),
        Some(&SequenceError::NotALibrary {
            contract: Contract::NftAuction
        })
    );
}

#[tokio::test]
async fn test_library_is_not_issued_as_contract_deploy() {
    let migration = Migration::new("library-as-contract").deploy(
        Contract::NftDescriptor,
        vec![],
        DeployOptions::default(),
    );

    let mut sequencer = Sequencer::new(RecordingBackend::default());
    let err = sequencer.run(&migration).await.unwrap_err();

    assert_eq!(
        err.downcast_ref::<SequenceError>(),
        Some(&SequenceError::LibraryDeployedAsContract {
            library: Contract::NftDescriptor
        })
    );
    assert!(sequencer.backend().calls.is_empty());
}

#[tokio::test]
async fn test_link_into_contract_without_that_library_is_not_issued() {
    let migration = Migration::new("stray-link")
        .deploy_library(Contract::NftDescriptor)
        .link(Contract::NftDescriptor, Contract::NftAuction);

    let mut sequencer = Sequencer::new(RecordingBackend::default());
    let err = sequencer.run(&migration).await.unwrap_err();

    assert_eq!(
        err.downcast_ref::<SequenceError>(),
        Some(&SequenceError::UnexpectedLink {
            library: Contract::NftDescriptor,
            consumer: Contract::NftAuction
        })
    );
    assert_eq!(
        sequencer.backend().calls,
        vec![Call::DeployLibrary(Contract::NftDescriptor)]
    );
}

#[tokio::test]
async fn test_linking_into_deployed_contract_is_rejected() {
    let migration = migration::luv_nft().link(Contract::IterableMapping, Contract::LuvNft);

    let mut sequencer = Sequencer::new(RecordingBackend::default());
    let err = sequencer.run(&migration).await.unwrap_err();

    assert_eq!(
        err.downcast_ref::<SequenceError>(),
        Some(&SequenceError::AlreadyDeployed {
            contract: Contract::LuvNft
        })
    );
    assert_eq!(sequencer.backend().calls.len(), 6);
}

#[tokio::test]
async fn test_confirmation_with_different_address_fails() {
    let backend = RecordingBackend {
        misreport_resolve: true,
        ..RecordingBackend::default()
    };
    let mut sequencer = Sequencer::new(backend);

    let err = sequencer.run(&migration::luv_nft()).await.unwrap_err();
    assert!(err.to_string().contains("step 5 (resolve LuvNFT)"), "{err}");
}

#[tokio::test]
async fn test_report_lists_records_in_deployment_order() {
    let mut sequencer = Sequencer::new(RecordingBackend::default());
    let report = sequencer.run(&migration::luv_nft_auction()).await.unwrap();

    assert_eq!(report.migration, "luv-nft-auction");
    assert_eq!(
        report
            .records
            .iter()
            .map(|r| r.contract)
            .collect::<Vec<_>>(),
        migration::luv_nft_auction().deployed_contracts()
    );

    // Resolved records are replaced by the confirmed ones.
    assert!(report.record(Contract::LuvNft).unwrap().block_number.is_some());
    assert!(
        report
            .record(Contract::IterableMapping)
            .unwrap()
            .block_number
            .is_none()
    );
}
