//! luv-migrate deploys the LuvNFT contract suite as an ordered, fail-fast migration.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use luv_deploy::{
    ArtifactStore, ConstructorArg, DeploymentLedger, DeploymentReport, DryRunBackend,
    MigrateConfig, Migration, RpcBackend, Sequencer, Step,
};

use cli::{Cli, Command, MigrateArgs, PlanArgs, StatusArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = MigrateConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Plan(args) => plan(config, args).await,
        Command::Migrate(args) => migrate(config, args).await,
        Command::Status(args) => status(config, args),
    }
}

async fn plan(config: MigrateConfig, args: PlanArgs) -> Result<()> {
    let migration = args.migration.unwrap_or(config.migration).migration();
    migration.validate()?;

    println!("{}", steps_table(&migration));

    if !args.dry_run {
        return Ok(());
    }

    let mut backend = DryRunBackend::new(args.deployer, args.nonce);
    if let Some(artifacts) = args.artifacts {
        backend = backend.with_artifacts(ArtifactStore::open(artifacts));
    }

    tracing::info!(
        deployer = %args.deployer,
        nonce = args.nonce,
        "Simulating migration..."
    );

    let mut sequencer = Sequencer::new(backend);
    let report = sequencer.run(&migration).await?;
    println!("{}", report_table(&report));

    Ok(())
}

async fn migrate(mut config: MigrateConfig, args: MigrateArgs) -> Result<()> {
    args.apply(&mut config);

    let migration = config.migration.migration();
    migration
        .validate()
        .with_context(|| format!("Migration {} is not correctly ordered", migration.name))?;

    if let Some(ledger) = DeploymentLedger::load_for_network(&config.outdata, &config.network)? {
        if ledger.should_skip(&migration, args.reset)? {
            tracing::info!(
                network = %config.network,
                migration = %ledger.migration,
                deployed_at = ledger.deployed_at,
                "Migration already deployed on this network, skipping. Use --reset to redeploy."
            );
            println!("{}", ledger_table(&ledger));
            return Ok(());
        }

        tracing::warn!(
            network = %config.network,
            previous = %ledger.migration,
            "Replacing the existing deployment of this network"
        );
    }

    if let Some(path) = &args.save_config {
        config.save_to_file(path)?;
    }

    tracing::info!(
        network = %config.network,
        migration = %migration.name,
        rpc_url = %config.rpc_url,
        artifacts = %config.artifacts_dir.display(),
        "Running migration..."
    );

    let backend = RpcBackend::connect(
        config.rpc_backend_config(),
        ArtifactStore::open(config.artifacts_dir.clone()),
    )
    .await?;

    let mut sequencer = Sequencer::new(backend);
    let report = sequencer.run(&migration).await?;

    let ledger = DeploymentLedger::from_report(config.network.clone(), &migration, &report)?;
    ledger.save_to_file(&config.ledger_path())?;

    println!("{}", ledger_table(&ledger));
    Ok(())
}

fn status(config: MigrateConfig, args: StatusArgs) -> Result<()> {
    let network = args.network.unwrap_or(config.network);
    let outdata = args.outdata.unwrap_or(config.outdata);

    let Some(ledger) = DeploymentLedger::load_for_network(&outdata, &network)? else {
        println!("No deployment recorded for network {network}");
        return Ok(());
    };

    let current = ledger.matches(&config.migration.migration())?;
    println!(
        "Network {} ran migration {} (fingerprint {}{})",
        ledger.network,
        ledger.migration,
        ledger.fingerprint,
        if current { "" } else { ", differs from the configured migration" }
    );
    println!("{}", ledger_table(&ledger));

    Ok(())
}

fn steps_table(migration: &Migration) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["#", "Step", "Gas", "Arguments"]);

    for (index, step) in migration.steps.iter().enumerate() {
        let (gas, args) = match step {
            Step::Deploy { args, options, .. } => (
                options.gas.map(|gas| gas.to_string()).unwrap_or_default(),
                args.iter().map(describe_arg).collect::<Vec<_>>().join(", "),
            ),
            _ => (String::new(), String::new()),
        };
        table.add_row(vec![index.to_string(), step.to_string(), gas, args]);
    }

    table
}

fn describe_arg(arg: &ConstructorArg) -> String {
    match arg {
        ConstructorArg::Address(address) => address.to_string(),
        ConstructorArg::AddressOf(contract) => format!("address of {contract}"),
        ConstructorArg::Uint(value) => value.to_string(),
        ConstructorArg::Bool(value) => value.to_string(),
        ConstructorArg::String(value) => format!("{value:?}"),
    }
}

fn report_table(report: &DeploymentReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Contract", "Address"]);

    for record in &report.records {
        table.add_row(vec![record.contract.to_string(), record.address.to_string()]);
    }

    table
}

fn ledger_table(ledger: &DeploymentLedger) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Contract", "Address", "Transaction", "Block"]);

    for (contract, entry) in &ledger.contracts {
        table.add_row(vec![
            contract.to_string(),
            entry.address.to_string(),
            entry
                .transaction_hash
                .map(|hash| hash.to_string())
                .unwrap_or_default(),
            entry
                .block_number
                .map(|block| block.to_string())
                .unwrap_or_default(),
        ]);
    }

    table
}
