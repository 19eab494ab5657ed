//! fundme is a CLI tool to deploy, fund and withdraw from the FundMe contract.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Table, presets};

use cli::{Cli, Command};
use fundme_deploy::{
    ArtifactStore, Chain, DeployEnvironment, DeployTag, DeploymentStore, DevChain, Etherscan,
    EtherscanConfig, GasReporter, NETWORKS, NetworkDefinition, RpcChain, Settings, Verifier,
    format_ether, fund_and_withdraw, gas::fetch_pricing, network::Transport, parse_ether,
    parse_private_key, resolve_network, staging_value,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let settings = Settings::load(cli.config.as_deref())?;

    match &cli.command {
        Command::Networks => {
            println!("{}", networks_table());
            return Ok(());
        }
        Command::Config => {
            print!("{}", settings.to_redacted_toml()?);
            return Ok(());
        }
        _ => {}
    }

    let network = resolve_network(&cli.network)?;
    let gas_reporter = GasReporter::new(settings.gas_reporter.clone());

    match network.transport {
        Transport::InProcess => {
            let mut env =
                DeployEnvironment::new(network, DevChain::new(), DeploymentStore::in_memory())
                    .await?
                    .with_gas_reporter(gas_reporter);

            // The in-process chain starts empty on every run.
            if !matches!(cli.command, Command::Deploy { .. }) {
                env.fixture(&[DeployTag::All]).await?;
            }
            run(&mut env, &cli.command).await?;
            report_gas(&env, &settings).await
        }
        Transport::Rpc { .. } => {
            let url = settings
                .rpc_url(network)?
                .context("Network has no RPC endpoint")?;
            let artifacts = ArtifactStore::new(&settings.artifacts_dir);

            let mut chain = RpcChain::new(url, artifacts.clone())?;
            if let Some(private_key) = &settings.private_key {
                chain = chain.with_signer(parse_private_key(private_key)?);
            }

            let chain_id = chain.chain_id().await?;
            if chain_id != network.chain_id {
                tracing::warn!(
                    expected = network.chain_id,
                    actual = chain_id,
                    "Node reports an unexpected chain ID"
                );
            }
            let deployments =
                DeploymentStore::open(&settings.deployments_dir, network.name, chain_id)?;

            let mut env = DeployEnvironment::new(network, chain, deployments)
                .await?
                .with_gas_reporter(gas_reporter);
            if let Some(verifier) = etherscan(network, &settings, artifacts)? {
                env = env.with_verifier(verifier);
            }

            run(&mut env, &cli.command).await?;
            report_gas(&env, &settings).await
        }
    }
}

/// Explorer client, when the network has an explorer and an API key is set.
fn etherscan(
    network: &NetworkDefinition,
    settings: &Settings,
    artifacts: ArtifactStore,
) -> Result<Option<Etherscan>> {
    let (Some(api_url), Some(api_key)) = (network.explorer_api_url, &settings.etherscan_api_key)
    else {
        return Ok(None);
    };

    let config = EtherscanConfig {
        api_url: api_url.parse().context("Invalid explorer API URL")?,
        api_key: api_key.clone(),
    };
    Ok(Some(Etherscan::new(config, artifacts)))
}

async fn run<C: Chain>(env: &mut DeployEnvironment<C, Etherscan>, command: &Command) -> Result<()> {
    match command {
        Command::Deploy { tags } => {
            env.fixture(tags).await?;
            for name in env.deployments().names() {
                if let Some(record) = env.get(name) {
                    tracing::info!(contract = name, address = %record.address, "Deployment");
                }
            }
        }
        Command::Fund { amount } => {
            let value = parse_ether(amount).with_context(|| format!("Invalid amount: {amount}"))?;
            let fund_me = env.fund_me()?;

            tracing::info!("Funding contract...");
            let receipt = fund_me.fund(value).await?;
            tracing::info!(
                tx_hash = %receipt.transaction_hash,
                amount = %format_ether(value),
                "Funded!"
            );
        }
        Command::Withdraw { cheaper } => {
            let fund_me = env.fund_me()?;

            tracing::info!("Withdrawing from contract...");
            let receipt = if *cheaper {
                fund_me.cheaper_withdraw().await?
            } else {
                fund_me.withdraw().await?
            };
            tracing::info!(tx_hash = %receipt.transaction_hash, "Got it back!");
        }
        Command::Stage => {
            if env.network().is_development() {
                tracing::info!(
                    network = env.network().name,
                    "Staging runs against live networks only, skipping"
                );
                return Ok(());
            }

            let fund_me = env.fund_me()?;
            let report = fund_and_withdraw(env.chain(), &fund_me, staging_value()).await?;
            anyhow::ensure!(
                report.passed(),
                "Contract still holds {} ETH after withdrawing",
                format_ether(report.ending_balance)
            );
            tracing::info!(
                funded = %format_ether(report.funded),
                "Staging cycle passed"
            );
        }
        Command::Networks | Command::Config => {}
    }
    Ok(())
}

async fn report_gas<C: Chain, V: Verifier>(
    env: &DeployEnvironment<C, V>,
    settings: &Settings,
) -> Result<()> {
    let reporter = env.gas_reporter();
    if !reporter.enabled() {
        return Ok(());
    }

    let pricing = match &settings.coinmarketcap_api_key {
        Some(api_key) => fetch_pricing(env.chain(), api_key, &settings.gas_reporter.currency).await,
        None => None,
    };
    reporter.write_report(pricing.as_ref())
}

fn networks_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.set_header(vec![
        "Network",
        "Chain ID",
        "Development",
        "ETH/USD price feed",
        "Confirmations",
    ]);

    for network in NETWORKS {
        table.add_row(vec![
            network.name.to_string(),
            network.chain_id.to_string(),
            network.is_development().to_string(),
            network
                .config
                .eth_usd_price_feed
                .map(|feed| feed.to_string())
                .unwrap_or_else(|| "mock".to_string()),
            network.block_confirmations().to_string(),
        ]);
    }
    table
}
