use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fundme_deploy::{DEFAULT_NETWORK, DeployTag};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "fundme")]
#[command(author, version, about = "Deploy and exercise the FundMe contract")]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "FUNDME_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The network to run against.
    ///
    /// `hardhat` runs an in-process development chain; the mocks and `FundMe`
    /// are deployed on it before any other command.
    #[arg(short, long, env = "FUNDME_NETWORK", default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// Path to the settings file.
    ///
    /// If not provided, `FundMe.toml` in the working directory is used when present.
    #[arg(short, long, env = "FUNDME_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the deployment scripts.
    Deploy {
        /// Only run scripts with one of these tags. Runs every script when empty.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<DeployTag>,
    },

    /// Fund the deployed contract from the deployer account.
    Fund {
        /// Amount in ETH.
        #[arg(long, default_value = "0.1")]
        amount: String,
    },

    /// Withdraw the contract balance to the owner.
    Withdraw {
        /// Use `cheaperWithdraw`.
        #[arg(long)]
        cheaper: bool,
    },

    /// Fund then withdraw against a live deployment.
    Stage,

    /// List the known networks.
    Networks,

    /// Print the effective settings, secrets masked.
    Config,
}
