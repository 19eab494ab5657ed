//! Static network configuration.
//!
//! The table is keyed by network name and never mutated at runtime. Development
//! networks carry no price feed: they rely on a mock aggregator deployed in the
//! same session instead.

use alloy_core::primitives::{Address, address};

/// Chain ID shared by the in-process network and a local node.
pub const DEV_CHAIN_ID: u64 = 31337;

/// The network used when none is selected.
pub const DEFAULT_NETWORK: &str = "hardhat";

/// Networks that are local or ephemeral.
///
/// Deployments on these networks use a mock price feed and are never verified.
pub const DEVELOPMENT_CHAINS: &[&str] = &["hardhat", "localhost"];

/// Per-network deployment parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkConfigEntry {
    /// Address of the ETH/USD price feed aggregator.
    pub eth_usd_price_feed: Option<Address>,
    /// Number of block confirmations to wait for after deploying.
    pub block_confirmations: Option<u64>,
}

/// How a network is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// The in-process development chain.
    InProcess,
    /// A JSON-RPC node. The URL is the default when no override is configured.
    Rpc { default_url: &'static str },
}

/// A known network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkDefinition {
    pub name: &'static str,
    pub chain_id: u64,
    pub transport: Transport,
    /// Etherscan-compatible API endpoint for source verification.
    pub explorer_api_url: Option<&'static str>,
    pub config: NetworkConfigEntry,
}

impl NetworkDefinition {
    /// Whether this network is in [`DEVELOPMENT_CHAINS`].
    pub fn is_development(&self) -> bool {
        is_development_chain(self.name)
    }

    /// Confirmations to wait for after a deployment. Zero means do not wait.
    pub fn block_confirmations(&self) -> u64 {
        self.config.block_confirmations.unwrap_or(0)
    }
}

/// All known networks.
// Price feed addresses: https://docs.chain.link/docs/reference-contracts
pub const NETWORKS: &[NetworkDefinition] = &[
    NetworkDefinition {
        name: "hardhat",
        chain_id: DEV_CHAIN_ID,
        transport: Transport::InProcess,
        explorer_api_url: None,
        config: NetworkConfigEntry {
            eth_usd_price_feed: None,
            block_confirmations: None,
        },
    },
    NetworkDefinition {
        name: "localhost",
        chain_id: DEV_CHAIN_ID,
        transport: Transport::Rpc {
            default_url: "http://127.0.0.1:8545/",
        },
        explorer_api_url: None,
        config: NetworkConfigEntry {
            eth_usd_price_feed: None,
            block_confirmations: None,
        },
    },
    NetworkDefinition {
        name: "goerli",
        chain_id: 5,
        transport: Transport::Rpc {
            default_url: "https://eth-goerli",
        },
        explorer_api_url: Some("https://api-goerli.etherscan.io/api"),
        config: NetworkConfigEntry {
            eth_usd_price_feed: Some(address!("d4a33860578de61dbabdc8bfdb98fd742fa7028e")),
            block_confirmations: Some(6),
        },
    },
];

/// Look up a network by name.
pub fn network(name: &str) -> Option<&'static NetworkDefinition> {
    NETWORKS.iter().find(|n| n.name == name)
}

/// Look up the configuration entry of a network by name.
pub fn network_config(name: &str) -> Option<&'static NetworkConfigEntry> {
    network(name).map(|n| &n.config)
}

pub fn is_development_chain(name: &str) -> bool {
    DEVELOPMENT_CHAINS.contains(&name)
}
