//! Where `FundMe` gets its ETH/USD price feed from.

use alloy_core::primitives::Address;

use super::DeployError;
use crate::{contracts::MOCK_V3_AGGREGATOR, deployments::DeploymentStore, network::NetworkDefinition};

/// Price feed source, chosen once per network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleResolver {
    /// The mock aggregator deployed earlier in the session.
    Mock,
    /// A feed address from the network table.
    Config(Address),
}

impl OracleResolver {
    pub fn for_network(network: &NetworkDefinition) -> Result<Self, DeployError> {
        if network.is_development() {
            return Ok(Self::Mock);
        }

        network
            .config
            .eth_usd_price_feed
            .map(Self::Config)
            .ok_or_else(|| DeployError::MissingPriceFeed(network.name.to_string()))
    }

    /// The price feed address to pass to the `FundMe` constructor.
    pub fn resolve(&self, deployments: &DeploymentStore) -> Result<Address, DeployError> {
        match self {
            Self::Mock => deployments
                .get(MOCK_V3_AGGREGATOR)
                .map(|record| record.address)
                .ok_or(DeployError::MissingMock(MOCK_V3_AGGREGATOR)),
            Self::Config(address) => Ok(*address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        deployments::DeploymentRecord,
        network::{NetworkConfigEntry, Transport, network},
    };
    use alloy_core::primitives::{Bytes, address};

    #[test]
    fn test_development_networks_use_mock() {
        let hardhat = network("hardhat").unwrap();
        let resolver = OracleResolver::for_network(hardhat).unwrap();
        assert_eq!(resolver, OracleResolver::Mock);

        let mut store = DeploymentStore::in_memory();
        assert!(matches!(
            resolver.resolve(&store),
            Err(DeployError::MissingMock(MOCK_V3_AGGREGATOR))
        ));

        let mock = address!("5fbdb2315678afecb367f032d93f642f64180aa3");
        store
            .save(
                MOCK_V3_AGGREGATOR,
                DeploymentRecord {
                    address: mock,
                    args: vec![],
                    constructor_args: Bytes::new(),
                    transaction_hash: None,
                    block_number: None,
                    gas_used: None,
                },
            )
            .unwrap();
        assert_eq!(resolver.resolve(&store).unwrap(), mock);
    }

    #[test]
    fn test_live_network_uses_configured_feed() {
        let goerli = network("goerli").unwrap();
        let resolver = OracleResolver::for_network(goerli).unwrap();
        assert_eq!(
            resolver.resolve(&DeploymentStore::in_memory()).unwrap(),
            address!("d4a33860578de61dbabdc8bfdb98fd742fa7028e")
        );
    }

    #[test]
    fn test_live_network_without_feed() {
        let sepolia = NetworkDefinition {
            name: "sepolia",
            chain_id: 11155111,
            transport: Transport::Rpc {
                default_url: "https://eth-sepolia",
            },
            explorer_api_url: None,
            config: NetworkConfigEntry::default(),
        };
        assert!(matches!(
            OracleResolver::for_network(&sepolia),
            Err(DeployError::MissingPriceFeed(name)) if name == "sepolia"
        ));
    }
}
