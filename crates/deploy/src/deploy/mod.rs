//! Deployment scripts and the environment they run in.
//!
//! Scripts run in a fixed order, filtered by tag:
//!
//! 1. `00-deploy-mocks` (`all`, `mocks`): a mock price feed on development networks.
//! 2. `01-deploy-fund-me` (`all`, `fundMe`): `FundMe`, then source verification on
//!    live networks.

use std::future::Future;

use alloy_core::primitives::{Address, Bytes};
use strum::{Display, EnumString, VariantNames};

use crate::{
    chain::{Chain, ChainError},
    contracts::{ContractError, FUND_ME, FundMe, MOCK_V3_AGGREGATOR, MockV3Aggregator},
    deployments::{DeploymentRecord, DeploymentStore},
    gas::{DEPLOYMENT, GasReporter},
    network::{NetworkDefinition, network},
    verify::{Etherscan, Verifier},
};

pub mod oracle;
mod scripts;

pub use oracle::OracleResolver;
pub use scripts::{DECIMALS, DeployFundMe, DeployMocks, INITIAL_ANSWER};

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("unknown network `{0}`")]
    UnknownNetwork(String),
    #[error("no ETH/USD price feed configured for network `{0}`")]
    MissingPriceFeed(String),
    #[error("no {0} deployment in this session, run the `mocks` scripts first")]
    MissingMock(&'static str),
    #[error("no {contract} deployment on network `{network}`")]
    MissingDeployment {
        contract: &'static str,
        network: &'static str,
    },
    #[error("deployment of {contract} failed: {source}")]
    Transaction {
        contract: String,
        #[source]
        source: ChainError,
    },
    #[error("deployment of {contract} reverted: {source}")]
    Revert {
        contract: String,
        #[source]
        source: ContractError,
    },
    #[error(transparent)]
    Rpc(#[from] ChainError),
    #[error("deployment store: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// Outcome of [`DeployEnvironment::deploy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployResult {
    pub record: DeploymentRecord,
    /// `false` when an existing deployment was reused.
    pub newly_deployed: bool,
}

/// Tags used to select deployment scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "camelCase")]
pub enum DeployTag {
    All,
    Mocks,
    FundMe,
}

/// A deployment step.
pub trait DeployScript {
    /// Script name, used in logs.
    const NAME: &'static str;

    const TAGS: &'static [DeployTag];

    fn run<C: Chain, V: Verifier>(
        env: &mut DeployEnvironment<C, V>,
    ) -> impl Future<Output = Result<(), DeployError>> + Send;

    /// Whether the script is selected by `tags`. No tags selects every script.
    fn selected_by(tags: &[DeployTag]) -> bool {
        tags.is_empty() || tags.iter().any(|tag| Self::TAGS.contains(tag))
    }
}

/// Resolve a network by name.
pub fn resolve_network(name: &str) -> Result<&'static NetworkDefinition, DeployError> {
    network(name).ok_or_else(|| DeployError::UnknownNetwork(name.to_string()))
}

/// Everything a deployment script needs: the network, a chain to send
/// transactions to, the deployer account and the deployment records.
#[derive(Debug)]
pub struct DeployEnvironment<C, V = Etherscan> {
    network: &'static NetworkDefinition,
    chain: C,
    deployer: Address,
    deployments: DeploymentStore,
    verifier: Option<V>,
    gas_reporter: GasReporter,
}

impl<C: Chain, V: Verifier> DeployEnvironment<C, V> {
    /// Create an environment. The deployer is the chain's first account.
    pub async fn new(
        network: &'static NetworkDefinition,
        chain: C,
        deployments: DeploymentStore,
    ) -> Result<Self, DeployError> {
        let deployer = chain
            .accounts()
            .await?
            .first()
            .copied()
            .ok_or_else(|| ChainError::Transport("Chain has no accounts".to_string()))?;

        tracing::debug!(network = network.name, %deployer, "Deploy environment ready");

        Ok(Self {
            network,
            chain,
            deployer,
            deployments,
            verifier: None,
            gas_reporter: GasReporter::default(),
        })
    }

    /// Verify sources with `verifier` after deploying on live networks.
    pub fn with_verifier(mut self, verifier: V) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_gas_reporter(mut self, gas_reporter: GasReporter) -> Self {
        self.gas_reporter = gas_reporter;
        self
    }

    pub fn network(&self) -> &'static NetworkDefinition {
        self.network
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    /// Consume the environment, keeping the chain.
    pub fn into_chain(self) -> C {
        self.chain
    }

    pub fn deployer(&self) -> Address {
        self.deployer
    }

    pub fn deployments(&self) -> &DeploymentStore {
        &self.deployments
    }

    pub fn verifier(&self) -> Option<&V> {
        self.verifier.as_ref()
    }

    pub fn gas_reporter(&self) -> &GasReporter {
        &self.gas_reporter
    }

    /// Run the scripts selected by `tags`, in order.
    pub async fn fixture(&mut self, tags: &[DeployTag]) -> Result<(), DeployError> {
        self.run_script::<DeployMocks>(tags).await?;
        self.run_script::<DeployFundMe>(tags).await?;
        Ok(())
    }

    async fn run_script<S: DeployScript>(&mut self, tags: &[DeployTag]) -> Result<(), DeployError> {
        if !S::selected_by(tags) {
            tracing::debug!(script = S::NAME, "Skipping deploy script");
            return Ok(());
        }

        tracing::debug!(script = S::NAME, network = self.network.name, "Running deploy script");
        S::run(self).await
    }

    /// The record of a deployed contract, if any.
    pub fn get(&self, contract: &str) -> Option<&DeploymentRecord> {
        self.deployments.get(contract)
    }

    /// Deploy `contract` from the deployer.
    ///
    /// An existing record with the same constructor arguments is reused as long
    /// as the chain still has code at its address. Waits for the network's block
    /// confirmations before recording a new deployment.
    pub async fn deploy(
        &mut self,
        contract: &str,
        args: Vec<String>,
        constructor_args: Bytes,
    ) -> Result<DeployResult, DeployError> {
        if let Some(existing) = self.deployments.get(contract).cloned() {
            if existing.constructor_args == constructor_args {
                if !self.chain.code_at(existing.address).await?.is_empty() {
                    tracing::info!("reusing \"{}\" at {}", contract, existing.address);
                    return Ok(DeployResult {
                        record: existing,
                        newly_deployed: false,
                    });
                }
                tracing::warn!(
                    contract,
                    address = %existing.address,
                    "No code at recorded address, redeploying"
                );
            }
        }

        let receipt = self
            .chain
            .deploy(self.deployer, contract, constructor_args.clone())
            .await
            .map_err(|source| match source {
                ChainError::Reverted { data } => DeployError::Revert {
                    contract: contract.to_string(),
                    source: ContractError::from_revert_data(&data),
                },
                source => DeployError::Transaction {
                    contract: contract.to_string(),
                    source,
                },
            })?;

        let confirmations = self.network.block_confirmations();
        if confirmations > 0 {
            self.chain
                .wait_for_confirmations(&receipt, confirmations)
                .await
                .map_err(|source| DeployError::Transaction {
                    contract: contract.to_string(),
                    source,
                })?;
        }

        self.gas_reporter
            .record(contract, DEPLOYMENT, receipt.gas_used);

        let record = DeploymentRecord::from_receipt(&receipt, args, constructor_args)?;
        tracing::info!(
            tx_hash = %receipt.transaction_hash,
            gas_used = receipt.gas_used,
            "deployed \"{}\" at {}",
            contract,
            record.address
        );

        self.deployments.save(contract, record.clone())?;
        Ok(DeployResult {
            record,
            newly_deployed: true,
        })
    }

    /// Bind the deployed `FundMe`, sending from the deployer.
    pub fn fund_me(&self) -> Result<FundMe<'_, C>, DeployError> {
        let record = self.require(FUND_ME)?;
        Ok(FundMe::at(&self.chain, record.address, self.deployer)
            .with_gas_reporter(&self.gas_reporter))
    }

    /// Bind the deployed mock price feed.
    pub fn mock_v3_aggregator(&self) -> Result<MockV3Aggregator<'_, C>, DeployError> {
        let record = self.require(MOCK_V3_AGGREGATOR)?;
        Ok(MockV3Aggregator::at(&self.chain, record.address, self.deployer))
    }

    fn require(&self, contract: &'static str) -> Result<&DeploymentRecord, DeployError> {
        self.deployments
            .get(contract)
            .ok_or(DeployError::MissingDeployment {
                contract,
                network: self.network.name,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_tags_parse() {
        assert_eq!(DeployTag::from_str("all").unwrap(), DeployTag::All);
        assert_eq!(DeployTag::from_str("mocks").unwrap(), DeployTag::Mocks);
        assert_eq!(DeployTag::from_str("fundMe").unwrap(), DeployTag::FundMe);
        assert!(DeployTag::from_str("token").is_err());
        assert_eq!(DeployTag::FundMe.to_string(), "fundMe");
    }

    #[test]
    fn test_script_selection() {
        assert!(DeployMocks::selected_by(&[]));
        assert!(DeployMocks::selected_by(&[DeployTag::All]));
        assert!(DeployMocks::selected_by(&[DeployTag::Mocks]));
        assert!(!DeployMocks::selected_by(&[DeployTag::FundMe]));
        assert!(DeployFundMe::selected_by(&[DeployTag::FundMe]));
        assert!(!DeployFundMe::selected_by(&[DeployTag::Mocks]));
    }

    #[test]
    fn test_resolve_network() {
        assert_eq!(resolve_network("goerli").unwrap().chain_id, 5);
        assert!(matches!(
            resolve_network("mainnet"),
            Err(DeployError::UnknownNetwork(name)) if name == "mainnet"
        ));
    }
}
