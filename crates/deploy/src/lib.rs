//! fundme-deploy - Deployment library for the FundMe crowdfunding contract.
//!
//! This crate deploys `FundMe` and its price feed on development and live
//! networks, verifies the sources on a block explorer, and drives the contract
//! through typed bindings.

pub mod artifacts;
pub mod chain;
pub mod contracts;
pub mod deploy;
pub mod deployments;
pub mod gas;
pub mod network;
mod rpc;
pub mod settings;
pub mod signer;
pub mod staging;
pub mod verify;

pub use alloy_core::primitives::{
    Address, B256, Bytes, I256, U256,
    utils::{format_ether, parse_ether},
};
pub use artifacts::ArtifactStore;
pub use chain::{Chain, ChainError, DevChain, RpcChain, TxReceipt, TxRequest};
pub use contracts::{ContractError, FUND_ME, FundMe, MOCK_V3_AGGREGATOR, MockV3Aggregator};
pub use deploy::{
    DECIMALS, DeployEnvironment, DeployError, DeployFundMe, DeployMocks, DeployResult, DeployScript,
    DeployTag, INITIAL_ANSWER, OracleResolver, resolve_network,
};
pub use deployments::{DeploymentRecord, DeploymentStore};
pub use gas::{GasPricing, GasReporter, GasStats};
pub use network::{
    DEFAULT_NETWORK, DEVELOPMENT_CHAINS, NETWORKS, NetworkConfigEntry, NetworkDefinition,
    is_development_chain, network, network_config,
};
pub use settings::{GasReporterConfig, SETTINGS_FILENAME, Settings};
pub use signer::{PrivateKeySigner, parse_private_key};
pub use staging::{StagingReport, fund_and_withdraw, staging_value};
pub use verify::{Etherscan, EtherscanConfig, Verifier, VerifyError, verify_contract};
