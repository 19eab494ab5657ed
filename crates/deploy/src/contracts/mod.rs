//! Contract ABIs and typed bindings.

use alloy_core::{
    primitives::{Address, U256},
    sol_types::{Panic, Revert, SolCall, SolError},
};

use crate::{
    chain::{Chain, ChainError, TxReceipt, TxRequest, revert_reason},
    gas::GasReporter,
};

mod aggregator;
mod fund_me;

pub use aggregator::MockV3Aggregator;
pub use fund_me::FundMe;

/// Solidity interfaces of the deployed contracts.
pub mod abi {
    use alloy_core::{sol, sol_types::sol_data};

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        interface FundMe {
            error FundMe__NotOwner();

            function fund() external payable;
            function withdraw() external;
            function cheaperWithdraw() external;
            function getOwner() external view returns (address);
            function getFunder(uint256 index) external view returns (address);
            function getFundedAmountFromAddress(address funder) external view returns (uint256);
            function getPriceFeed() external view returns (address);
            function getVersion() external view returns (uint256);
            function MINIMUM_USD() external view returns (uint256);
        }

        #[derive(Debug, PartialEq, Eq)]
        interface MockV3Aggregator {
            function decimals() external view returns (uint8);
            function version() external view returns (uint256);
            function latestAnswer() external view returns (int256);
            function latestRound() external view returns (uint256);
            function latestRoundData() external view returns (
                uint80 roundId,
                int256 answer,
                uint256 startedAt,
                uint256 updatedAt,
                uint80 answeredInRound
            );
            function updateAnswer(int256 answer) external;
        }
    }

    /// `constructor(address priceFeed)`
    pub type FundMeConstructor = (sol_data::Address,);

    /// `constructor(uint8 decimals, int256 initialAnswer)`
    pub type MockV3AggregatorConstructor = (sol_data::Uint<8>, sol_data::Int<256>);
}

/// Contract names, as used for artifacts and deployment records.
pub const FUND_ME: &str = "FundMe";
pub const MOCK_V3_AGGREGATOR: &str = "MockV3Aggregator";

/// Errors surfaced by contract bindings.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("reverted with reason '{0}'")]
    Revert(String),
    #[error("reverted with custom error FundMe__NotOwner()")]
    NotOwner,
    #[error("reverted with panic code {0:#x}")]
    Panic(U256),
    #[error("reverted without a reason")]
    EmptyRevert,
    #[error("reverted with unrecognized data 0x{}", hex::encode(.0))]
    UnknownRevert(Vec<u8>),
    #[error("failed to decode return data: {0}")]
    Decode(#[from] alloy_core::sol_types::Error),
    #[error(transparent)]
    Chain(ChainError),
}

impl ContractError {
    /// Classify raw revert data.
    pub fn from_revert_data(data: &[u8]) -> Self {
        if data.len() < 4 {
            return Self::EmptyRevert;
        }

        let selector = &data[..4];
        if selector == Revert::SELECTOR.as_slice() {
            if let Some(reason) = revert_reason(data) {
                return Self::Revert(reason);
            }
        } else if selector == Panic::SELECTOR.as_slice() {
            if let Ok(panic) = Panic::abi_decode(data, true) {
                return Self::Panic(panic.code);
            }
        } else if selector == abi::FundMe::FundMe__NotOwner::SELECTOR.as_slice() {
            return Self::NotOwner;
        }

        Self::UnknownRevert(data.to_vec())
    }

    /// The revert reason string, if this is an `Error(string)` revert.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Revert(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<ChainError> for ContractError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Reverted { data } => Self::from_revert_data(&data),
            other => Self::Chain(other),
        }
    }
}

/// A deployed contract bound to a chain and a sending account.
#[derive(Debug)]
struct Instance<'a, C> {
    chain: &'a C,
    name: &'static str,
    address: Address,
    signer: Address,
    gas_reporter: Option<&'a GasReporter>,
}

impl<C> Clone for Instance<'_, C> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}

impl<'a, C: Chain> Instance<'a, C> {
    fn new(chain: &'a C, name: &'static str, address: Address, signer: Address) -> Self {
        Self {
            chain,
            name,
            address,
            signer,
            gas_reporter: None,
        }
    }

    /// Send `call` as a transaction from the bound signer.
    async fn transact<T: SolCall>(&self, call: T, value: U256) -> Result<TxReceipt, ContractError> {
        let receipt = self
            .chain
            .send(TxRequest {
                from: self.signer,
                to: self.address,
                value,
                data: call.abi_encode().into(),
            })
            .await?;

        tracing::debug!(
            contract = self.name,
            method = T::SIGNATURE,
            tx_hash = %receipt.transaction_hash,
            gas_used = receipt.gas_used,
            "Transaction mined"
        );

        if let Some(reporter) = self.gas_reporter {
            reporter.record(self.name, T::SIGNATURE, receipt.gas_used);
        }

        Ok(receipt)
    }

    /// Execute `call` without sending a transaction.
    async fn view<T: SolCall>(&self, call: T) -> Result<T::Return, ContractError> {
        let output = self
            .chain
            .call(self.address, call.abi_encode().into())
            .await?;
        Ok(T::abi_decode_returns(&output, true)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::Bytes;

    #[test]
    fn test_classify_revert_reason() {
        let data = Revert {
            reason: "You need to spend more ETH!".to_string(),
        }
        .abi_encode();
        let err = ContractError::from_revert_data(&data);
        assert_eq!(err.reason(), Some("You need to spend more ETH!"));
    }

    #[test]
    fn test_classify_not_owner() {
        let data = abi::FundMe::FundMe__NotOwner {}.abi_encode();
        assert!(matches!(
            ContractError::from_revert_data(&data),
            ContractError::NotOwner
        ));
    }

    #[test]
    fn test_classify_panic_and_unknown() {
        let data = Panic {
            code: U256::from(0x32),
        }
        .abi_encode();
        assert!(matches!(
            ContractError::from_revert_data(&data),
            ContractError::Panic(code) if code == U256::from(0x32)
        ));

        assert!(matches!(
            ContractError::from_revert_data(&[]),
            ContractError::EmptyRevert
        ));
        assert!(matches!(
            ContractError::from_revert_data(&[0xde, 0xad, 0xbe, 0xef]),
            ContractError::UnknownRevert(_)
        ));
    }

    #[test]
    fn test_chain_error_conversion() {
        let err: ContractError = ChainError::Reverted {
            data: Bytes::from(abi::FundMe::FundMe__NotOwner {}.abi_encode()),
        }
        .into();
        assert!(matches!(err, ContractError::NotOwner));

        let err: ContractError = ChainError::Timeout("receipt".to_string()).into();
        assert!(matches!(err, ContractError::Chain(ChainError::Timeout(_))));
    }
}
