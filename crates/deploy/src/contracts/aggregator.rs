use alloy_core::primitives::{Address, I256, U256};

use super::{ContractError, Instance, MOCK_V3_AGGREGATOR, abi};
use crate::chain::{Chain, TxReceipt};

/// Binding for a deployed `MockV3Aggregator` price feed.
#[derive(Debug)]
pub struct MockV3Aggregator<'a, C> {
    inner: Instance<'a, C>,
}

impl<'a, C: Chain> MockV3Aggregator<'a, C> {
    pub fn at(chain: &'a C, address: Address, signer: Address) -> Self {
        Self {
            inner: Instance::new(chain, MOCK_V3_AGGREGATOR, address, signer),
        }
    }

    pub fn address(&self) -> Address {
        self.inner.address
    }

    pub async fn decimals(&self) -> Result<u8, ContractError> {
        Ok(self.inner.view(abi::MockV3Aggregator::decimalsCall {}).await?._0)
    }

    pub async fn version(&self) -> Result<U256, ContractError> {
        Ok(self.inner.view(abi::MockV3Aggregator::versionCall {}).await?._0)
    }

    pub async fn latest_answer(&self) -> Result<I256, ContractError> {
        Ok(self
            .inner
            .view(abi::MockV3Aggregator::latestAnswerCall {})
            .await?
            ._0)
    }

    pub async fn latest_round(&self) -> Result<U256, ContractError> {
        Ok(self
            .inner
            .view(abi::MockV3Aggregator::latestRoundCall {})
            .await?
            ._0)
    }

    /// Round ID, answer and timestamps of the latest round.
    pub async fn latest_round_data(
        &self,
    ) -> Result<abi::MockV3Aggregator::latestRoundDataReturn, ContractError> {
        self.inner
            .view(abi::MockV3Aggregator::latestRoundDataCall {})
            .await
    }

    /// Publish a new answer, starting a new round.
    pub async fn update_answer(&self, answer: I256) -> Result<TxReceipt, ContractError> {
        self.inner
            .transact(abi::MockV3Aggregator::updateAnswerCall { answer }, U256::ZERO)
            .await
    }
}
