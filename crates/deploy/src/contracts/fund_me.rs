use alloy_core::primitives::{Address, U256};

use super::{ContractError, FUND_ME, Instance, abi};
use crate::{
    chain::{Chain, TxReceipt},
    gas::GasReporter,
};

/// Binding for a deployed `FundMe` contract.
#[derive(Debug)]
pub struct FundMe<'a, C> {
    inner: Instance<'a, C>,
}

impl<C> Clone for FundMe<'_, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, C: Chain> FundMe<'a, C> {
    /// Bind to the contract at `address`, sending transactions from `signer`.
    pub fn at(chain: &'a C, address: Address, signer: Address) -> Self {
        Self {
            inner: Instance::new(chain, FUND_ME, address, signer),
        }
    }

    /// The same contract, sending from another account.
    pub fn connect(&self, signer: Address) -> Self {
        let mut inner = self.inner.clone();
        inner.signer = signer;
        Self { inner }
    }

    /// Record the gas used by transactions sent through this binding.
    pub fn with_gas_reporter(mut self, reporter: &'a GasReporter) -> Self {
        self.inner.gas_reporter = Some(reporter);
        self
    }

    pub fn address(&self) -> Address {
        self.inner.address
    }

    pub fn signer(&self) -> Address {
        self.inner.signer
    }

    /// Fund the contract with `value` wei.
    ///
    /// Reverts with "You need to spend more ETH!" when `value` is worth less than
    /// [`Self::minimum_usd`].
    pub async fn fund(&self, value: U256) -> Result<TxReceipt, ContractError> {
        self.inner.transact(abi::FundMe::fundCall {}, value).await
    }

    /// Send the whole balance to the owner. Owner only.
    pub async fn withdraw(&self) -> Result<TxReceipt, ContractError> {
        self.inner
            .transact(abi::FundMe::withdrawCall {}, U256::ZERO)
            .await
    }

    /// Same as [`Self::withdraw`], reading the funders list once.
    pub async fn cheaper_withdraw(&self) -> Result<TxReceipt, ContractError> {
        self.inner
            .transact(abi::FundMe::cheaperWithdrawCall {}, U256::ZERO)
            .await
    }

    pub async fn get_owner(&self) -> Result<Address, ContractError> {
        Ok(self.inner.view(abi::FundMe::getOwnerCall {}).await?._0)
    }

    pub async fn get_funder(&self, index: u64) -> Result<Address, ContractError> {
        let call = abi::FundMe::getFunderCall {
            index: U256::from(index),
        };
        Ok(self.inner.view(call).await?._0)
    }

    pub async fn get_funded_amount_from_address(
        &self,
        funder: Address,
    ) -> Result<U256, ContractError> {
        let call = abi::FundMe::getFundedAmountFromAddressCall { funder };
        Ok(self.inner.view(call).await?._0)
    }

    pub async fn get_price_feed(&self) -> Result<Address, ContractError> {
        Ok(self.inner.view(abi::FundMe::getPriceFeedCall {}).await?._0)
    }

    pub async fn get_version(&self) -> Result<U256, ContractError> {
        Ok(self.inner.view(abi::FundMe::getVersionCall {}).await?._0)
    }

    /// Minimum contribution in USD, with 18 decimals.
    pub async fn minimum_usd(&self) -> Result<U256, ContractError> {
        Ok(self.inner.view(abi::FundMe::MINIMUM_USDCall {}).await?._0)
    }
}
