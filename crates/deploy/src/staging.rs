//! Fund-and-withdraw smoke test against an existing `FundMe` deployment.

use alloy_core::primitives::{U256, utils::parse_ether};

use crate::{
    chain::{Chain, TxReceipt},
    contracts::{ContractError, FundMe},
};

/// Amount funded by the staging cycle: 0.1 ETH.
pub fn staging_value() -> U256 {
    parse_ether("0.1").unwrap_or_default()
}

/// Outcome of a staging cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingReport {
    pub funded: U256,
    pub fund: TxReceipt,
    pub withdraw: TxReceipt,
    /// Contract balance once the owner withdrew. Zero on success.
    pub ending_balance: U256,
}

impl StagingReport {
    pub fn passed(&self) -> bool {
        self.ending_balance.is_zero()
    }
}

/// Fund `fund_me` with `value`, then withdraw everything as the owner.
pub async fn fund_and_withdraw<C: Chain>(
    chain: &C,
    fund_me: &FundMe<'_, C>,
    value: U256,
) -> Result<StagingReport, ContractError> {
    tracing::info!(address = %fund_me.address(), %value, "Funding...");
    let fund = fund_me.fund(value).await?;

    tracing::info!(address = %fund_me.address(), "Withdrawing...");
    let withdraw = fund_me.withdraw().await?;

    let ending_balance = chain.balance(fund_me.address()).await?;
    tracing::info!(%ending_balance, "Staging cycle finished");

    Ok(StagingReport {
        funded: value,
        fund,
        withdraw,
        ending_balance,
    })
}
