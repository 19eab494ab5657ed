//! Chain access.
//!
//! [`Chain`] is the seam between deployment logic and a network. [`DevChain`] is an
//! in-process development network; [`RpcChain`] talks to a JSON-RPC node.

use std::future::Future;

use alloy_core::{
    primitives::{Address, B256, Bytes, U256},
    sol_types::{Revert, SolError},
};
use serde::{Deserialize, Serialize};

mod dev;
mod remote;

pub use dev::{DEV_ACCOUNT_BALANCE, DEV_GAS_PRICE, DevChain};
pub use remote::RpcChain;

/// Errors raised by a [`Chain`].
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Execution reverted. `data` is the raw revert payload.
    #[error("execution reverted{}", revert_reason(.data).map(|r| format!(": {r}")).unwrap_or_default())]
    Reverted { data: Bytes },
    #[error("insufficient funds for {account}: required {required}, available {available}")]
    InsufficientFunds {
        account: Address,
        required: U256,
        available: U256,
    },
    #[error("no code for contract `{0}` on this network")]
    UnknownContract(String),
    #[error("account {0} cannot sign on this network")]
    UnknownSigner(Address),
    #[error("transaction {0} failed without revert data")]
    Failed(B256),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("{0}")]
    Transport(String),
    #[error("timed out waiting for {0}")]
    Timeout(String),
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Decode an `Error(string)` revert payload.
pub fn revert_reason(data: &[u8]) -> Option<String> {
    Revert::abi_decode(data, true).ok().map(|r| r.reason)
}

/// A value transfer or contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    pub effective_gas_price: u128,
    /// Set for contract creations.
    pub contract_address: Option<Address>,
}

impl TxReceipt {
    /// Fee paid by the sender.
    pub fn gas_cost(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

/// Access to a network.
pub trait Chain: Send + Sync {
    /// The chain ID reported by the network.
    fn chain_id(&self) -> impl Future<Output = Result<u64, ChainError>> + Send;

    /// Accounts this chain can send transactions from, deployer first.
    fn accounts(&self) -> impl Future<Output = Result<Vec<Address>, ChainError>> + Send;

    fn balance(&self, address: Address) -> impl Future<Output = Result<U256, ChainError>> + Send;

    fn block_number(&self) -> impl Future<Output = Result<u64, ChainError>> + Send;

    /// Current gas price in wei.
    fn gas_price(&self) -> impl Future<Output = Result<u128, ChainError>> + Send;

    /// Deploy the named contract with ABI-encoded constructor arguments.
    fn deploy(
        &self,
        from: Address,
        contract: &str,
        constructor_args: Bytes,
    ) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;

    /// Send a transaction and wait for it to be mined.
    fn send(&self, tx: TxRequest) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;

    /// Code deployed at `address`. Empty for accounts without code.
    fn code_at(&self, address: Address) -> impl Future<Output = Result<Bytes, ChainError>> + Send;

    /// Execute a read-only call against the latest state.
    fn call(&self, to: Address, data: Bytes) -> impl Future<Output = Result<Bytes, ChainError>> + Send;

    /// Wait until `receipt` has at least `confirmations` confirmations.
    ///
    /// The block containing the transaction counts as the first confirmation.
    fn wait_for_confirmations(
        &self,
        receipt: &TxReceipt,
        confirmations: u64,
    ) -> impl Future<Output = Result<(), ChainError>> + Send;
}

/// Number of confirmations a transaction mined in `tx_block` has at `latest`.
pub fn confirmations_at(tx_block: u64, latest: u64) -> u64 {
    if latest < tx_block {
        0
    } else {
        latest - tx_block + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_cost() {
        let receipt = TxReceipt {
            transaction_hash: B256::ZERO,
            block_number: 1,
            gas_used: 21_000,
            effective_gas_price: 1_000_000_000,
            contract_address: None,
        };
        assert_eq!(receipt.gas_cost(), U256::from(21_000_000_000_000u64));
    }

    #[test]
    fn test_confirmations_at() {
        assert_eq!(confirmations_at(10, 9), 0);
        assert_eq!(confirmations_at(10, 10), 1);
        assert_eq!(confirmations_at(10, 15), 6);
    }

    #[test]
    fn test_revert_display() {
        let data: Bytes = Revert {
            reason: "You need to spend more ETH!".to_string(),
        }
        .abi_encode()
        .into();
        let err = ChainError::Reverted { data };
        assert_eq!(
            err.to_string(),
            "execution reverted: You need to spend more ETH!"
        );

        let err = ChainError::Reverted { data: Bytes::new() };
        assert_eq!(err.to_string(), "execution reverted");
    }
}
