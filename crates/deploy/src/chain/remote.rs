//! JSON-RPC backed chain.

use std::time::Duration;

use alloy_consensus::TxLegacy;
use alloy_core::primitives::{Address, B256, Bytes, TxKind, U64, U128, U256};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use url::Url;

use super::{Chain, ChainError, TxReceipt, TxRequest, confirmations_at};
use crate::{
    artifacts::ArtifactStore,
    rpc::{create_client, json_rpc_call, poll_until},
    signer::{PrivateKeySigner, sign_legacy},
};

/// How long to wait for a transaction to be mined.
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(300);

/// How long to wait for each additional confirmation.
const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default polling interval for receipts and block numbers.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Headroom added on top of the node's gas estimate, in percent.
const GAS_LIMIT_MARGIN: u64 = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_number: U64,
    gas_used: U64,
    #[serde(default)]
    effective_gas_price: Option<U128>,
    #[serde(default)]
    contract_address: Option<Address>,
    #[serde(default)]
    status: Option<U64>,
}

/// A chain reached over JSON-RPC.
///
/// With a [`PrivateKeySigner`] every transaction is signed locally and sent with
/// `eth_sendRawTransaction`. Without one the node's unlocked accounts are used
/// through `eth_sendTransaction`.
#[derive(Debug)]
pub struct RpcChain {
    client: reqwest::Client,
    url: Url,
    signer: Option<PrivateKeySigner>,
    artifacts: ArtifactStore,
    chain_id: OnceCell<u64>,
    poll_interval: Duration,
}

impl RpcChain {
    pub fn new(url: Url, artifacts: ArtifactStore) -> Result<Self, ChainError> {
        Ok(Self {
            client: create_client()?,
            url,
            signer: None,
            artifacts,
            chain_id: OnceCell::new(),
            poll_interval: POLL_INTERVAL,
        })
    }

    /// Sign transactions locally with `signer`.
    pub fn with_signer(mut self, signer: PrivateKeySigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn rpc<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, ChainError> {
        json_rpc_call(&self.client, self.url.as_str(), method, params).await
    }

    async fn estimate_gas(&self, tx: &Value) -> Result<u64, ChainError> {
        let estimate: U64 = self.rpc("eth_estimateGas", vec![tx.clone()]).await?;
        let estimate = estimate.to::<u64>();
        Ok(estimate + estimate * GAS_LIMIT_MARGIN / 100)
    }

    /// Submit a transaction and wait for its receipt.
    ///
    /// The gas estimate runs first, so a reverting transaction fails with its
    /// revert data before anything is broadcast.
    async fn submit(
        &self,
        from: Address,
        to: Option<Address>,
        value: U256,
        input: Bytes,
    ) -> Result<TxReceipt, ChainError> {
        let mut tx = json!({
            "from": from,
            "value": value,
            "data": input,
        });
        if let Some(to) = to {
            tx["to"] = json!(to);
        }
        let gas_limit = self.estimate_gas(&tx).await?;

        let tx_hash: B256 = match &self.signer {
            Some(signer) => {
                if signer.address() != from {
                    return Err(ChainError::UnknownSigner(from));
                }

                let nonce: U64 = self
                    .rpc("eth_getTransactionCount", vec![json!(from), json!("pending")])
                    .await?;
                let gas_price = self.gas_price().await?;

                let tx = TxLegacy {
                    chain_id: Some(self.chain_id().await?),
                    nonce: nonce.to(),
                    gas_price,
                    gas_limit,
                    to: TxKind::from(to),
                    value,
                    input,
                };
                let raw = sign_legacy(signer, tx)?;
                self.rpc("eth_sendRawTransaction", vec![json!(raw)]).await?
            }
            None => {
                tx["gas"] = json!(U64::from(gas_limit));
                self.rpc("eth_sendTransaction", vec![tx]).await?
            }
        };

        tracing::debug!(%tx_hash, %from, "Transaction sent, waiting for receipt");
        self.wait_for_receipt(tx_hash).await
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt, ChainError> {
        let name = format!("receipt of {tx_hash}");
        let receipt: RpcReceipt =
            poll_until(&name, RECEIPT_TIMEOUT, self.poll_interval, move || async move {
                self.rpc::<Option<RpcReceipt>>("eth_getTransactionReceipt", vec![json!(tx_hash)])
                    .await
            })
            .await?;

        if receipt.status.is_some_and(|status| status.is_zero()) {
            return Err(ChainError::Failed(receipt.transaction_hash));
        }

        Ok(TxReceipt {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number.to(),
            gas_used: receipt.gas_used.to(),
            effective_gas_price: receipt
                .effective_gas_price
                .map(|price| price.to())
                .unwrap_or_default(),
            contract_address: receipt.contract_address,
        })
    }
}

impl Chain for RpcChain {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.chain_id
            .get_or_try_init(|| async move {
                let chain_id: U64 = self.rpc("eth_chainId", vec![]).await?;
                Ok(chain_id.to())
            })
            .await
            .copied()
    }

    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        match &self.signer {
            Some(signer) => Ok(vec![signer.address()]),
            None => self.rpc("eth_accounts", vec![]).await,
        }
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        self.rpc("eth_getBalance", vec![json!(address), json!("latest")])
            .await
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let block: U64 = self.rpc("eth_blockNumber", vec![]).await?;
        Ok(block.to())
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        let gas_price: U128 = self.rpc("eth_gasPrice", vec![]).await?;
        Ok(gas_price.to())
    }

    async fn deploy(
        &self,
        from: Address,
        contract: &str,
        constructor_args: Bytes,
    ) -> Result<TxReceipt, ChainError> {
        let artifact = self.artifacts.artifact(contract).map_err(|e| {
            tracing::warn!(contract, error = %e, "Failed to load artifact");
            ChainError::UnknownContract(contract.to_string())
        })?;

        let mut input = artifact.bytecode.to_vec();
        input.extend_from_slice(&constructor_args);

        let receipt = self.submit(from, None, U256::ZERO, input.into()).await?;
        if receipt.contract_address.is_none() {
            return Err(ChainError::Transport(format!(
                "Receipt of {} has no contract address",
                receipt.transaction_hash
            )));
        }
        Ok(receipt)
    }

    async fn send(&self, tx: TxRequest) -> Result<TxReceipt, ChainError> {
        self.submit(tx.from, Some(tx.to), tx.value, tx.data).await
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ChainError> {
        self.rpc("eth_getCode", vec![json!(address), json!("latest")])
            .await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        self.rpc(
            "eth_call",
            vec![json!({ "to": to, "data": data }), json!("latest")],
        )
        .await
    }

    async fn wait_for_confirmations(
        &self,
        receipt: &TxReceipt,
        confirmations: u64,
    ) -> Result<(), ChainError> {
        if confirmations <= 1 {
            return Ok(());
        }

        tracing::info!(
            tx_hash = %receipt.transaction_hash,
            confirmations,
            "Waiting for block confirmations"
        );

        let name = format!("{confirmations} confirmations of {}", receipt.transaction_hash);
        let timeout = CONFIRMATION_TIMEOUT.saturating_mul(confirmations_factor(confirmations));
        poll_until(&name, timeout, self.poll_interval, move || async move {
            let latest = self.block_number().await?;
            let reached = confirmations_at(receipt.block_number, latest) >= confirmations;
            Ok(reached.then_some(()))
        })
        .await
    }
}

/// Multiplier for the per-confirmation timeout, saturating at `u32::MAX`.
fn confirmations_factor(confirmations: u64) -> u32 {
    u32::try_from(confirmations).unwrap_or(u32::MAX)
}
