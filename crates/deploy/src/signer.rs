//! Local transaction signing for networks without unlocked accounts.

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_core::primitives::{Bytes, PrimitiveSignature};
use alloy_eips::eip2718::Encodable2718;
use alloy_signer::SignerSync;
use anyhow::Context;

pub use alloy_signer_local::PrivateKeySigner;

use crate::chain::ChainError;

/// Parse a hex private key, with or without `0x`.
pub fn parse_private_key(private_key: &str) -> anyhow::Result<PrivateKeySigner> {
    private_key
        .trim()
        .parse::<PrivateKeySigner>()
        .context("Invalid secp256k1 private key")
}

/// Sign `tx` with EIP-155 replay protection, returning the raw transaction for
/// `eth_sendRawTransaction`.
///
/// `tx.chain_id` must be set.
pub fn sign_legacy(signer: &PrivateKeySigner, tx: TxLegacy) -> Result<Bytes, ChainError> {
    if tx.chain_id.is_none() {
        return Err(ChainError::Signing(
            "legacy transaction without chain ID".to_string(),
        ));
    }

    let hash = SignableTransaction::<PrimitiveSignature>::signature_hash(&tx);
    let signature = signer
        .sign_hash_sync(&hash)
        .map_err(|e| ChainError::Signing(e.to_string()))?;

    let envelope = TxEnvelope::from(tx.into_signed(signature));
    Ok(envelope.encoded_2718().into())
}
