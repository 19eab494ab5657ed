//! Records of deployed contracts, one per contract name.
//!
//! On live networks records are written to `<dir>/<network>/<Contract>.json`
//! next to a `.chainId` file, so later runs reuse what is already deployed.
//! Development networks keep them in memory for the lifetime of the process.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::chain::TxReceipt;

const CHAIN_ID_FILE: &str = ".chainId";

/// A deployed contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    #[serde(serialize_with = "serialize_checksummed")]
    pub address: Address,
    /// Constructor arguments, human readable.
    pub args: Vec<String>,
    /// ABI-encoded constructor arguments.
    pub constructor_args: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
}

impl DeploymentRecord {
    /// Build a record from the receipt of a contract creation.
    pub fn from_receipt(
        receipt: &TxReceipt,
        args: Vec<String>,
        constructor_args: Bytes,
    ) -> Result<Self> {
        let address = receipt.contract_address.with_context(|| {
            format!(
                "Transaction {} did not create a contract",
                receipt.transaction_hash
            )
        })?;

        Ok(Self {
            address,
            args,
            constructor_args,
            transaction_hash: Some(receipt.transaction_hash),
            block_number: Some(receipt.block_number),
            gas_used: Some(receipt.gas_used),
        })
    }
}

/// Addresses are written in their EIP-55 checksummed form.
fn serialize_checksummed<S: serde::Serializer>(
    address: &Address,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&address.to_checksum(None))
}

/// Deployment records for one network.
#[derive(Debug)]
pub struct DeploymentStore {
    /// `None` keeps records in memory only.
    dir: Option<PathBuf>,
    records: BTreeMap<String, DeploymentRecord>,
}

impl DeploymentStore {
    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            records: BTreeMap::new(),
        }
    }

    /// Open the store for `network` under `root`.
    ///
    /// Records written for another chain ID are discarded.
    pub fn open(root: &Path, network: &str, chain_id: u64) -> Result<Self> {
        let dir = root.join(network);
        let mut records = BTreeMap::new();

        if dir.exists() {
            match read_chain_id(&dir)? {
                Some(stored) if stored != chain_id => {
                    tracing::warn!(
                        network,
                        stored,
                        chain_id,
                        "Chain ID changed, discarding previous deployments"
                    );
                    clear_records(&dir)?;
                }
                _ => records = load_records(&dir)?,
            }
        }

        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create deployments directory {}", dir.display()))?;
        std::fs::write(dir.join(CHAIN_ID_FILE), chain_id.to_string())
            .with_context(|| format!("Failed to write {CHAIN_ID_FILE} in {}", dir.display()))?;

        tracing::debug!(
            path = %dir.display(),
            count = records.len(),
            "Opened deployments store"
        );

        Ok(Self {
            dir: Some(dir),
            records,
        })
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn get(&self, contract: &str) -> Option<&DeploymentRecord> {
        self.records.get(contract)
    }

    /// Names of all recorded contracts, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Record a deployment, replacing any previous record with the same name.
    pub fn save(&mut self, contract: &str, record: DeploymentRecord) -> Result<()> {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{contract}.json"));
            let content = serde_json::to_string_pretty(&record)
                .context("Failed to serialize deployment record")?;
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        self.records.insert(contract.to_string(), record);
        Ok(())
    }
}

fn read_chain_id(dir: &Path) -> Result<Option<u64>> {
    let path = dir.join(CHAIN_ID_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let chain_id = content
        .trim()
        .parse()
        .with_context(|| format!("Invalid chain ID in {}", path.display()))?;
    Ok(Some(chain_id))
}

fn record_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read deployments directory {}", dir.display()))?;
    Ok(entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect())
}

fn load_records(dir: &Path) -> Result<BTreeMap<String, DeploymentRecord>> {
    let mut records = BTreeMap::new();
    for path in record_paths(dir)? {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let record = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse deployment record {}", path.display()))?;
        records.insert(name.to_string(), record);
    }
    Ok(records)
}

fn clear_records(dir: &Path) -> Result<()> {
    for path in record_paths(dir)? {
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}
