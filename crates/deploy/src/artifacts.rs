//! Compiled contract artifacts in the Hardhat layout.
//!
//! ```text
//! artifacts/
//!   build-info/<hash>.json
//!   contracts/FundMe.sol/FundMe.json
//!   contracts/FundMe.sol/FundMe.dbg.json
//! ```

use std::path::{Path, PathBuf};

use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// A compiled contract.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    /// Source path relative to the project root, e.g. `contracts/FundMe.sol`.
    pub source_name: String,
    pub abi: Value,
    /// Creation bytecode.
    pub bytecode: Bytes,
}

impl Artifact {
    /// `<source>:<name>`, as expected by block explorers.
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }
}

/// Compiler input and version for a set of artifacts.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub solc_version: String,
    /// Version including the commit, e.g. `0.8.17+commit.8df45f5f`.
    pub solc_long_version: String,
    /// Standard JSON input passed to the compiler.
    pub input: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: PathBuf,
}

/// Reads artifacts from a directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load the artifact of a contract by name.
    pub fn artifact(&self, contract: &str) -> Result<Artifact> {
        let path = self.artifact_path(contract)?;
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))
    }

    /// Load the build info a contract was compiled with.
    pub fn build_info(&self, contract: &str) -> Result<BuildInfo> {
        let artifact_path = self.artifact_path(contract)?;
        let dbg_path = artifact_path.with_extension("dbg.json");
        let dbg: DebugFile = serde_json::from_str(
            &std::fs::read_to_string(&dbg_path)
                .with_context(|| format!("Failed to read {}", dbg_path.display()))?,
        )
        .with_context(|| format!("Failed to parse {}", dbg_path.display()))?;

        // The build info path is relative to the debug file
        let parent = dbg_path
            .parent()
            .context("Debug file path must have a parent directory")?;
        let build_info_path = parent.join(dbg.build_info);

        serde_json::from_str(
            &std::fs::read_to_string(&build_info_path)
                .with_context(|| format!("Failed to read {}", build_info_path.display()))?,
        )
        .with_context(|| format!("Failed to parse {}", build_info_path.display()))
    }

    /// Find `<contract>.json` under `<root>/contracts`, searching nested source directories.
    fn artifact_path(&self, contract: &str) -> Result<PathBuf> {
        let file_name = format!("{contract}.json");
        let contracts_dir = self.root.join("contracts");

        let mut pending = vec![contracts_dir.clone()];
        while let Some(dir) = pending.pop() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if dir == contracts_dir => {
                    return Err(e).with_context(|| {
                        format!("Failed to read artifacts directory {}", dir.display())
                    });
                }
                Err(_) => continue,
            };

            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if path.file_name().is_some_and(|n| n == file_name.as_str()) {
                    return Ok(path);
                }
            }
        }

        anyhow::bail!(
            "No artifact for contract {} under {}",
            contract,
            contracts_dir.display()
        )
    }
}
