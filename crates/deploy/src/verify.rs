//! Source verification on Etherscan-compatible explorers.

use std::{future::Future, time::Duration};

use alloy_core::primitives::{Address, Bytes};
use serde::Deserialize;
use url::Url;

use crate::artifacts::ArtifactStore;

/// Delay between verification status checks.
const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Number of status checks before giving up.
const STATUS_POLL_ATTEMPTS: u32 = 24;

const PENDING: &str = "Pending in queue";
const VERIFIED: &str = "Pass - Verified";

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The explorer rejected the submission or the verification failed.
    #[error("{0}")]
    Explorer(String),
    #[error("explorer request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to load compiler output for {contract}: {message}")]
    Artifacts { contract: String, message: String },
    #[error("verification of {0} still pending after {STATUS_POLL_ATTEMPTS} checks")]
    Timeout(String),
}

impl VerifyError {
    /// The explorer reports the source as verified already.
    pub fn is_already_verified(&self) -> bool {
        self.to_string().to_lowercase().contains("already verified")
    }
}

/// Publishes contract sources to a block explorer.
pub trait Verifier: Send + Sync {
    /// Verify `contract` deployed at `address` with ABI-encoded `constructor_args`.
    fn verify(
        &self,
        contract: &str,
        address: Address,
        constructor_args: &Bytes,
    ) -> impl Future<Output = Result<(), VerifyError>> + Send;
}

/// Verify a contract, treating "already verified" as success.
pub async fn verify_contract<V: Verifier>(
    verifier: &V,
    contract: &str,
    address: Address,
    constructor_args: &Bytes,
) -> Result<(), VerifyError> {
    tracing::info!(contract, %address, "Verifying contract...");

    match verifier.verify(contract, address, constructor_args).await {
        Ok(()) => {
            tracing::info!(contract, %address, "Contract verified");
            Ok(())
        }
        Err(e) if e.is_already_verified() => {
            tracing::info!(contract, %address, "Already verified!");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Explorer endpoint and credentials.
#[derive(Debug, Clone)]
pub struct EtherscanConfig {
    pub api_url: Url,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    message: String,
    result: String,
}

impl EtherscanResponse {
    fn into_result(self) -> Result<String, VerifyError> {
        if self.status == "1" {
            Ok(self.result)
        } else {
            Err(VerifyError::Explorer(format!("{}: {}", self.message, self.result)))
        }
    }
}

/// Etherscan `verifysourcecode` client using Hardhat build info.
#[derive(Debug, Clone)]
pub struct Etherscan {
    client: reqwest::Client,
    config: EtherscanConfig,
    artifacts: ArtifactStore,
    poll_interval: Duration,
}

impl Etherscan {
    pub fn new(config: EtherscanConfig, artifacts: ArtifactStore) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            artifacts,
            poll_interval: STATUS_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn request(&self, form: &[(&str, &str)]) -> Result<String, VerifyError> {
        let response: EtherscanResponse = self
            .client
            .post(self.config.api_url.clone())
            .form(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response.into_result()
    }

    async fn submit(
        &self,
        contract: &str,
        address: Address,
        constructor_args: &Bytes,
    ) -> Result<String, VerifyError> {
        let artifacts_error = |e: anyhow::Error| VerifyError::Artifacts {
            contract: contract.to_string(),
            message: format!("{e:#}"),
        };
        let artifact = self.artifacts.artifact(contract).map_err(artifacts_error)?;
        let build_info = self.artifacts.build_info(contract).map_err(artifacts_error)?;

        let source_code = build_info.input.to_string();
        let contract_name = artifact.fully_qualified_name();
        let compiler_version = format!("v{}", build_info.solc_long_version);
        let contract_address = address.to_string();
        let constructor_arguments = hex::encode(constructor_args);

        self.request(&[
            ("apikey", self.config.api_key.as_str()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", contract_address.as_str()),
            ("sourceCode", source_code.as_str()),
            ("codeformat", "solidity-standard-json-input"),
            ("contractname", contract_name.as_str()),
            ("compilerversion", compiler_version.as_str()),
            // Misspelled in the Etherscan API
            ("constructorArguements", constructor_arguments.as_str()),
        ])
        .await
    }

    async fn wait_for_status(&self, contract: &str, guid: &str) -> Result<(), VerifyError> {
        for _ in 0..STATUS_POLL_ATTEMPTS {
            tokio::time::sleep(self.poll_interval).await;

            let status = self
                .request(&[
                    ("apikey", self.config.api_key.as_str()),
                    ("module", "contract"),
                    ("action", "checkverifystatus"),
                    ("guid", guid),
                ])
                .await;

            match status {
                Ok(result) if result == VERIFIED => return Ok(()),
                Ok(result) => return Err(VerifyError::Explorer(result)),
                Err(VerifyError::Explorer(message)) if message.contains(PENDING) => {
                    tracing::debug!(contract, guid, "Verification pending");
                }
                Err(e) => return Err(e),
            }
        }

        Err(VerifyError::Timeout(contract.to_string()))
    }
}

impl Verifier for Etherscan {
    async fn verify(
        &self,
        contract: &str,
        address: Address,
        constructor_args: &Bytes,
    ) -> Result<(), VerifyError> {
        let guid = self.submit(contract, address, constructor_args).await?;
        tracing::debug!(contract, %address, %guid, "Verification submitted");
        self.wait_for_status(contract, &guid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::address;
    use std::sync::Mutex;

    struct Scripted(Mutex<Option<VerifyError>>);

    impl Verifier for Scripted {
        async fn verify(&self, _: &str, _: Address, _: &Bytes) -> Result<(), VerifyError> {
            match self.0.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    const ADDRESS: Address = address!("e7f1725e7734ce288f8367e1bb143e90bb3f0512");

    #[tokio::test]
    async fn test_already_verified_is_suppressed() {
        let verifier = Scripted(Mutex::new(Some(VerifyError::Explorer(
            "NOTOK: Contract source code Already Verified".to_string(),
        ))));
        verify_contract(&verifier, "FundMe", ADDRESS, &Bytes::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_other_errors_are_returned() {
        let verifier = Scripted(Mutex::new(Some(VerifyError::Explorer(
            "NOTOK: Invalid API Key".to_string(),
        ))));
        let err = verify_contract(&verifier, "FundMe", ADDRESS, &Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "NOTOK: Invalid API Key");
    }

    #[test]
    fn test_response_status() {
        let ok: EtherscanResponse = serde_json::from_str(
            r#"{"status":"1","message":"OK","result":"ezq878u486pzijkvvmerl6a9mzwhv6sefgvqi5tkwceejc7tvn"}"#,
        )
        .unwrap();
        assert_eq!(
            ok.into_result().unwrap(),
            "ezq878u486pzijkvvmerl6a9mzwhv6sefgvqi5tkwceejc7tvn"
        );

        let pending: EtherscanResponse = serde_json::from_str(
            r#"{"status":"0","message":"NOTOK","result":"Pending in queue"}"#,
        )
        .unwrap();
        let err = pending.into_result().unwrap_err();
        assert!(err.to_string().contains(PENDING));
        assert!(!err.is_already_verified());
    }
}
