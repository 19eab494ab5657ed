//! Process settings: defaults, an optional `FundMe.toml`, then the environment.

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::network::{NetworkDefinition, Transport};

/// The default name for the settings file.
pub const SETTINGS_FILENAME: &str = "FundMe.toml";

/// Unprefixed variables read as-is, for compatibility with existing `.env` files.
const RAW_ENV_KEYS: &[&str] = &[
    "PRIVATE_KEY",
    "GOERLI_RPC_URL",
    "ETHERSCAN_API_KEY",
    "COINMARKETCAP_API_KEY",
];

const REDACTED: &str = "<redacted>";

/// Gas reporter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasReporterConfig {
    pub enabled: bool,
    /// File the report is written to. Printed to stdout when unset.
    pub output_file: Option<PathBuf>,
    pub no_colors: bool,
    /// Fiat currency used for cost estimates.
    pub currency: String,
}

impl Default for GasReporterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_file: Some(PathBuf::from("gas-report.txt")),
            no_colors: true,
            currency: "USD".to_string(),
        }
    }
}

/// Settings shared by every command.
///
/// Secrets are optional. Without a private key, transactions are sent from the
/// accounts unlocked on the node, which only makes sense for local networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Hex-encoded deployer private key.
    pub private_key: Option<String>,
    /// RPC endpoint for the goerli network.
    pub goerli_rpc_url: Option<String>,
    /// Block explorer API key. Verification only runs when this is set.
    pub etherscan_api_key: Option<String>,
    /// CoinMarketCap API key, used for fiat gas cost estimates.
    pub coinmarketcap_api_key: Option<String>,
    /// Root of the persisted deployment records.
    pub deployments_dir: PathBuf,
    /// Root of the compiled contract artifacts.
    pub artifacts_dir: PathBuf,
    pub gas_reporter: GasReporterConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            private_key: None,
            goerli_rpc_url: None,
            etherscan_api_key: None,
            coinmarketcap_api_key: None,
            deployments_dir: PathBuf::from("deployments"),
            artifacts_dir: PathBuf::from("artifacts"),
            gas_reporter: GasReporterConfig::default(),
        }
    }
}

impl Settings {
    /// Build the provider chain: defaults, then the settings file, then the environment.
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILENAME));

        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::raw().only(RAW_ENV_KEYS))
            .merge(Env::prefixed("FUNDME_").split("__"))
    }

    /// Extract settings from a figment, treating empty secrets as absent.
    pub fn from_figment(figment: &Figment) -> Result<Self, figment::Error> {
        let settings: Self = figment.extract()?;
        Ok(settings.normalized())
    }

    /// Load settings from the default providers.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let settings = Self::from_figment(&Self::figment(path)).context("Failed to load settings")?;
        tracing::debug!(
            has_private_key = settings.private_key.is_some(),
            verification = settings.etherscan_api_key.is_some(),
            deployments_dir = %settings.deployments_dir.display(),
            "Settings loaded"
        );
        Ok(settings)
    }

    fn normalized(mut self) -> Self {
        for secret in [
            &mut self.private_key,
            &mut self.goerli_rpc_url,
            &mut self.etherscan_api_key,
            &mut self.coinmarketcap_api_key,
        ] {
            if secret.as_deref().is_some_and(|s| s.trim().is_empty()) {
                *secret = None;
            }
        }
        self
    }

    /// RPC URL for a network, honouring per-network overrides.
    ///
    /// Returns `None` for the in-process network.
    pub fn rpc_url(&self, network: &NetworkDefinition) -> anyhow::Result<Option<Url>> {
        let Transport::Rpc { default_url } = network.transport else {
            return Ok(None);
        };

        let url = match network.name {
            "goerli" => self.goerli_rpc_url.as_deref().unwrap_or(default_url),
            _ => default_url,
        };

        Url::parse(url)
            .map(Some)
            .with_context(|| format!("Invalid RPC URL for network {}: {}", network.name, url))
    }

    /// The effective settings as TOML, with secrets masked.
    pub fn to_redacted_toml(&self) -> anyhow::Result<String> {
        let mut redacted = self.clone();
        for secret in [
            &mut redacted.private_key,
            &mut redacted.etherscan_api_key,
            &mut redacted.coinmarketcap_api_key,
        ] {
            if secret.is_some() {
                *secret = Some(REDACTED.to_string());
            }
        }
        redacted.goerli_rpc_url = redacted.goerli_rpc_url.as_deref().map(redact_url);
        toml::to_string_pretty(&redacted).context("Failed to serialize settings")
    }
}

/// Keep only the origin of an endpoint. Provider URLs embed API keys.
fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(url) if url.has_host() => {
            format!("{}/{REDACTED}", url.origin().ascii_serialization())
        }
        _ => REDACTED.to_string(),
    }
}
