//! Gas usage reporting.

use std::{collections::BTreeMap, path::Path, sync::Mutex};

use anyhow::{Context, Result};
use comfy_table::{Cell, Table, presets};
use serde_json::Value;

use crate::{chain::Chain, rpc::create_client, settings::GasReporterConfig};

const COINMARKETCAP_QUOTES_URL: &str =
    "https://pro-api.coinmarketcap.com/v1/cryptocurrency/quotes/latest";

/// Method name used for contract deployments.
pub const DEPLOYMENT: &str = "deployment";

/// Gas statistics for one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasStats {
    pub calls: usize,
    pub min: u64,
    pub max: u64,
    pub avg: u64,
}

impl GasStats {
    fn from_samples(samples: &[u64]) -> Option<Self> {
        let min = *samples.iter().min()?;
        let max = *samples.iter().max()?;
        let total: u128 = samples.iter().map(|&g| u128::from(g)).sum();
        Some(Self {
            calls: samples.len(),
            min,
            max,
            avg: (total / samples.len() as u128) as u64,
        })
    }
}

/// Pricing used to convert gas into fiat.
#[derive(Debug, Clone, PartialEq)]
pub struct GasPricing {
    pub gas_price_wei: u128,
    /// Price of one ETH in the reporter currency.
    pub eth_price: f64,
}

impl GasPricing {
    fn cost(&self, gas: u64) -> f64 {
        let wei = gas as f64 * self.gas_price_wei as f64;
        wei / 1e18 * self.eth_price
    }
}

/// Collects gas used per contract method.
#[derive(Debug, Default)]
pub struct GasReporter {
    config: GasReporterConfig,
    samples: Mutex<BTreeMap<(String, String), Vec<u64>>>,
}

impl GasReporter {
    pub fn new(config: GasReporterConfig) -> Self {
        Self {
            config,
            samples: Mutex::default(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Record one transaction. No-op when the reporter is disabled.
    pub fn record(&self, contract: &str, method: &str, gas_used: u64) {
        if !self.config.enabled {
            return;
        }

        let mut samples = match self.samples.lock() {
            Ok(samples) => samples,
            Err(poisoned) => poisoned.into_inner(),
        };
        samples
            .entry((contract.to_string(), method.to_string()))
            .or_default()
            .push(gas_used);
    }

    /// Statistics for a method, if it was recorded.
    pub fn stats(&self, contract: &str, method: &str) -> Option<GasStats> {
        let samples = self.samples.lock().ok()?;
        samples
            .get(&(contract.to_string(), method.to_string()))
            .and_then(|s| GasStats::from_samples(s))
    }

    /// Render the report as a table.
    pub fn render(&self, pricing: Option<&GasPricing>) -> String {
        let mut table = Table::new();
        if self.config.no_colors {
            table.load_preset(presets::ASCII_FULL);
        } else {
            table.load_preset(presets::UTF8_FULL);
        }

        let mut header = vec!["Contract", "Method", "Calls", "Min", "Max", "Avg"];
        let cost_header = format!("{} (avg)", self.config.currency);
        if pricing.is_some() {
            header.push(&cost_header);
        }
        table.set_header(header);

        let samples = match self.samples.lock() {
            Ok(samples) => samples,
            Err(poisoned) => poisoned.into_inner(),
        };
        for ((contract, method), gas) in samples.iter() {
            let Some(stats) = GasStats::from_samples(gas) else {
                continue;
            };
            let mut row = vec![
                Cell::new(contract),
                Cell::new(method),
                Cell::new(stats.calls),
                Cell::new(stats.min),
                Cell::new(stats.max),
                Cell::new(stats.avg),
            ];
            if let Some(pricing) = pricing {
                row.push(Cell::new(format!("{:.2}", pricing.cost(stats.avg))));
            }
            table.add_row(row);
        }

        table.to_string()
    }

    /// Write the report to the configured output file, or stdout.
    pub fn write_report(&self, pricing: Option<&GasPricing>) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let report = self.render(pricing);
        match &self.config.output_file {
            Some(path) => write_file(path, &report)?,
            None => println!("{report}"),
        }
        Ok(())
    }
}

fn write_file(path: &Path, report: &str) -> Result<()> {
    std::fs::write(path, report)
        .with_context(|| format!("Failed to write gas report to {}", path.display()))?;
    tracing::info!(path = %path.display(), "Gas report written");
    Ok(())
}

/// Fiat pricing for the report: the chain's gas price and the ETH quote.
///
/// Pricing is optional, so failures are logged and yield `None`.
pub async fn fetch_pricing<C: Chain>(chain: &C, api_key: &str, currency: &str) -> Option<GasPricing> {
    fetch_pricing_from(COINMARKETCAP_QUOTES_URL, chain, api_key, currency).await
}

async fn fetch_pricing_from<C: Chain>(
    quotes_url: &str,
    chain: &C,
    api_key: &str,
    currency: &str,
) -> Option<GasPricing> {
    let eth_price = match fetch_eth_price_from(quotes_url, api_key, currency).await {
        Ok(price) => price,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "No ETH price, gas report without fiat costs");
            return None;
        }
    };
    let gas_price_wei = match chain.gas_price().await {
        Ok(price) => price,
        Err(e) => {
            tracing::warn!(error = %e, "No gas price, gas report without fiat costs");
            return None;
        }
    };
    Some(GasPricing {
        gas_price_wei,
        eth_price,
    })
}

/// Fetch the current ETH price from a CoinMarketCap quotes endpoint.
async fn fetch_eth_price_from(quotes_url: &str, api_key: &str, currency: &str) -> Result<f64> {
    let client = create_client()?;
    let response: Value = client
        .get(quotes_url)
        .header("X-CMC_PRO_API_KEY", api_key)
        .query(&[("symbol", "ETH"), ("convert", currency)])
        .send()
        .await
        .context("Failed to send CoinMarketCap request")?
        .json()
        .await
        .context("Failed to parse CoinMarketCap response")?;

    response["data"]["ETH"]["quote"][currency]["price"]
        .as_f64()
        .with_context(|| format!("No ETH/{currency} price in CoinMarketCap response"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::DevChain;
    use tempdir::TempDir;

    #[tokio::test]
    async fn test_unreachable_price_source_skips_pricing() {
        let pricing =
            fetch_pricing_from("http://127.0.0.1:9/quotes", &DevChain::new(), "key", "USD").await;
        assert!(pricing.is_none());
    }

    fn enabled_config() -> GasReporterConfig {
        GasReporterConfig {
            enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_reporter_records_nothing() {
        let reporter = GasReporter::new(GasReporterConfig::default());
        reporter.record("FundMe", "fund()", 50_000);
        assert_eq!(reporter.stats("FundMe", "fund()"), None);
    }

    #[test]
    fn test_stats() {
        let reporter = GasReporter::new(enabled_config());
        reporter.record("FundMe", "fund()", 90_000);
        reporter.record("FundMe", "fund()", 60_000);
        reporter.record("FundMe", "fund()", 63_000);

        let stats = reporter.stats("FundMe", "fund()").unwrap();
        assert_eq!(stats.calls, 3);
        assert_eq!(stats.min, 60_000);
        assert_eq!(stats.max, 90_000);
        assert_eq!(stats.avg, 71_000);
    }

    #[test]
    fn test_render_with_pricing() {
        let reporter = GasReporter::new(enabled_config());
        reporter.record("FundMe", "withdraw()", 100_000);

        let pricing = GasPricing {
            gas_price_wei: 10_000_000_000,
            eth_price: 2000.0,
        };
        let report = reporter.render(Some(&pricing));
        assert!(report.contains("withdraw()"));
        assert!(report.contains("USD (avg)"));
        // 100k gas at 10 gwei is 0.001 ETH
        assert!(report.contains("2.00"));
    }

    #[test]
    fn test_write_report() {
        let temp_dir = TempDir::new("fundme-gas").expect("Failed to create temp dir");
        let output = temp_dir.path().join("gas-report.txt");
        let reporter = GasReporter::new(GasReporterConfig {
            output_file: Some(output.clone()),
            ..enabled_config()
        });
        reporter.record("MockV3Aggregator", DEPLOYMENT, 500_000);

        reporter.write_report(None).unwrap();
        let content = std::fs::read_to_string(output).unwrap();
        assert!(content.contains("MockV3Aggregator"));
        assert!(content.contains("500000"));
    }
}
