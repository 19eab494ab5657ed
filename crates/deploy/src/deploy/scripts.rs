use alloy_core::{
    primitives::{I256, U256},
    sol_types::SolType,
};

use super::{
    DeployEnvironment, DeployError, DeployResult, DeployScript, DeployTag, OracleResolver,
};
use crate::{
    chain::Chain,
    contracts::{FUND_ME, MOCK_V3_AGGREGATOR, abi},
    verify::{Verifier, verify_contract},
};

/// Decimals of the mock price feed.
pub const DECIMALS: u8 = 8;

/// Initial answer of the mock price feed: 2000 USD per ETH with [`DECIMALS`] decimals.
pub const INITIAL_ANSWER: I256 = I256::from_raw(U256::from_limbs([200_000_000_000, 0, 0, 0]));

/// `00-deploy-mocks`: a `MockV3Aggregator` on development networks.
#[derive(Debug)]
pub struct DeployMocks;

impl DeployScript for DeployMocks {
    const NAME: &'static str = "00-deploy-mocks";
    const TAGS: &'static [DeployTag] = &[DeployTag::All, DeployTag::Mocks];

    async fn run<C: Chain, V: Verifier>(
        env: &mut DeployEnvironment<C, V>,
    ) -> Result<(), DeployError> {
        if !env.network().is_development() {
            tracing::info!(
                network = env.network().name,
                "Live network detected, not deploying mocks"
            );
            return Ok(());
        }

        tracing::info!("Local network detected! Deploying mocks...");
        let constructor_args =
            abi::MockV3AggregatorConstructor::abi_encode_params(&(DECIMALS, INITIAL_ANSWER));
        env.deploy(
            MOCK_V3_AGGREGATOR,
            vec![DECIMALS.to_string(), INITIAL_ANSWER.to_string()],
            constructor_args.into(),
        )
        .await?;
        tracing::info!("Mocks deployed!");
        Ok(())
    }
}

/// `01-deploy-fund-me`: `FundMe` wired to the network's price feed.
#[derive(Debug)]
pub struct DeployFundMe;

impl DeployScript for DeployFundMe {
    const NAME: &'static str = "01-deploy-fund-me";
    const TAGS: &'static [DeployTag] = &[DeployTag::All, DeployTag::FundMe];

    async fn run<C: Chain, V: Verifier>(
        env: &mut DeployEnvironment<C, V>,
    ) -> Result<(), DeployError> {
        let price_feed =
            OracleResolver::for_network(env.network())?.resolve(env.deployments())?;

        tracing::info!(%price_feed, "Deploying FundMe and waiting for confirmations...");
        let constructor_args = abi::FundMeConstructor::abi_encode_params(&(price_feed,));
        let DeployResult {
            record,
            newly_deployed,
        } = env
            .deploy(FUND_ME, vec![price_feed.to_string()], constructor_args.into())
            .await?;
        tracing::info!(address = %record.address, "FundMe deployed");

        if env.network().is_development() || !newly_deployed {
            return Ok(());
        }
        let Some(verifier) = env.verifier() else {
            tracing::debug!("No explorer API key, skipping verification");
            return Ok(());
        };

        if let Err(e) =
            verify_contract(verifier, FUND_ME, record.address, &record.constructor_args).await
        {
            tracing::warn!(error = %e, address = %record.address, "Verification failed");
        }
        Ok(())
    }
}
