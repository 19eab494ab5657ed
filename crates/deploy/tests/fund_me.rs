//! FundMe unit tests against the in-process development chain.
//!
//! Each test starts from a fresh chain with the `all` fixture deployed.

use std::sync::Mutex;

use fundme_deploy::{
    Address, Bytes, Chain, ContractError, DeployEnvironment, DeployError, DeployTag,
    DeploymentStore, DevChain, FUND_ME, GasReporter, GasReporterConfig, I256, MOCK_V3_AGGREGATOR,
    U256, Verifier, VerifyError, gas::DEPLOYMENT, network, parse_ether,
};
use tempdir::TempDir;

async fn setup() -> DeployEnvironment<DevChain> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let hardhat = network("hardhat").expect("hardhat network must exist");
    let mut env = DeployEnvironment::new(hardhat, DevChain::new(), DeploymentStore::in_memory())
        .await
        .expect("Failed to create deploy environment");
    env.fixture(&[DeployTag::All])
        .await
        .expect("Failed to run deploy fixture");
    env
}

fn eth(amount: &str) -> U256 {
    parse_ether(amount).expect("valid ether amount")
}

mod constructor {
    use super::*;

    #[tokio::test]
    async fn sets_the_aggregator_address() {
        let env = setup().await;
        let fund_me = env.fund_me().unwrap();
        let mock = env.mock_v3_aggregator().unwrap();

        assert_eq!(fund_me.get_price_feed().await.unwrap(), mock.address());
        assert_eq!(fund_me.get_owner().await.unwrap(), env.deployer());
    }

    #[tokio::test]
    async fn mock_uses_initial_answer() {
        let env = setup().await;
        let mock = env.mock_v3_aggregator().unwrap();

        assert_eq!(mock.decimals().await.unwrap(), 8);
        assert_eq!(
            mock.latest_answer().await.unwrap(),
            I256::try_from(2000_00000000i64).unwrap()
        );
        assert_eq!(mock.latest_round().await.unwrap(), U256::from(1));
        let round = mock.latest_round_data().await.unwrap();
        assert_eq!(round.answer, mock.latest_answer().await.unwrap());
        assert_eq!(round.roundId, round.answeredInRound);
        assert_eq!(round.startedAt, round.updatedAt);
        assert_eq!(
            env.fund_me().unwrap().get_version().await.unwrap(),
            mock.version().await.unwrap()
        );
    }
}

mod fund {
    use super::*;

    #[tokio::test]
    async fn fails_if_you_dont_send_enough_eth() {
        let env = setup().await;
        let fund_me = env.fund_me().unwrap();

        let err = fund_me.fund(U256::ZERO).await.unwrap_err();
        assert_eq!(err.reason(), Some("You need to spend more ETH!"));
    }

    #[tokio::test]
    async fn updates_the_amount_funded_data_structure() {
        let env = setup().await;
        let fund_me = env.fund_me().unwrap();

        fund_me.fund(eth("1")).await.unwrap();
        let funded = fund_me
            .get_funded_amount_from_address(env.deployer())
            .await
            .unwrap();
        assert_eq!(funded, eth("1"));
    }

    #[tokio::test]
    async fn adds_funder_to_array_of_funders() {
        let env = setup().await;
        let fund_me = env.fund_me().unwrap();

        fund_me.fund(eth("1")).await.unwrap();
        assert_eq!(fund_me.get_funder(0).await.unwrap(), env.deployer());
    }

    #[tokio::test]
    async fn repeated_funding_accumulates_without_duplicating_the_funder() {
        let env = setup().await;
        let fund_me = env.fund_me().unwrap();

        fund_me.fund(eth("1")).await.unwrap();
        fund_me.fund(eth("0.5")).await.unwrap();

        assert_eq!(
            fund_me
                .get_funded_amount_from_address(env.deployer())
                .await
                .unwrap(),
            eth("1.5")
        );
        assert_eq!(fund_me.get_funder(0).await.unwrap(), env.deployer());
        assert!(matches!(
            fund_me.get_funder(1).await,
            Err(ContractError::Panic(code)) if code == U256::from(0x32)
        ));
    }

    #[tokio::test]
    async fn minimum_follows_the_price_feed() {
        let env = setup().await;
        let fund_me = env.fund_me().unwrap();
        let mock = env.mock_v3_aggregator().unwrap();

        // 0.03 ETH is 60 USD at 2000 USD/ETH
        fund_me.fund(eth("0.03")).await.unwrap();

        mock.update_answer(I256::try_from(1000_00000000i64).unwrap())
            .await
            .unwrap();
        assert_eq!(mock.latest_round().await.unwrap(), U256::from(2));

        // and only 30 USD at 1000 USD/ETH
        let err = fund_me.fund(eth("0.03")).await.unwrap_err();
        assert_eq!(err.reason(), Some("You need to spend more ETH!"));
        assert_eq!(
            fund_me.minimum_usd().await.unwrap(),
            U256::from(50u64) * U256::from(10u64).pow(U256::from(18u64))
        );
    }

    #[tokio::test]
    async fn plain_transfer_funds() {
        let env = setup().await;
        let fund_me = env.fund_me().unwrap();
        let accounts = env.chain().accounts().await.unwrap();

        env.chain()
            .send(fundme_deploy::TxRequest {
                from: accounts[2],
                to: fund_me.address(),
                value: eth("1"),
                data: Bytes::new(),
            })
            .await
            .unwrap();

        assert_eq!(fund_me.get_funder(0).await.unwrap(), accounts[2]);
        assert_eq!(env.chain().balance(fund_me.address()).await.unwrap(), eth("1"));
    }
}

mod withdraw {
    use super::*;

    async fn funded() -> DeployEnvironment<DevChain> {
        let env = setup().await;
        env.fund_me().unwrap().fund(eth("1")).await.unwrap();
        env
    }

    #[tokio::test]
    async fn owner_receives_all_funds() {
        let env = funded().await;
        let chain = env.chain();
        let fund_me = env.fund_me().unwrap();

        let starting_fund_me_balance = chain.balance(fund_me.address()).await.unwrap();
        let starting_deployer_balance = chain.balance(env.deployer()).await.unwrap();

        let receipt = fund_me.withdraw().await.unwrap();
        let gas_cost = receipt.gas_cost();

        let ending_fund_me_balance = chain.balance(fund_me.address()).await.unwrap();
        let ending_deployer_balance = chain.balance(env.deployer()).await.unwrap();

        assert_eq!(ending_fund_me_balance, U256::ZERO);
        assert_eq!(
            ending_deployer_balance + gas_cost,
            starting_deployer_balance + starting_fund_me_balance
        );
    }

    #[tokio::test]
    async fn cheaper_withdraw_with_multiple_funders() {
        let env = funded().await;
        let chain = env.chain();
        let fund_me = env.fund_me().unwrap();
        let accounts = chain.accounts().await.unwrap();

        for account in &accounts[1..6] {
            fund_me.connect(*account).fund(eth("1")).await.unwrap();
        }

        let starting_fund_me_balance = chain.balance(fund_me.address()).await.unwrap();
        let starting_deployer_balance = chain.balance(env.deployer()).await.unwrap();
        assert_eq!(starting_fund_me_balance, eth("6"));

        let receipt = fund_me.cheaper_withdraw().await.unwrap();

        assert_eq!(chain.balance(fund_me.address()).await.unwrap(), U256::ZERO);
        assert_eq!(
            chain.balance(env.deployer()).await.unwrap() + receipt.gas_cost(),
            starting_deployer_balance + starting_fund_me_balance
        );
        assert!(matches!(
            fund_me.get_funder(0).await,
            Err(ContractError::Panic(_))
        ));
        for account in &accounts[..6] {
            assert_eq!(
                fund_me.get_funded_amount_from_address(*account).await.unwrap(),
                U256::ZERO
            );
        }
    }

    #[tokio::test]
    async fn only_owner_can_withdraw() {
        let env = funded().await;
        let chain = env.chain();
        let fund_me = env.fund_me().unwrap();
        let attacker = chain.accounts().await.unwrap()[1];

        let contract_balance = chain.balance(fund_me.address()).await.unwrap();
        let attacker_balance = chain.balance(attacker).await.unwrap();

        let err = fund_me.connect(attacker).withdraw().await.unwrap_err();
        assert!(matches!(err, ContractError::NotOwner));

        assert_eq!(chain.balance(fund_me.address()).await.unwrap(), contract_balance);
        assert_eq!(chain.balance(attacker).await.unwrap(), attacker_balance);
    }
}

mod deploy {
    use super::*;

    #[derive(Default)]
    struct RecordingVerifier {
        calls: Mutex<Vec<(String, Address, Bytes)>>,
        error: Option<String>,
    }

    impl Verifier for RecordingVerifier {
        async fn verify(
            &self,
            contract: &str,
            address: Address,
            constructor_args: &Bytes,
        ) -> Result<(), VerifyError> {
            self.calls
                .lock()
                .unwrap()
                .push((contract.to_string(), address, constructor_args.clone()));
            match &self.error {
                Some(message) => Err(VerifyError::Explorer(message.clone())),
                None => Ok(()),
            }
        }
    }

    async fn live_env(
        deployments: DeploymentStore,
        verifier: RecordingVerifier,
    ) -> DeployEnvironment<DevChain, RecordingVerifier> {
        live_env_on(DevChain::new(), deployments, verifier).await
    }

    async fn live_env_on(
        chain: DevChain,
        deployments: DeploymentStore,
        verifier: RecordingVerifier,
    ) -> DeployEnvironment<DevChain, RecordingVerifier> {
        let goerli = network("goerli").unwrap();
        DeployEnvironment::new(goerli, chain, deployments)
            .await
            .unwrap()
            .with_verifier(verifier)
    }

    #[tokio::test]
    async fn fixture_is_idempotent() {
        let mut env = setup().await;
        let fund_me = env.get(FUND_ME).unwrap().clone();
        let mock = env.get(MOCK_V3_AGGREGATOR).unwrap().clone();
        let block = env.chain().block_number().await.unwrap();

        env.fixture(&[DeployTag::All]).await.unwrap();

        assert_eq!(env.get(FUND_ME), Some(&fund_me));
        assert_eq!(env.get(MOCK_V3_AGGREGATOR), Some(&mock));
        assert_eq!(env.chain().block_number().await.unwrap(), block);
    }

    #[tokio::test]
    async fn fund_me_tag_requires_mocks() {
        let hardhat = network("hardhat").unwrap();
        let mut env: DeployEnvironment<DevChain> =
            DeployEnvironment::new(hardhat, DevChain::new(), DeploymentStore::in_memory())
                .await
                .unwrap();

        let err = env.fixture(&[DeployTag::FundMe]).await.unwrap_err();
        assert!(matches!(err, DeployError::MissingMock(MOCK_V3_AGGREGATOR)));

        env.fixture(&[DeployTag::Mocks]).await.unwrap();
        assert!(env.get(MOCK_V3_AGGREGATOR).is_some());
        assert!(env.get(FUND_ME).is_none());

        env.fixture(&[DeployTag::FundMe]).await.unwrap();
        assert!(env.get(FUND_ME).is_some());
    }

    #[tokio::test]
    async fn development_networks_are_never_verified() {
        let hardhat = network("hardhat").unwrap();
        let mut env = DeployEnvironment::new(hardhat, DevChain::new(), DeploymentStore::in_memory())
            .await
            .unwrap()
            .with_verifier(RecordingVerifier::default());

        env.fixture(&[DeployTag::All]).await.unwrap();
        assert!(env.verifier().unwrap().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn live_network_uses_configured_feed_and_verifies() {
        let mut env = live_env(DeploymentStore::in_memory(), RecordingVerifier::default()).await;
        env.fixture(&[DeployTag::All]).await.unwrap();

        // No mock on live networks
        assert!(env.get(MOCK_V3_AGGREGATOR).is_none());

        let record = env.get(FUND_ME).unwrap().clone();
        let feed = env.network().config.eth_usd_price_feed.unwrap();
        assert_eq!(record.args, vec![feed.to_string()]);
        assert_eq!(env.fund_me().unwrap().get_price_feed().await.unwrap(), feed);

        // Deployment waited for the configured confirmations
        let latest = env.chain().block_number().await.unwrap();
        assert_eq!(latest - record.block_number.unwrap() + 1, 6);

        let calls = env.verifier().unwrap().calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![(FUND_ME.to_string(), record.address, record.constructor_args)]
        );
    }

    #[tokio::test]
    async fn verification_errors_do_not_fail_the_deployment() {
        let verifier = RecordingVerifier {
            error: Some("NOTOK: Unable to locate ContractCode".to_string()),
            ..Default::default()
        };
        let mut env = live_env(DeploymentStore::in_memory(), verifier).await;

        env.fixture(&[DeployTag::All]).await.unwrap();
        assert!(env.get(FUND_ME).is_some());
    }

    #[tokio::test]
    async fn persisted_deployments_are_reused() {
        let temp_dir = TempDir::new("fundme-deployments").expect("Failed to create temp dir");

        let store = DeploymentStore::open(temp_dir.path(), "goerli", 5).unwrap();
        let mut first = live_env(store, RecordingVerifier::default()).await;
        first.fixture(&[DeployTag::All]).await.unwrap();
        let record = first.get(FUND_ME).unwrap().clone();
        assert!(temp_dir.path().join("goerli/FundMe.json").exists());

        assert_eq!(first.verifier().unwrap().calls.lock().unwrap().len(), 1);
        let chain = first.into_chain();
        let block = chain.block_number().await.unwrap();

        // A new session on the same chain sees the record and does not redeploy
        let store = DeploymentStore::open(temp_dir.path(), "goerli", 5).unwrap();
        let mut second = live_env_on(chain, store, RecordingVerifier::default()).await;
        second.fixture(&[DeployTag::All]).await.unwrap();

        assert_eq!(second.get(FUND_ME), Some(&record));
        assert_eq!(second.chain().block_number().await.unwrap(), block);
        assert!(second.verifier().unwrap().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_without_code_are_redeployed() {
        let temp_dir = TempDir::new("fundme-deployments").expect("Failed to create temp dir");
        let localhost = network("localhost").unwrap();

        let store = DeploymentStore::open(temp_dir.path(), localhost.name, 31337).unwrap();
        let mut first: DeployEnvironment<DevChain> =
            DeployEnvironment::new(localhost, DevChain::new(), store)
                .await
                .unwrap();
        first.fixture(&[DeployTag::All]).await.unwrap();
        let stale_mock = first.get(MOCK_V3_AGGREGATOR).unwrap().clone();
        assert!(temp_dir.path().join("localhost/FundMe.json").exists());

        // The node restarted: same chain ID, none of the contracts
        let store = DeploymentStore::open(temp_dir.path(), localhost.name, 31337).unwrap();
        let mut second: DeployEnvironment<DevChain> =
            DeployEnvironment::new(localhost, DevChain::new(), store)
                .await
                .unwrap();
        second.fixture(&[DeployTag::All]).await.unwrap();

        assert_eq!(second.chain().block_number().await.unwrap(), 2);
        let mock = second.get(MOCK_V3_AGGREGATOR).unwrap();
        assert!(!second.chain().code_at(mock.address).await.unwrap().is_empty());
        assert_eq!(mock.address, stale_mock.address);

        let fund_me = second.fund_me().unwrap();
        assert_eq!(fund_me.get_price_feed().await.unwrap(), mock.address);
        fund_me.fund(eth("1")).await.unwrap();
        assert_eq!(
            fund_me
                .get_funded_amount_from_address(second.deployer())
                .await
                .unwrap(),
            eth("1")
        );
    }

    #[tokio::test]
    async fn gas_reporter_records_deployments_and_calls() {
        let hardhat = network("hardhat").unwrap();
        let reporter = GasReporter::new(GasReporterConfig {
            enabled: true,
            ..Default::default()
        });
        let mut env: DeployEnvironment<DevChain> =
            DeployEnvironment::new(hardhat, DevChain::new(), DeploymentStore::in_memory())
                .await
                .unwrap()
                .with_gas_reporter(reporter);
        env.fixture(&[DeployTag::All]).await.unwrap();

        let fund_me = env.fund_me().unwrap();
        fund_me.fund(eth("1")).await.unwrap();
        fund_me.fund(eth("1")).await.unwrap();
        fund_me.withdraw().await.unwrap();

        let reporter = env.gas_reporter();
        assert_eq!(reporter.stats(FUND_ME, DEPLOYMENT).unwrap().calls, 1);
        assert_eq!(reporter.stats(MOCK_V3_AGGREGATOR, DEPLOYMENT).unwrap().calls, 1);

        let fund = reporter.stats(FUND_ME, "fund()").unwrap();
        assert_eq!(fund.calls, 2);
        assert!(fund.max > fund.min);
        assert_eq!(reporter.stats(FUND_ME, "withdraw()").unwrap().calls, 1);
    }
}
