//! In-process development network.
//!
//! Transactions are mined immediately, one block each. The two contracts used in
//! development, `FundMe` and `MockV3Aggregator`, run as native models that speak
//! the same ABI as their compiled counterparts, so bindings work unchanged
//! against this chain and a real node.
//!
//! A transaction that reverts leaves no trace: no block is mined and the sender
//! pays nothing, mirroring a node that rejects it during gas estimation.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use alloy_core::{
    primitives::{Address, B256, Bytes, I256, U256, address, aliases::U80, keccak256},
    sol_types::{Panic, Revert, SolCall, SolError, SolInterface, SolType},
};

use super::{Chain, ChainError, TxReceipt, TxRequest, confirmations_at};
use crate::{
    contracts::{FUND_ME, MOCK_V3_AGGREGATOR, abi},
    network::DEV_CHAIN_ID,
};

/// Initial balance of every development account: 10 000 ETH.
pub const DEV_ACCOUNT_BALANCE: U256 = U256::from_limbs([0x19e0c9bab2400000, 0x21e, 0, 0]);

/// Gas price charged for every transaction: 1 gwei.
pub const DEV_GAS_PRICE: u128 = 1_000_000_000;

/// Accounts derived from the standard development mnemonic
/// (`test test test ... junk`).
const DEV_ACCOUNTS: [Address; 20] = [
    address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266"),
    address!("70997970c51812dc3a010c7d01b50e0d17dc79c8"),
    address!("3c44cdddb6a900fa2b585dd299e03d12fa4293bc"),
    address!("90f79bf6eb2c4f870365e785982e1f101e93b906"),
    address!("15d34aaf54267db7d7c367839aaf71a00a2c6a65"),
    address!("9965507d1a55bcc2695c58ba16fb37d819b0a4dc"),
    address!("976ea74026e726554db657fa54763abd0c3a0aa9"),
    address!("14dc79964da2c08b23698b3d3cc7ca32193d9955"),
    address!("23618e81e3f5cdf7f54c3d65f7fbc0abf5b21e8f"),
    address!("a0ee7a142d267c1f36714e4a8f75612f20a79720"),
    address!("bcd4042de499d14e55001ccbb24a551f3b954096"),
    address!("71be63f3384f5fb98995898a86b02fb2426c5788"),
    address!("fabb0ac9d68b0b445fb7357272ff202c5651694a"),
    address!("1cbd3b2770909d4e10f157cabc84c7264073c9ec"),
    address!("df3e18d64bc6a983f673ab319ccae4f1a57c7097"),
    address!("cd3b766ccdd6ae721141f452c550ca635964ce71"),
    address!("2546bcd3c84621e976d8185a91a922ae77ecec30"),
    address!("bda5747bfd65f08deb54cb465eb87d40e51b197e"),
    address!("dd2fd4581271e230360230f9337d5c0430bf44c0"),
    address!("8626f6940e2eb28930efb4cef49b2d1f2c9c1199"),
];

// Fixed gas schedule.
const TRANSFER_GAS: u64 = 21_000;
const FUND_ME_DEPLOY_GAS: u64 = 1_046_000;
const AGGREGATOR_DEPLOY_GAS: u64 = 569_000;
const FIRST_FUND_GAS: u64 = 94_000;
const REPEAT_FUND_GAS: u64 = 45_000;
const WITHDRAW_BASE_GAS: u64 = 36_000;
const WITHDRAW_PER_FUNDER_GAS: u64 = 7_800;
const CHEAPER_WITHDRAW_PER_FUNDER_GAS: u64 = 7_000;
const UPDATE_ANSWER_GAS: u64 = 60_000;
const VIEW_GAS: u64 = 24_000;

/// Version reported by the mock aggregator.
const AGGREGATOR_VERSION: u64 = 0;

/// Panic code for an out-of-bounds array access.
const PANIC_ARRAY_OUT_OF_BOUNDS: u64 = 0x32;
/// Panic code for arithmetic overflow.
const PANIC_OVERFLOW: u64 = 0x11;

fn minimum_usd() -> U256 {
    U256::from(50u64) * U256::from(10u64).pow(U256::from(18u64))
}

fn revert(reason: &str) -> Bytes {
    Revert {
        reason: reason.to_string(),
    }
    .abi_encode()
    .into()
}

fn panic(code: u64) -> Bytes {
    Panic {
        code: U256::from(code),
    }
    .abi_encode()
    .into()
}

#[derive(Debug, Clone)]
struct FundMeModel {
    owner: Address,
    price_feed: Address,
    funders: Vec<Address>,
    funded: HashMap<Address, U256>,
}

#[derive(Debug, Clone)]
struct AggregatorModel {
    decimals: u8,
    answer: I256,
    round: u64,
    started_at: u64,
    updated_at: u64,
}

#[derive(Debug, Clone)]
enum DevContract {
    FundMe(FundMeModel),
    Aggregator(AggregatorModel),
}

impl DevContract {
    /// Stand-in for runtime code: the hash of the contract name.
    fn code(&self) -> Bytes {
        let name = match self {
            Self::FundMe(_) => FUND_ME,
            Self::Aggregator(_) => MOCK_V3_AGGREGATOR,
        };
        Bytes::copy_from_slice(keccak256(name).as_slice())
    }
}

/// Result of executing a message. `Err` holds revert data.
type Execution = Result<Executed, Bytes>;

#[derive(Debug)]
struct Executed {
    output: Bytes,
    gas_used: u64,
}

impl Executed {
    fn new(output: impl Into<Bytes>, gas_used: u64) -> Self {
        Self {
            output: output.into(),
            gas_used,
        }
    }
}

#[derive(Debug, Clone)]
struct DevState {
    block_number: u64,
    timestamp: u64,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    contracts: HashMap<Address, DevContract>,
}

impl DevState {
    fn genesis() -> Self {
        Self {
            block_number: 0,
            timestamp: chrono::Utc::now().timestamp().max(0) as u64,
            balances: DEV_ACCOUNTS
                .iter()
                .map(|a| (*a, DEV_ACCOUNT_BALANCE))
                .collect(),
            nonces: HashMap::new(),
            contracts: HashMap::new(),
        }
    }

    fn balance(&self, address: Address) -> U256 {
        self.balances.get(&address).copied().unwrap_or_default()
    }

    fn debit(&mut self, account: Address, amount: U256) -> Result<(), ChainError> {
        let available = self.balance(account);
        let remaining = available
            .checked_sub(amount)
            .ok_or(ChainError::InsufficientFunds {
                account,
                required: amount,
                available,
            })?;
        self.balances.insert(account, remaining);
        Ok(())
    }

    fn credit(&mut self, account: Address, amount: U256) {
        let balance = self.balance(account);
        self.balances.insert(account, balance + amount);
    }

    fn mine(&mut self) -> u64 {
        self.block_number += 1;
        self.timestamp += 1;
        self.block_number
    }

    /// Bump the sender's nonce, returning the one used.
    fn use_nonce(&mut self, from: Address) -> u64 {
        let nonce = self.nonces.entry(from).or_default();
        let used = *nonce;
        *nonce += 1;
        used
    }

    /// Execute a message call. Value has already been moved to `to`.
    fn execute(&mut self, from: Address, to: Address, value: U256, data: &[u8]) -> Execution {
        match self.contracts.get(&to) {
            None => Ok(Executed::new(Bytes::new(), TRANSFER_GAS)),
            Some(DevContract::FundMe(_)) => self.execute_fund_me(from, to, value, data),
            Some(DevContract::Aggregator(_)) => self.execute_aggregator(to, value, data),
        }
    }

    fn aggregator(&self, address: Address) -> Result<&AggregatorModel, Bytes> {
        match self.contracts.get(&address) {
            Some(DevContract::Aggregator(aggregator)) => Ok(aggregator),
            // Calling into a non-contract reverts without data
            _ => Err(Bytes::new()),
        }
    }

    fn fund_me(&mut self, address: Address) -> Result<&mut FundMeModel, Bytes> {
        match self.contracts.get_mut(&address) {
            Some(DevContract::FundMe(fund_me)) => Ok(fund_me),
            _ => Err(Bytes::new()),
        }
    }

    fn execute_fund_me(&mut self, from: Address, to: Address, value: U256, data: &[u8]) -> Execution {
        use abi::FundMe::{self as iface, FundMeCalls};

        // Plain transfers land in `receive()`, which funds.
        let call = if data.is_empty() {
            FundMeCalls::fund(iface::fundCall {})
        } else {
            FundMeCalls::abi_decode(data, true).map_err(|_| Bytes::new())?
        };

        if !value.is_zero() && !matches!(call, FundMeCalls::fund(_)) {
            return Err(Bytes::new());
        }

        let price_feed = self.fund_me(to)?.price_feed;

        match call {
            FundMeCalls::fund(_) => {
                let answer = self.aggregator(price_feed)?.answer;
                let eth_price = answer
                    .into_raw()
                    .checked_mul(U256::from(10_000_000_000u64))
                    .ok_or_else(|| panic(PANIC_OVERFLOW))?;
                let usd = eth_price
                    .checked_mul(value)
                    .ok_or_else(|| panic(PANIC_OVERFLOW))?
                    / U256::from(10u64).pow(U256::from(18u64));
                if usd < minimum_usd() {
                    return Err(revert("You need to spend more ETH!"));
                }

                let fund_me = self.fund_me(to)?;
                let funded = fund_me.funded.entry(from).or_default();
                let first = funded.is_zero() && !fund_me.funders.contains(&from);
                *funded += value;
                if first {
                    fund_me.funders.push(from);
                }

                let gas = if first { FIRST_FUND_GAS } else { REPEAT_FUND_GAS };
                Ok(Executed::new(Bytes::new(), gas))
            }
            FundMeCalls::withdraw(_) | FundMeCalls::cheaperWithdraw(_) => {
                let per_funder = if matches!(call, FundMeCalls::withdraw(_)) {
                    WITHDRAW_PER_FUNDER_GAS
                } else {
                    CHEAPER_WITHDRAW_PER_FUNDER_GAS
                };

                let fund_me = self.fund_me(to)?;
                if from != fund_me.owner {
                    return Err(iface::FundMe__NotOwner {}.abi_encode().into());
                }

                let owner = fund_me.owner;
                let funders = std::mem::take(&mut fund_me.funders);
                fund_me.funded.clear();

                let balance = self.balance(to);
                self.balances.insert(to, U256::ZERO);
                self.credit(owner, balance);

                let gas = WITHDRAW_BASE_GAS + per_funder * funders.len() as u64;
                Ok(Executed::new(Bytes::new(), gas))
            }
            FundMeCalls::getOwner(_) => {
                let owner = self.fund_me(to)?.owner;
                Ok(Executed::new(
                    iface::getOwnerCall::abi_encode_returns(&(owner,)),
                    VIEW_GAS,
                ))
            }
            FundMeCalls::getFunder(call) => {
                let fund_me = self.fund_me(to)?;
                let funder = usize::try_from(call.index)
                    .ok()
                    .and_then(|i| fund_me.funders.get(i).copied())
                    .ok_or_else(|| panic(PANIC_ARRAY_OUT_OF_BOUNDS))?;
                Ok(Executed::new(
                    iface::getFunderCall::abi_encode_returns(&(funder,)),
                    VIEW_GAS,
                ))
            }
            FundMeCalls::getFundedAmountFromAddress(call) => {
                let amount = self
                    .fund_me(to)?
                    .funded
                    .get(&call.funder)
                    .copied()
                    .unwrap_or_default();
                Ok(Executed::new(
                    iface::getFundedAmountFromAddressCall::abi_encode_returns(&(amount,)),
                    VIEW_GAS,
                ))
            }
            FundMeCalls::getPriceFeed(_) => Ok(Executed::new(
                iface::getPriceFeedCall::abi_encode_returns(&(price_feed,)),
                VIEW_GAS,
            )),
            FundMeCalls::getVersion(_) => {
                self.aggregator(price_feed)?;
                Ok(Executed::new(
                    iface::getVersionCall::abi_encode_returns(&(U256::from(AGGREGATOR_VERSION),)),
                    VIEW_GAS,
                ))
            }
            FundMeCalls::MINIMUM_USD(_) => Ok(Executed::new(
                iface::MINIMUM_USDCall::abi_encode_returns(&(minimum_usd(),)),
                VIEW_GAS,
            )),
        }
    }

    fn execute_aggregator(&mut self, to: Address, value: U256, data: &[u8]) -> Execution {
        use abi::MockV3Aggregator::{self as iface, MockV3AggregatorCalls as Calls};

        if !value.is_zero() {
            return Err(Bytes::new());
        }
        let call = Calls::abi_decode(data, true).map_err(|_| Bytes::new())?;
        let timestamp = self.timestamp;

        let Some(DevContract::Aggregator(aggregator)) = self.contracts.get_mut(&to) else {
            return Err(Bytes::new());
        };

        let output = match call {
            Calls::decimals(_) => iface::decimalsCall::abi_encode_returns(&(aggregator.decimals,)),
            Calls::version(_) => {
                iface::versionCall::abi_encode_returns(&(U256::from(AGGREGATOR_VERSION),))
            }
            Calls::latestAnswer(_) => {
                iface::latestAnswerCall::abi_encode_returns(&(aggregator.answer,))
            }
            Calls::latestRound(_) => {
                iface::latestRoundCall::abi_encode_returns(&(U256::from(aggregator.round),))
            }
            Calls::latestRoundData(_) => {
                iface::latestRoundDataCall::abi_encode_returns(&(
                    U80::from(aggregator.round),
                    aggregator.answer,
                    U256::from(aggregator.started_at),
                    U256::from(aggregator.updated_at),
                    U80::from(aggregator.round),
                ))
            }
            Calls::updateAnswer(call) => {
                aggregator.update_answer(call.answer, timestamp);
                return Ok(Executed::new(Bytes::new(), UPDATE_ANSWER_GAS));
            }
        };

        Ok(Executed::new(output, VIEW_GAS))
    }
}

impl AggregatorModel {
    fn new(decimals: u8, initial_answer: I256, timestamp: u64) -> Self {
        let mut model = Self {
            decimals,
            answer: I256::ZERO,
            round: 0,
            started_at: 0,
            updated_at: 0,
        };
        model.update_answer(initial_answer, timestamp);
        model
    }

    fn update_answer(&mut self, answer: I256, timestamp: u64) {
        self.answer = answer;
        self.round += 1;
        self.started_at = timestamp;
        self.updated_at = timestamp;
    }
}

/// An in-process chain with instant mining and pre-funded accounts.
#[derive(Debug)]
pub struct DevChain {
    state: Mutex<DevState>,
    gas_price: u128,
}

impl Default for DevChain {
    fn default() -> Self {
        Self::new()
    }
}

impl DevChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DevState::genesis()),
            gas_price: DEV_GAS_PRICE,
        }
    }

    fn state(&self) -> MutexGuard<'_, DevState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_signer(from: Address) -> Result<(), ChainError> {
        if DEV_ACCOUNTS.contains(&from) {
            Ok(())
        } else {
            Err(ChainError::UnknownSigner(from))
        }
    }

    fn tx_hash(from: Address, nonce: u64) -> B256 {
        let mut preimage = Vec::with_capacity(28);
        preimage.extend_from_slice(from.as_slice());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        keccak256(preimage)
    }

    /// Charge gas, mine a block and build the receipt.
    fn finalize(
        &self,
        state: &mut DevState,
        from: Address,
        gas_used: u64,
        contract_address: Option<Address>,
    ) -> Result<TxReceipt, ChainError> {
        let fee = U256::from(gas_used) * U256::from(self.gas_price);
        state.debit(from, fee)?;
        let nonce = state.use_nonce(from);
        let block_number = state.mine();

        Ok(TxReceipt {
            transaction_hash: Self::tx_hash(from, nonce),
            block_number,
            gas_used,
            effective_gas_price: self.gas_price,
            contract_address,
        })
    }

    fn instantiate(
        contract: &str,
        from: Address,
        constructor_args: &[u8],
        timestamp: u64,
    ) -> Result<(DevContract, u64), ChainError> {
        let bad_args = |_| ChainError::Reverted { data: Bytes::new() };

        match contract {
            FUND_ME => {
                let (price_feed,) =
                    abi::FundMeConstructor::abi_decode_params(constructor_args, true)
                        .map_err(bad_args)?;
                let model = FundMeModel {
                    owner: from,
                    price_feed,
                    funders: Vec::new(),
                    funded: HashMap::new(),
                };
                Ok((DevContract::FundMe(model), FUND_ME_DEPLOY_GAS))
            }
            MOCK_V3_AGGREGATOR => {
                let (decimals, initial_answer) =
                    abi::MockV3AggregatorConstructor::abi_decode_params(constructor_args, true)
                        .map_err(bad_args)?;
                let model = AggregatorModel::new(decimals, initial_answer, timestamp);
                Ok((DevContract::Aggregator(model), AGGREGATOR_DEPLOY_GAS))
            }
            other => Err(ChainError::UnknownContract(other.to_string())),
        }
    }
}

impl Chain for DevChain {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(DEV_CHAIN_ID)
    }

    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        Ok(DEV_ACCOUNTS.to_vec())
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        Ok(self.state().balance(address))
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.state().block_number)
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        Ok(self.gas_price)
    }

    async fn deploy(
        &self,
        from: Address,
        contract: &str,
        constructor_args: Bytes,
    ) -> Result<TxReceipt, ChainError> {
        Self::check_signer(from)?;

        let mut state = self.state();
        let mut pending = state.clone();

        let nonce = pending.nonces.get(&from).copied().unwrap_or_default();
        let address = from.create(nonce);
        let (model, gas_used) =
            Self::instantiate(contract, from, &constructor_args, pending.timestamp)?;
        pending.contracts.insert(address, model);

        let receipt = self.finalize(&mut pending, from, gas_used, Some(address))?;
        *state = pending;

        tracing::debug!(
            contract,
            %address,
            gas_used,
            block_number = receipt.block_number,
            "Contract created on development chain"
        );
        Ok(receipt)
    }

    async fn send(&self, tx: TxRequest) -> Result<TxReceipt, ChainError> {
        Self::check_signer(tx.from)?;

        let mut state = self.state();
        let mut pending = state.clone();

        pending.debit(tx.from, tx.value)?;
        pending.credit(tx.to, tx.value);

        let executed = pending
            .execute(tx.from, tx.to, tx.value, &tx.data)
            .map_err(|data| ChainError::Reverted { data })?;

        let receipt = self.finalize(&mut pending, tx.from, executed.gas_used, None)?;
        *state = pending;
        Ok(receipt)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ChainError> {
        Ok(self
            .state()
            .contracts
            .get(&address)
            .map(DevContract::code)
            .unwrap_or_default())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let mut scratch = self.state().clone();
        scratch
            .execute(Address::ZERO, to, U256::ZERO, &data)
            .map(|executed| executed.output)
            .map_err(|data| ChainError::Reverted { data })
    }

    async fn wait_for_confirmations(
        &self,
        receipt: &TxReceipt,
        confirmations: u64,
    ) -> Result<(), ChainError> {
        // Nothing else produces blocks here, so mine empty ones.
        let mut state = self.state();
        while confirmations_at(receipt.block_number, state.block_number) < confirmations {
            state.mine();
        }
        Ok(())
    }
}
