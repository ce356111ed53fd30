//! Deterministic test doubles for the settlement flow.
//!
//! [`ManualClock`] is a [`ChainClock`] whose time only moves when its
//! [`ManualClock::sleeper`] is awaited, so waits of minutes complete
//! instantly and reproducibly.
//!
//! [`ScriptedGateway`] replays queued responses for every gateway operation
//! and records the calls it receives.
//!

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use alloy::primitives::{Address, B256, TxHash, U256, address};
use fastnum::UD128;

use crate::{
    clock::ChainClock,
    error::DexError,
    gateway::{GatewayError, WithdrawalGateway},
    types::{
        GasFee, SettlementKey, SettlementReceipt, SignScheme, TokenConfig, TokenRegistry,
        WithdrawPayload, WithdrawalHandle, WithdrawalIntent,
    },
};

pub const ACCOUNT: Address = address!("0x1111111111111111111111111111111111111111");
pub const STRK: Address = address!("0x04718f5a0fc34cc1af16a1cdee98ffb20c31f5cd");
pub const USDC: Address = address!("0x053c91253bc9682c04929ca02ed00b3e423f6710");
pub const ETH: Address = address!("0x049d36570d4e46f48e99674bd3fcc84644ddd6b9");

/// Registry with `STRK` (18 decimals), `USDC` (6 decimals) and `ETH`
/// (18 decimals), in that order.
pub fn registry() -> TokenRegistry {
    TokenRegistry::new(vec![
        TokenConfig::new("STRK", STRK, 18),
        TokenConfig::new("USDC", USDC, 6),
        TokenConfig::new("ETH", ETH, 18),
    ])
}

/// Intent to withdraw `amount` of the registry token `symbol` from
/// [`ACCOUNT`].
///
/// Panics if `symbol` is not in [`registry`].
pub fn intent(symbol: &str, amount: UD128) -> WithdrawalIntent {
    let registry = registry();
    let token = registry.by_symbol(symbol).unwrap();
    WithdrawalIntent {
        symbol: symbol.to_string(),
        token: token.address,
        account: ACCOUNT,
        amount,
        raw_amount: token.converter().to_raw(amount),
    }
}

/// Payload the exchange would return for `intent`, with a fixed `salt`.
pub fn payload(intent: &WithdrawalIntent, salt: u64) -> WithdrawPayload {
    WithdrawPayload {
        maker: intent.account,
        token: intent.token,
        amount: intent.raw_amount,
        salt: U256::from(salt),
        gas_fee: GasFee {
            gas_per_action: 100,
            fee_token: STRK,
            max_gas_price: U256::from(1_000_000_000u64),
            conversion_rate: (U256::from(1), U256::from(1)),
        },
        receiver: intent.account,
        sign_scheme: SignScheme::NotSpecified,
    }
}

/// Receipt with the transaction hash filled with `byte`.
pub fn receipt(byte: u8) -> SettlementReceipt {
    SettlementReceipt {
        tx_hash: TxHash::repeat_byte(byte),
        block_number: Some(1_000 + byte as u64),
    }
}

/// Key filled with `byte`.
pub fn key(byte: u8) -> SettlementKey {
    SettlementKey::new(B256::repeat_byte(byte))
}

/// Message the exchange reverts with while the settlement window is closed.
pub fn too_early(block_delta: u64, time_delta: u64) -> GatewayError {
    GatewayError::Rejected(format!(
        "FEW_TIME_PASSED: wait at least 2 block and 60 ts (for now its {block_delta} and {time_delta})"
    ))
}

/// Message the exchange reverts with while a previous withdrawal is outstanding.
pub fn pending_previous() -> GatewayError {
    GatewayError::Rejected("NOT_YET_COMPLETED_PREV".to_string())
}

#[derive(Debug)]
struct ClockState {
    start_block: u64,
    start_time: u64,
    block_time_secs: u64,
    elapsed_secs: u64,
    block_reads: usize,
    sleeps: usize,
    fail_block_reads_after: Option<usize>,
}

impl ClockState {
    fn current_block(&self) -> u64 {
        match self.block_time_secs {
            0 => self.start_block,
            block_time => self.start_block + self.elapsed_secs / block_time,
        }
    }
}

/// Simulated chain producing one block every `block_time_secs` of
/// simulated time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    state: Arc<Mutex<ClockState>>,
}

impl ManualClock {
    /// `block_time_secs == 0` simulates a stalled chain.
    pub fn new(start_block: u64, start_time: u64, block_time_secs: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClockState {
                start_block,
                start_time,
                block_time_secs,
                elapsed_secs: 0,
                block_reads: 0,
                sleeps: 0,
                fail_block_reads_after: None,
            })),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.state().elapsed_secs += duration.as_secs();
    }

    /// Sleep function that advances this clock instead of waiting.
    pub fn sleeper(&self) -> impl Fn(Duration) -> futures::future::Ready<()> + Clone + use<> {
        let clock = self.clone();
        move |duration| {
            clock.advance(duration);
            clock.state().sleeps += 1;
            futures::future::ready(())
        }
    }

    /// Block reads past the first `reads` fail with a transport error.
    pub fn fail_block_reads_after(&self, reads: usize) {
        self.state().fail_block_reads_after = Some(reads);
    }

    pub fn current_block(&self) -> u64 {
        self.state().current_block()
    }

    pub fn now_secs(&self) -> u64 {
        let state = self.state();
        state.start_time + state.elapsed_secs
    }

    pub fn block_reads(&self) -> usize {
        self.state().block_reads
    }

    pub fn sleeps(&self) -> usize {
        self.state().sleeps
    }

    fn state(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChainClock for ManualClock {
    async fn block_number(&self) -> Result<u64, DexError> {
        let mut state = self.state();
        if state
            .fail_block_reads_after
            .is_some_and(|limit| state.block_reads >= limit)
        {
            return Err(DexError::Transport("block number unavailable".to_string()));
        }
        state.block_reads += 1;
        Ok(state.current_block())
    }

    fn now(&self) -> u64 {
        self.now_secs()
    }
}

/// Sleep function that returns immediately.
pub fn instant_sleep(_: Duration) -> futures::future::Ready<()> {
    futures::future::ready(())
}

/// Gateway call as recorded by [`ScriptedGateway`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayCall {
    Request { symbol: String },
    Apply(SettlementKey),
    Pending { account: Address, token: Address },
}

/// [`WithdrawalGateway`] replaying queued responses.
///
/// With an empty queue, requests succeed with [`payload`] (salt 0), applies
/// succeed with [`receipt`] (byte 0) and pending lookups return
/// [`GatewayError::NotFound`].
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    requests: Mutex<VecDeque<Result<WithdrawalHandle, GatewayError>>>,
    applies: Mutex<VecDeque<Result<Option<SettlementReceipt>, GatewayError>>>,
    pending: Mutex<VecDeque<Result<WithdrawalHandle, GatewayError>>>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_request(self, response: Result<WithdrawalHandle, GatewayError>) -> Self {
        lock(&self.requests).push_back(response);
        self
    }

    pub fn on_apply(self, response: Result<Option<SettlementReceipt>, GatewayError>) -> Self {
        lock(&self.applies).push_back(response);
        self
    }

    pub fn on_pending(self, response: Result<WithdrawalHandle, GatewayError>) -> Self {
        lock(&self.pending).push_back(response);
        self
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.calls).clone()
    }

    pub fn request_count(&self) -> usize {
        self.count(|c| matches!(c, GatewayCall::Request { .. }))
    }

    pub fn apply_keys(&self) -> Vec<SettlementKey> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                GatewayCall::Apply(key) => Some(*key),
                _ => None,
            })
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.count(|c| matches!(c, GatewayCall::Pending { .. }))
    }

    fn count(&self, f: impl Fn(&GatewayCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| f(c)).count()
    }

    fn record(&self, call: GatewayCall) {
        lock(&self.calls).push(call);
    }
}

impl WithdrawalGateway for ScriptedGateway {
    async fn request_withdrawal(
        &self,
        intent: &WithdrawalIntent,
    ) -> Result<WithdrawalHandle, GatewayError> {
        self.record(GatewayCall::Request {
            symbol: intent.symbol.clone(),
        });
        lock(&self.requests)
            .pop_front()
            .unwrap_or_else(|| Ok(WithdrawalHandle::Requested(payload(intent, 0))))
    }

    async fn apply_withdrawal(
        &self,
        key: SettlementKey,
    ) -> Result<Option<SettlementReceipt>, GatewayError> {
        self.record(GatewayCall::Apply(key));
        lock(&self.applies)
            .pop_front()
            .unwrap_or_else(|| Ok(Some(receipt(0))))
    }

    async fn pending_withdrawal(
        &self,
        account: Address,
        token: Address,
    ) -> Result<WithdrawalHandle, GatewayError> {
        self.record(GatewayCall::Pending { account, token });
        lock(&self.pending)
            .pop_front()
            .unwrap_or(Err(GatewayError::NotFound))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
