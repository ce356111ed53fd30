//! On-chain withdrawal settlement for the DEX exchange contract.
//!
//! # Overview
//!
//! Moves an account's exchange balances back on-chain. A withdrawal is a
//! two-step protocol: it is requested first, then applied once the exchange
//! policy window (minimum number of blocks AND minimum wall-clock time since
//! the request) has elapsed.
//!
//! Use [`orchestrator::plan`] to turn balances from
//! [`session::ExchangeSession::refresh_chain_info`] into withdrawal intents,
//! then [`orchestrator::Orchestrator::run_batch`] to settle them one by one.
//!
//! The orchestrator only depends on the [`gateway::WithdrawalGateway`],
//! [`hasher::SettlementHasher`] and [`clock::ChainClock`] capabilities.
//! [`gateway::ExchangeGateway`] and [`clock::ProviderClock`] implement them
//! over an RPC provider.
//!
//! See `./tests` for examples.
//!
//! # Limitations/follow-ups
//!
//! * The settlement window is only learned from the text of the exchange
//!   rejection, see [`classify`].
//!
//! * Withdrawals are settled strictly sequentially.
//!
//! # Testing
//!
//! [`testing`] module provides a simulated chain clock and a scripted
//! gateway to drive the settlement flow deterministically.

pub mod abi;
pub mod classify;
pub mod clock;
pub mod error;
pub mod gateway;
pub mod hasher;
pub mod num;
pub mod orchestrator;
pub mod session;
pub mod shutdown;
pub mod testing;
pub mod types;
pub mod waiter;

use alloy::primitives::Address;

#[derive(Clone, Debug)]
/// Chain the exchange is operating on.
pub struct Chain {
    chain_id: u64,
    exchange: Address,
    tokens: types::TokenRegistry,
    fee_token: types::TokenSymbol,
}

impl Chain {
    pub fn custom(
        chain_id: u64,
        exchange: Address,
        tokens: types::TokenRegistry,
        fee_token: impl Into<types::TokenSymbol>,
    ) -> Self {
        Self {
            chain_id,
            exchange,
            tokens,
            fee_token: fee_token.into(),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn exchange(&self) -> Address {
        self.exchange
    }

    pub fn tokens(&self) -> &types::TokenRegistry {
        &self.tokens
    }

    /// Token the exchange charges gas compensation in.
    pub fn fee_token(&self) -> &str {
        &self.fee_token
    }
}
