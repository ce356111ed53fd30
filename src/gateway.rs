//! Withdrawal request/apply surface of the exchange.
//!
//! [`WithdrawalGateway`] is the capability the orchestrator depends on;
//! [`ExchangeGateway`] implements it against the exchange contract.

use std::{future::Future, time::Duration};

use alloy::{
    contract,
    primitives::{Address, U256},
    providers::{PendingTransactionError, Provider},
    transports::{RpcError, TransportErrorKind},
};
use tracing::debug;

use crate::{
    Chain,
    abi::exchange::Exchange::{self, ExchangeInstance},
    clock::unix_now_millis,
    error::DexError,
    types::{
        GasFee, SettlementKey, SettlementReceipt, SignScheme, WithdrawPayload, WithdrawalHandle,
        WithdrawalIntent,
    },
};

/// Structured failure at the gateway boundary.
///
/// Only [`crate::classify`] interprets the text of [`GatewayError::Rejected`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("connectivity failure: {0}")]
    Connectivity(String),

    #[error("not found")]
    NotFound,
}

impl From<DexError> for GatewayError {
    fn from(value: DexError) -> Self {
        match value {
            DexError::Reverted(reason) => Self::Rejected(reason),
            err if err.is_connectivity() => Self::Connectivity(err.to_string()),
            err => Self::Rejected(err.to_string()),
        }
    }
}

impl From<contract::Error> for GatewayError {
    fn from(value: contract::Error) -> Self {
        DexError::from(value).into()
    }
}

impl From<PendingTransactionError> for GatewayError {
    fn from(value: PendingTransactionError) -> Self {
        DexError::from(value).into()
    }
}

impl From<RpcError<TransportErrorKind>> for GatewayError {
    fn from(value: RpcError<TransportErrorKind>) -> Self {
        DexError::from(value).into()
    }
}

/// Operations the settlement flow needs from the exchange.
pub trait WithdrawalGateway {
    /// Requests an on-chain withdrawal of `intent`.
    fn request_withdrawal(
        &self,
        intent: &WithdrawalIntent,
    ) -> impl Future<Output = Result<WithdrawalHandle, GatewayError>> + Send;

    /// Applies a requested withdrawal. `Ok(None)` means the exchange
    /// processed the call but did not apply the withdrawal.
    fn apply_withdrawal(
        &self,
        key: SettlementKey,
    ) -> impl Future<Output = Result<Option<SettlementReceipt>, GatewayError>> + Send;

    /// Looks up the outstanding withdrawal of `token` by `account`.
    fn pending_withdrawal(
        &self,
        account: Address,
        token: Address,
    ) -> impl Future<Output = Result<WithdrawalHandle, GatewayError>> + Send;
}

/// How the gas compensation of a withdrawal is priced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasFeePolicy {
    pub gas_per_action: u32,
    pub fee_token: Address,
    /// Max gas price as a percentage of the current node gas price.
    pub gas_price_multiplier_pct: u32,
    pub conversion_rate: (U256, U256),
}

impl GasFeePolicy {
    pub fn new(fee_token: Address) -> Self {
        Self {
            gas_per_action: 100,
            fee_token,
            gas_price_multiplier_pct: 150,
            conversion_rate: (U256::from(1), U256::from(1)),
        }
    }

    pub fn gas_fee(&self, gas_price: u128) -> GasFee {
        GasFee {
            gas_per_action: self.gas_per_action,
            fee_token: self.fee_token,
            max_gas_price: U256::from(gas_price) * U256::from(self.gas_price_multiplier_pct)
                / U256::from(100),
            conversion_rate: self.conversion_rate,
        }
    }
}

/// Default bound on waiting for a transaction receipt.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// [`WithdrawalGateway`] over the exchange contract.
///
/// Receipt waits are bounded by `receipt_timeout`; a transaction that is not
/// mined in time surfaces as [`GatewayError::Connectivity`].
#[derive(Debug)]
pub struct ExchangeGateway<P> {
    provider: P,
    instance: ExchangeInstance<P>,
    gas_fee: GasFeePolicy,
    receipt_timeout: Duration,
}

impl<P: Provider + Clone> ExchangeGateway<P> {
    pub fn new(chain: &Chain, provider: P, gas_fee: GasFeePolicy) -> Self {
        let instance = ExchangeInstance::new(chain.exchange(), provider.clone());
        Self {
            provider,
            instance,
            gas_fee,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }

    pub fn with_receipt_timeout(mut self, receipt_timeout: Duration) -> Self {
        self.receipt_timeout = receipt_timeout;
        self
    }

    pub fn receipt_timeout(&self) -> Duration {
        self.receipt_timeout
    }
}

impl<P: Provider + Clone> WithdrawalGateway for ExchangeGateway<P> {
    async fn request_withdrawal(
        &self,
        intent: &WithdrawalIntent,
    ) -> Result<WithdrawalHandle, GatewayError> {
        let gas_price = self.provider.get_gas_price().await?;
        let payload = WithdrawPayload {
            maker: intent.account,
            token: intent.token,
            amount: intent.raw_amount,
            salt: U256::from(unix_now_millis()),
            gas_fee: self.gas_fee.gas_fee(gas_price),
            receiver: intent.account,
            sign_scheme: SignScheme::NotSpecified,
        };

        let receipt = self
            .instance
            .requestOnchainWithdraw(Exchange::Withdraw::from(&payload))
            .send()
            .await?
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await?;

        debug!(?receipt, "Withdrawal request receipt");

        if !receipt.status() {
            return Err(GatewayError::Rejected(format!(
                "withdrawal request reverted, tx: {}",
                receipt.transaction_hash
            )));
        }

        Ok(WithdrawalHandle::Requested(payload))
    }

    async fn apply_withdrawal(
        &self,
        key: SettlementKey,
    ) -> Result<Option<SettlementReceipt>, GatewayError> {
        let receipt = self
            .instance
            .applyOnchainWithdraw(key.as_b256())
            .send()
            .await?
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await?;

        debug!(?receipt, "Withdrawal apply receipt");

        if !receipt.status() {
            return Ok(None);
        }

        Ok(Some(SettlementReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
        }))
    }

    async fn pending_withdrawal(
        &self,
        account: Address,
        token: Address,
    ) -> Result<WithdrawalHandle, GatewayError> {
        let key = SettlementKey::new(
            self.instance
                .getPendingWithdraw(account, token)
                .call()
                .await?,
        );
        if key.is_zero() {
            return Err(GatewayError::NotFound);
        }
        Ok(WithdrawalHandle::Pending(key))
    }
}
