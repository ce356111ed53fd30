use std::fmt;

use alloy::primitives::{Address, B256, TxHash, U256};
use fastnum::UD128;

use super::TokenSymbol;
use crate::{abi::exchange::Exchange, hasher::SettlementHasher};

/// Withdrawal of a single token planned for the current run.
#[derive(Clone, PartialEq, derive_more::Debug)]
pub struct WithdrawalIntent {
    pub symbol: TokenSymbol,
    pub token: Address,
    pub account: Address,
    /// Amount in human units.
    #[debug("{amount}")]
    pub amount: UD128,
    /// Same amount in token base units.
    pub raw_amount: U256,
}

/// Signature scheme tag carried by the withdrawal payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SignScheme {
    #[default]
    NotSpecified,
    Ecdsa,
    Direct,
}

impl From<SignScheme> for u8 {
    fn from(value: SignScheme) -> Self {
        match value {
            SignScheme::NotSpecified => 0,
            SignScheme::Ecdsa => 1,
            SignScheme::Direct => 2,
        }
    }
}

/// Gas compensation the exchange charges for executing the withdrawal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GasFee {
    pub gas_per_action: u32,
    pub fee_token: Address,
    pub max_gas_price: U256,
    /// Fee token to native token conversion rate as `(base, quote)`.
    pub conversion_rate: (U256, U256),
}

/// Structured withdrawal payload produced by a successful request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WithdrawPayload {
    pub maker: Address,
    pub token: Address,
    pub amount: U256,
    pub salt: U256,
    pub gas_fee: GasFee,
    pub receiver: Address,
    pub sign_scheme: SignScheme,
}

impl From<&WithdrawPayload> for Exchange::Withdraw {
    fn from(value: &WithdrawPayload) -> Self {
        Exchange::Withdraw {
            maker: value.maker,
            token: value.token,
            amount: value.amount,
            salt: value.salt,
            gasFee: Exchange::GasFee {
                gasPerAction: value.gas_fee.gas_per_action,
                feeToken: value.gas_fee.fee_token,
                maxGasPrice: value.gas_fee.max_gas_price,
                conversionRateBase: value.gas_fee.conversion_rate.0,
                conversionRateQuote: value.gas_fee.conversion_rate.1,
            },
            receiver: value.receiver,
            signScheme: value.sign_scheme.into(),
        }
    }
}

/// Key correlating a requested withdrawal with its on-chain application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SettlementKey(B256);

impl SettlementKey {
    pub fn new(value: B256) -> Self {
        Self(value)
    }

    pub fn as_b256(&self) -> B256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for SettlementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whatever is needed to apply a withdrawal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WithdrawalHandle {
    /// Payload of a withdrawal requested during this run.
    Requested(WithdrawPayload),
    /// Key of a withdrawal requested earlier and still outstanding.
    Pending(SettlementKey),
}

impl WithdrawalHandle {
    /// Normalizes the handle into the key `applyWithdrawal` expects.
    pub fn settlement_key<H: SettlementHasher>(&self, hasher: &H) -> SettlementKey {
        match self {
            Self::Requested(payload) => hasher.settlement_key(payload),
            Self::Pending(key) => *key,
        }
    }
}

/// Proof the withdrawal was applied on-chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettlementReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}
