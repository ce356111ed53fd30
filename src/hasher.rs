//! Settlement key derivation.

use alloy::primitives::keccak256;
use alloy_sol_types::SolValue;

use crate::{
    abi::exchange::Exchange,
    types::{SettlementKey, WithdrawPayload},
};

/// One-way hash of a withdrawal payload into its settlement key.
///
/// Implementations must be pure: the same payload always yields the same key.
pub trait SettlementHasher {
    fn settlement_key(&self, payload: &WithdrawPayload) -> SettlementKey;
}

/// Keccak-256 over the ABI encoding of the payload, matching the key the
/// exchange contract stores for a pending withdrawal.
#[derive(Clone, Copy, Debug, Default)]
pub struct Keccak256Hasher;

impl SettlementHasher for Keccak256Hasher {
    fn settlement_key(&self, payload: &WithdrawPayload) -> SettlementKey {
        let encoded = Exchange::Withdraw::from(payload).abi_encode();
        SettlementKey::new(keccak256(encoded))
    }
}
