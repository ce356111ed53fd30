use std::{
    future::Future,
    time::{SystemTime, UNIX_EPOCH},
};

use alloy::providers::Provider;

use crate::error::DexError;

/// Source of the two clocks the settlement window is measured in.
pub trait ChainClock {
    /// Current block height of the node.
    fn block_number(&self) -> impl Future<Output = Result<u64, DexError>> + Send;

    /// Current wall-clock time, unix seconds.
    fn now(&self) -> u64;
}

/// [`ChainClock`] backed by an RPC [`Provider`] and the system clock.
#[derive(Clone, Debug)]
pub struct ProviderClock<P> {
    provider: P,
}

impl<P: Provider> ProviderClock<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: Provider> ChainClock for ProviderClock<P> {
    async fn block_number(&self) -> Result<u64, DexError> {
        Ok(self.provider.get_block_number().await?)
    }

    fn now(&self) -> u64 {
        unix_now()
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub(crate) fn unix_now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
