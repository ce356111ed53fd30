//! Authenticated view of a single exchange account.

use alloy::{
    primitives::{Address, TxHash, U256},
    providers::Provider,
};
use futures::future::try_join_all;
use tracing::{debug, info};

use crate::{
    Chain,
    abi::exchange::Exchange::ExchangeInstance,
    error::DexError,
    types::{TokenRegistry, TokenSymbol},
};

/// Account state as seen on-chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainInfo {
    pub nonce: U256,
    /// Exchange balance per registry token, in registry order and base units.
    pub balances: Vec<(TokenSymbol, U256)>,
    /// Signer bound to the account, `None` if not bound yet.
    pub signer: Option<Address>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignerBinding {
    /// Account was already bound to this signer, nothing was sent.
    AlreadyBound(Address),
    /// Binding transaction was mined.
    Bound(TxHash),
}

/// Exchange account the withdrawals are made from.
#[derive(Debug)]
pub struct ExchangeSession<P> {
    provider: P,
    instance: ExchangeInstance<P>,
    account: Address,
    registry: TokenRegistry,
}

impl<P: Provider + Clone> ExchangeSession<P> {
    pub fn new(chain: &Chain, provider: P, account: Address) -> Self {
        Self {
            instance: ExchangeInstance::new(chain.exchange(), provider.clone()),
            registry: chain.tokens().clone(),
            provider,
            account,
        }
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// Reads nonce, per-token balances and the bound signer.
    pub async fn refresh_chain_info(&self) -> Result<ChainInfo, DexError> {
        let balances = try_join_all(self.registry.tokens().iter().map(|token| async move {
            let balance = self
                .instance
                .balanceOf(self.account, token.address)
                .call()
                .await?;
            Ok::<_, DexError>((token.symbol.clone(), balance))
        }));
        let (nonce, signer, balances) =
            futures::try_join!(self.nonce(), self.signer(), balances)?;

        debug!(account = %self.account, %nonce, ?signer, ?balances, "Chain info refreshed");

        Ok(ChainInfo {
            nonce,
            balances,
            signer,
        })
    }

    /// Current node gas price, in wei.
    pub async fn gas_price(&self) -> Result<u128, DexError> {
        Ok(self.provider.get_gas_price().await?)
    }

    pub async fn nonce(&self) -> Result<U256, DexError> {
        Ok(self.instance.nonce(self.account).call().await?)
    }

    /// Signer bound to the account, `None` if not bound yet.
    pub async fn signer(&self) -> Result<Option<Address>, DexError> {
        let signer = self.instance.getSigner(self.account).call().await?;
        Ok((!signer.is_zero()).then_some(signer))
    }

    /// Binds the account to `signer` unless it is bound already.
    ///
    /// An account bound to a different signer is reported as
    /// [`SignerBinding::AlreadyBound`] with that signer, it is not rebound.
    pub async fn ensure_signer_bound(&self, signer: Address) -> Result<SignerBinding, DexError> {
        if let Some(bound) = self.signer().await? {
            info!(account = %self.account, %bound, "Signer already bound");
            return Ok(SignerBinding::AlreadyBound(bound));
        }

        let receipt = self
            .instance
            .bindToSigner(signer)
            .send()
            .await?
            .get_receipt()
            .await?;
        if !receipt.status() {
            return Err(DexError::Reverted(format!(
                "signer binding reverted, tx: {}",
                receipt.transaction_hash
            )));
        }

        info!(
            account = %self.account,
            %signer,
            tx_hash = %receipt.transaction_hash,
            "Signer bound"
        );
        Ok(SignerBinding::Bound(receipt.transaction_hash))
    }
}
