//! Withdrawal tool commands.

use std::{future::Future, time::Duration};

use alloy::{
    network::EthereumWallet,
    primitives::Address,
    providers::{DynProvider, ProviderBuilder},
    rpc::client::RpcClient,
    transports::layers::RetryBackoffLayer,
};
use dex_withdraw::{
    Chain,
    clock::ProviderClock,
    gateway::{ExchangeGateway, GasFeePolicy},
    hasher::Keccak256Hasher,
    orchestrator::{self, Orchestrator, Plan},
    session::{ChainInfo, ExchangeSession, SignerBinding},
    shutdown::Shutdown,
    types::{BatchReport, SettlementOutcome, TokenOutcome},
    waiter::DualClockWaiter,
};
use itertools::Itertools;
use tracing::{error, info, warn};
use url::Url;

use crate::{
    config::WithdrawArgs,
    error::{Error, Result},
    prompt,
};

/// Exchange account withdrawal tool.
#[derive(Debug)]
pub struct WithdrawTool {
    provider: DynProvider,
    wallet_address: Address,
    chain: Chain,
    session: ExchangeSession<DynProvider>,
    gas_fee: GasFeePolicy,
    timeout: Duration,
}

impl WithdrawTool {
    pub fn try_new(
        node_url: Url,
        wallet: EthereumWallet,
        chain: Chain,
        account: Option<Address>,
        gas_fee: GasFeePolicy,
        timeout: Duration,
    ) -> Result<Self> {
        let wallet_address = wallet.default_signer().address();
        let account = account.unwrap_or(wallet_address);
        info!(
            %wallet_address,
            %account,
            chain_id = chain.chain_id(),
            exchange = %chain.exchange(),
            tokens = %chain.tokens().tokens().iter().map(|t| &t.symbol).join(","),
            fee_token = chain.fee_token(),
            "Initializing withdrawal tool"
        );

        let rpc_client = RpcClient::builder()
            .layer(RetryBackoffLayer::new(10, 100, 200))
            .http(node_url);
        let provider = DynProvider::new(
            ProviderBuilder::new()
                .wallet(wallet)
                .connect_client(rpc_client),
        );

        let session = ExchangeSession::new(&chain, provider.clone(), account);

        Ok(Self {
            provider,
            wallet_address,
            chain,
            session,
            gas_fee,
            timeout,
        })
    }

    /// Logs nonce, bound signer and non-zero balances of the account.
    pub async fn balances(&self) -> Result<()> {
        let chain_info = self.chain_info().await?;
        self.log_chain_info(&chain_info)
    }

    /// Binds the wallet as account signer unless a signer is bound already.
    pub async fn bind_signer(&self) -> Result<SignerBinding> {
        let binding = self
            .with_timeout(self.session.ensure_signer_bound(self.wallet_address))
            .await?;
        if let SignerBinding::AlreadyBound(signer) = binding
            && signer != self.wallet_address
        {
            warn!(
                %signer,
                wallet_address = %self.wallet_address,
                "Account is bound to a different signer"
            );
        }
        Ok(binding)
    }

    /// Withdraws every balance above its reserve.
    pub async fn withdraw(
        &self,
        args: &WithdrawArgs,
        shutdown: &Shutdown,
    ) -> Result<BatchReport> {
        args.validate()?;
        let reserve = args.reserve_policy()?;

        self.bind_signer().await?;

        let gas_price = self.with_timeout(self.session.gas_price()).await?;
        info!(gas_price, "Current gas price");

        let chain_info = self.chain_info().await?;
        self.log_chain_info(&chain_info)?;

        let plan = orchestrator::plan(
            chain_info.balances,
            self.session.registry(),
            self.session.account(),
            &reserve,
        );
        for (symbol, reason) in plan.skipped() {
            info!(%symbol, %reason, "Not withdrawing");
        }
        if plan.is_empty() {
            info!("Nothing to withdraw");
            return Ok(BatchReport::default());
        }

        let summary = plan_summary(&plan);
        info!(plan = %summary, "Withdrawal plan");

        if !args.yes && !self.confirm(format!("Withdraw {summary}?")).await? {
            info!("Withdrawal cancelled by user");
            return Ok(BatchReport::default());
        }

        let gateway = ExchangeGateway::new(&self.chain, self.provider.clone(), self.gas_fee)
            .with_receipt_timeout(self.timeout);
        let waiter = DualClockWaiter::new(
            ProviderClock::new(self.provider.clone()),
            tokio::time::sleep,
            args.wait_policy(),
        );
        let settlement = Orchestrator::new(
            &gateway,
            &Keccak256Hasher,
            &waiter,
            args.settlement_policy(),
        );

        let report = settlement.run_batch(&plan, shutdown).await;
        log_report(&report);
        Ok(report)
    }

    async fn chain_info(&self) -> Result<ChainInfo> {
        self.with_timeout(self.session.refresh_chain_info()).await
    }

    fn log_chain_info(&self, chain_info: &ChainInfo) -> Result<()> {
        info!(
            account = %self.session.account(),
            nonce = %chain_info.nonce,
            signer = ?chain_info.signer,
            "Account state"
        );
        for (symbol, raw) in chain_info.balances.iter().filter(|(_, raw)| !raw.is_zero()) {
            let converter = self.session.registry().by_symbol(symbol).map(|t| t.converter());
            match converter {
                Some(converter) => {
                    let amount = converter.from_raw::<2>(*raw)?;
                    info!(%symbol, %amount, "Balance");
                }
                None => info!(%symbol, %raw, "Balance"),
            }
        }
        Ok(())
    }

    async fn with_timeout<T, E>(
        &self,
        fut: impl Future<Output = std::result::Result<T, E>>,
    ) -> Result<T>
    where
        Error: From<E>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::Timeout(self.timeout.as_secs())),
        }
    }

    async fn confirm(&self, question: String) -> Result<bool> {
        let answer = tokio::task::spawn_blocking(move || {
            prompt::confirm(&mut std::io::stdin().lock(), &mut std::io::stderr(), &question)
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(answer)
    }
}

fn plan_summary(plan: &Plan) -> String {
    plan.intents()
        .map(|intent| format!("{} {}", intent.amount, intent.symbol))
        .join(", ")
}

fn log_report(report: &BatchReport) {
    for entry in &report.entries {
        let amount = entry.amount.map(|a| a.to_string()).unwrap_or_default();
        match &entry.outcome {
            TokenOutcome::Settled(SettlementOutcome::Applied {
                receipt,
                wait_cycles,
                ..
            }) => info!(
                symbol = %entry.symbol,
                %amount,
                tx_hash = %receipt.tx_hash,
                wait_cycles,
                "Withdrawn"
            ),
            TokenOutcome::Settled(SettlementOutcome::Abandoned(reason)) => {
                error!(symbol = %entry.symbol, %amount, %reason, "Not withdrawn")
            }
            TokenOutcome::Settled(SettlementOutcome::Cancelled) => {
                warn!(symbol = %entry.symbol, %amount, "Cancelled")
            }
            TokenOutcome::Skipped(reason) => {
                info!(symbol = %entry.symbol, %amount, %reason, "Skipped")
            }
        }
    }
    info!(
        applied = report.applied(),
        abandoned = report.abandoned(),
        skipped = report.skipped(),
        cancelled = report.cancelled(),
        "Withdrawal summary"
    );
}
