//! Withdrawal settlement: plan a batch of intents, then drive each one
//! from request to on-chain application.
//!
//! Per intent, [`Orchestrator::settle`] runs:
//!
//! ```text
//! request ──ok──────────────────────────────► apply ◄──────────┐
//!    │                                          │               │
//!    └─ already pending ─► pending lookup ──────┘               │
//!                                               ├─ too early ─► wait
//!                                               ├─ receipt ───► Applied
//!                                               └─ otherwise ─► Abandoned
//! ```
//!
//! Every retry of `apply` reuses the key derived from the first handle.

mod plan;

pub use plan::{Plan, PlanEntry, ReservePolicy, plan};

use std::{future::Future, time::Duration};

use tracing::{error, info, warn};

use crate::{
    classify::{Classification, classify},
    clock::ChainClock,
    gateway::{GatewayError, WithdrawalGateway},
    hasher::SettlementHasher,
    shutdown::Shutdown,
    types::{
        AbandonReason, BatchReport, ReportEntry, SettlementKey, SettlementLimits,
        SettlementOutcome, SettlementWindow, TokenOutcome, WithdrawalHandle, WithdrawalIntent,
    },
    waiter::{DualClockWaiter, WaitOutcome},
};

/// Tunables of the settlement flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettlementPolicy {
    pub limits: SettlementLimits,

    /// Number of "too early" rejections tolerated per intent.
    pub max_wait_cycles: u32,

    /// Pause between two consecutive intents of a batch.
    pub pacing: Duration,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            limits: SettlementLimits::default(),
            max_wait_cycles: 10,
            pacing: Duration::from_secs(2),
        }
    }
}

/// Drives withdrawal intents through the exchange, one at a time.
#[derive(Debug)]
pub struct Orchestrator<'s, G, H, C, S> {
    gateway: &'s G,
    hasher: &'s H,
    waiter: &'s DualClockWaiter<C, S>,
    policy: SettlementPolicy,
}

impl<'s, G, H, C, S, SFut> Orchestrator<'s, G, H, C, S>
where
    G: WithdrawalGateway,
    H: SettlementHasher,
    C: ChainClock,
    S: Fn(Duration) -> SFut,
    SFut: Future<Output = ()>,
{
    pub fn new(
        gateway: &'s G,
        hasher: &'s H,
        waiter: &'s DualClockWaiter<C, S>,
        policy: SettlementPolicy,
    ) -> Self {
        Self {
            gateway,
            hasher,
            waiter,
            policy,
        }
    }

    pub fn policy(&self) -> &SettlementPolicy {
        &self.policy
    }

    /// Settles a single intent. Never fails, every failure is reported as
    /// an [`AbandonReason`].
    pub async fn settle(
        &self,
        intent: &WithdrawalIntent,
        shutdown: &Shutdown,
    ) -> SettlementOutcome {
        if shutdown.is_requested() {
            return SettlementOutcome::Cancelled;
        }

        info!(
            symbol = %intent.symbol,
            amount = %intent.amount,
            raw_amount = %intent.raw_amount,
            "Requesting withdrawal"
        );

        let handle = match self.obtain_handle(intent).await {
            Ok(handle) => handle,
            Err(reason) => return self.abandon(intent, reason),
        };

        let key = handle.settlement_key(self.hasher);
        let recovered = matches!(handle, WithdrawalHandle::Pending(_));
        info!(symbol = %intent.symbol, %key, recovered, "Withdrawal handle obtained");

        self.apply_until_settled(intent, key, shutdown).await
    }

    /// Requests the withdrawal, falling back to the outstanding one when the
    /// exchange reports a previous withdrawal still pending.
    async fn obtain_handle(
        &self,
        intent: &WithdrawalIntent,
    ) -> Result<WithdrawalHandle, AbandonReason> {
        let reason = match self.gateway.request_withdrawal(intent).await {
            Ok(handle) => return Ok(handle),
            Err(GatewayError::Rejected(reason)) => reason,
            Err(err) => return Err(abandon_reason(err)),
        };

        if classify(&reason) != Classification::AlreadyPendingPrevious {
            return Err(AbandonReason::Rejected(reason));
        }

        warn!(
            symbol = %intent.symbol,
            %reason,
            "Previous withdrawal still pending, recovering it"
        );
        self.gateway
            .pending_withdrawal(intent.account, intent.token)
            .await
            .map_err(|err| AbandonReason::NoPendingHandle(err.to_string()))
    }

    async fn apply_until_settled(
        &self,
        intent: &WithdrawalIntent,
        key: SettlementKey,
        shutdown: &Shutdown,
    ) -> SettlementOutcome {
        let mut wait_cycles = 0;
        loop {
            if shutdown.is_requested() {
                info!(symbol = %intent.symbol, %key, "Settlement cancelled");
                return SettlementOutcome::Cancelled;
            }

            let reason = match self.gateway.apply_withdrawal(key).await {
                Ok(Some(receipt)) => {
                    info!(
                        symbol = %intent.symbol,
                        %key,
                        tx_hash = %receipt.tx_hash,
                        block = ?receipt.block_number,
                        wait_cycles,
                        "Withdrawal applied"
                    );
                    return SettlementOutcome::Applied {
                        key,
                        receipt,
                        wait_cycles,
                    };
                }
                Ok(None) => return self.abandon(intent, AbandonReason::EmptyApplyResult),
                Err(GatewayError::Rejected(reason)) => reason,
                Err(err) => return self.abandon(intent, abandon_reason(err)),
            };

            let Classification::TooEarly {
                block_delta,
                time_delta,
            } = classify(&reason)
            else {
                return self.abandon(intent, AbandonReason::Rejected(reason));
            };

            wait_cycles += 1;
            if wait_cycles > self.policy.max_wait_cycles {
                let reason = AbandonReason::WaitBudgetExhausted(self.policy.max_wait_cycles);
                return self.abandon(intent, reason);
            }

            let window =
                SettlementWindow::remaining(&self.policy.limits, block_delta, time_delta);
            info!(
                symbol = %intent.symbol,
                %key,
                block_delta,
                time_delta,
                remaining_blocks = window.remaining_blocks(),
                remaining_seconds = window.remaining_seconds(),
                wait_cycles,
                "Settlement window not elapsed yet"
            );

            match self.waiter.wait(window, shutdown).await {
                Ok(WaitOutcome::Elapsed) => {}
                Ok(WaitOutcome::Cancelled) => {
                    info!(symbol = %intent.symbol, %key, "Settlement cancelled while waiting");
                    return SettlementOutcome::Cancelled;
                }
                Ok(WaitOutcome::DeadlineExceeded) => {
                    return self.abandon(intent, AbandonReason::WaitDeadlineExceeded);
                }
                Err(err) => {
                    return self.abandon(intent, AbandonReason::Connectivity(err.to_string()));
                }
            }
        }
    }

    fn abandon(&self, intent: &WithdrawalIntent, reason: AbandonReason) -> SettlementOutcome {
        error!(
            symbol = %intent.symbol,
            amount = %intent.amount,
            %reason,
            "Withdrawal abandoned"
        );
        SettlementOutcome::Abandoned(reason)
    }

    /// Settles every intent of `plan` sequentially, in plan order.
    ///
    /// A failed intent does not affect the others. Once shutdown is
    /// requested the remaining intents are reported as cancelled without
    /// touching the gateway.
    pub async fn run_batch(&self, plan: &Plan, shutdown: &Shutdown) -> BatchReport {
        let mut report = BatchReport::default();
        let mut settled_any = false;

        for entry in plan.entries() {
            let entry = match entry {
                PlanEntry::Skip {
                    symbol,
                    balance,
                    reason,
                } => {
                    info!(%symbol, %reason, "Skipping token");
                    ReportEntry {
                        symbol: symbol.clone(),
                        amount: *balance,
                        outcome: TokenOutcome::Skipped(reason.clone()),
                    }
                }
                PlanEntry::Withdraw(intent) => {
                    let paced = !settled_any
                        || self.waiter.pause(self.policy.pacing, shutdown).await;
                    let outcome = if paced {
                        settled_any = true;
                        self.settle(intent, shutdown).await
                    } else {
                        SettlementOutcome::Cancelled
                    };
                    ReportEntry {
                        symbol: intent.symbol.clone(),
                        amount: Some(intent.amount),
                        outcome: TokenOutcome::Settled(outcome),
                    }
                }
            };
            report.entries.push(entry);
        }

        info!(
            applied = report.applied(),
            abandoned = report.abandoned(),
            skipped = report.skipped(),
            cancelled = report.cancelled(),
            "Withdrawal batch finished"
        );

        report
    }
}

/// Gateway failures that end settlement of an intent outright.
fn abandon_reason(err: GatewayError) -> AbandonReason {
    match err {
        GatewayError::Connectivity(reason) => AbandonReason::Connectivity(reason),
        err => AbandonReason::Rejected(err.to_string()),
    }
}
