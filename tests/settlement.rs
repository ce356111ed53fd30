use std::time::Duration;

use dex_withdraw::{
    gateway::GatewayError,
    hasher::{Keccak256Hasher, SettlementHasher},
    orchestrator::{Orchestrator, ReservePolicy, SettlementPolicy, plan},
    shutdown::{self, Shutdown},
    testing::{self, ACCOUNT, GatewayCall, ManualClock, ScriptedGateway, instant_sleep},
    types::{
        AbandonReason, SettlementLimits, SettlementOutcome, SkipReason, TokenOutcome,
        WithdrawalHandle,
    },
    waiter::{DualClockWaiter, WaitPolicy},
};
use alloy::primitives::U256;
use fastnum::udec128;

const START_BLOCK: u64 = 1_000;
const START_TIME: u64 = 1_700_000_000;

fn clock() -> ManualClock {
    ManualClock::new(START_BLOCK, START_TIME, 2)
}

fn units(amount: u64, decimals: u32) -> U256 {
    U256::from(amount) * U256::from(10u64).pow(U256::from(decimals))
}

#[tokio::test]
async fn test_pending_previous_is_recovered() {
    let intent = testing::intent("USDC", udec128!(100));
    let handle = testing::key(0xab);
    let gateway = ScriptedGateway::new()
        .on_request(Err(testing::pending_previous()))
        .on_pending(Ok(WithdrawalHandle::Pending(handle)))
        .on_apply(Ok(Some(testing::receipt(1))));
    let clock = clock();
    let waiter = DualClockWaiter::new(clock.clone(), clock.sleeper(), WaitPolicy::default());
    let orchestrator =
        Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, SettlementPolicy::default());

    let outcome = orchestrator.settle(&intent, &Shutdown::never()).await;

    assert_eq!(
        outcome,
        SettlementOutcome::Applied {
            key: handle,
            receipt: testing::receipt(1),
            wait_cycles: 0,
        }
    );
    assert_eq!(
        gateway.calls(),
        vec![
            GatewayCall::Request {
                symbol: "USDC".to_string()
            },
            GatewayCall::Pending {
                account: ACCOUNT,
                token: testing::USDC
            },
            GatewayCall::Apply(handle),
        ]
    );
}

#[tokio::test]
async fn test_pending_lookup_failure_abandons() {
    let intent = testing::intent("USDC", udec128!(100));
    let gateway = ScriptedGateway::new().on_request(Err(testing::pending_previous()));
    let waiter = DualClockWaiter::new(clock(), instant_sleep, WaitPolicy::default());
    let orchestrator =
        Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, SettlementPolicy::default());

    let outcome = orchestrator.settle(&intent, &Shutdown::never()).await;

    assert!(matches!(
        outcome,
        SettlementOutcome::Abandoned(AbandonReason::NoPendingHandle(_))
    ));
    assert_eq!(gateway.pending_count(), 1);
    assert!(gateway.apply_keys().is_empty());
}

#[tokio::test]
async fn test_too_early_retries_with_same_key() {
    let intent = testing::intent("ETH", udec128!(2));
    let payload = testing::payload(&intent, 42);
    let gateway = ScriptedGateway::new()
        .on_request(Ok(WithdrawalHandle::Requested(payload)))
        .on_apply(Err(testing::too_early(0, 0)))
        .on_apply(Ok(Some(testing::receipt(2))));
    let clock = clock();
    let waiter = DualClockWaiter::new(clock.clone(), clock.sleeper(), WaitPolicy::default());
    let orchestrator =
        Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, SettlementPolicy::default());

    let outcome = orchestrator.settle(&intent, &Shutdown::never()).await;

    let key = Keccak256Hasher.settlement_key(&payload);
    assert_eq!(
        outcome,
        SettlementOutcome::Applied {
            key,
            receipt: testing::receipt(2),
            wait_cycles: 1,
        }
    );
    assert_eq!(gateway.apply_keys(), vec![key, key]);
    assert_eq!(gateway.request_count(), 1);
    // Full window of 2 blocks and 60 seconds waited out.
    assert!(clock.now_secs() >= START_TIME + 60);
    assert!(clock.current_block() >= START_BLOCK + 2);
}

#[tokio::test]
async fn test_partially_elapsed_window_waits_remainder() {
    let intent = testing::intent("ETH", udec128!(2));
    let gateway = ScriptedGateway::new()
        .on_apply(Err(testing::too_early(5, 42)))
        .on_apply(Ok(Some(testing::receipt(3))));
    let clock = clock();
    let waiter = DualClockWaiter::new(clock.clone(), clock.sleeper(), WaitPolicy::default());
    let orchestrator =
        Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, SettlementPolicy::default());

    let outcome = orchestrator.settle(&intent, &Shutdown::never()).await;

    assert!(outcome.is_applied());
    assert!(clock.now_secs() >= START_TIME + 18);
    assert!(clock.now_secs() < START_TIME + 60);
}

#[tokio::test]
async fn test_already_open_window_retries_without_waiting() {
    let intent = testing::intent("ETH", udec128!(2));
    let gateway = ScriptedGateway::new()
        .on_apply(Err(testing::too_early(3, 61)))
        .on_apply(Ok(Some(testing::receipt(4))));
    let clock = clock();
    let waiter = DualClockWaiter::new(clock.clone(), clock.sleeper(), WaitPolicy::default());
    let orchestrator =
        Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, SettlementPolicy::default());

    let outcome = orchestrator.settle(&intent, &Shutdown::never()).await;

    assert!(outcome.is_applied());
    assert_eq!(gateway.apply_keys().len(), 2);
    assert_eq!(clock.sleeps(), 0);
    assert_eq!(clock.block_reads(), 0);
}

#[tokio::test]
async fn test_empty_apply_result_abandons_without_waiting() {
    let intent = testing::intent("USDC", udec128!(5));
    let gateway = ScriptedGateway::new().on_apply(Ok(None));
    let clock = clock();
    let waiter = DualClockWaiter::new(clock.clone(), clock.sleeper(), WaitPolicy::default());
    let orchestrator =
        Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, SettlementPolicy::default());

    let outcome = orchestrator.settle(&intent, &Shutdown::never()).await;

    assert_eq!(
        outcome,
        SettlementOutcome::Abandoned(AbandonReason::EmptyApplyResult)
    );
    assert_eq!(gateway.apply_keys().len(), 1);
    assert_eq!(clock.sleeps(), 0);
}

#[tokio::test]
async fn test_unclassified_request_rejection_abandons() {
    let intent = testing::intent("USDC", udec128!(5));
    let gateway = ScriptedGateway::new().on_request(Err(GatewayError::Rejected(
        "insufficient balance".to_string(),
    )));
    let waiter = DualClockWaiter::new(clock(), instant_sleep, WaitPolicy::default());
    let orchestrator =
        Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, SettlementPolicy::default());

    let outcome = orchestrator.settle(&intent, &Shutdown::never()).await;

    assert_eq!(
        outcome,
        SettlementOutcome::Abandoned(AbandonReason::Rejected(
            "insufficient balance".to_string()
        ))
    );
    assert_eq!(gateway.pending_count(), 0);
    assert!(gateway.apply_keys().is_empty());
}

#[tokio::test]
async fn test_connectivity_failure_on_request_abandons() {
    let intent = testing::intent("USDC", udec128!(5));
    let gateway = ScriptedGateway::new().on_request(Err(GatewayError::Connectivity(
        "connection refused".to_string(),
    )));
    let waiter = DualClockWaiter::new(clock(), instant_sleep, WaitPolicy::default());
    let orchestrator =
        Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, SettlementPolicy::default());

    let outcome = orchestrator.settle(&intent, &Shutdown::never()).await;

    assert!(matches!(
        outcome,
        SettlementOutcome::Abandoned(AbandonReason::Connectivity(_))
    ));
    assert_eq!(gateway.request_count(), 1);
    assert_eq!(gateway.pending_count(), 0);
    assert!(gateway.apply_keys().is_empty());
}

#[tokio::test]
async fn test_unclassified_apply_rejection_abandons() {
    let intent = testing::intent("USDC", udec128!(5));
    let gateway = ScriptedGateway::new()
        .on_apply(Err(GatewayError::Rejected("INVALID_SIGNATURE".to_string())));
    let waiter = DualClockWaiter::new(clock(), instant_sleep, WaitPolicy::default());
    let orchestrator =
        Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, SettlementPolicy::default());

    let outcome = orchestrator.settle(&intent, &Shutdown::never()).await;

    assert_eq!(
        outcome,
        SettlementOutcome::Abandoned(AbandonReason::Rejected("INVALID_SIGNATURE".to_string()))
    );
    assert_eq!(gateway.apply_keys().len(), 1);
}

#[tokio::test]
async fn test_wait_budget_exhausted() {
    let intent = testing::intent("ETH", udec128!(1));
    let mut gateway = ScriptedGateway::new();
    for _ in 0..4 {
        gateway = gateway.on_apply(Err(testing::too_early(0, 0)));
    }
    let clock = clock();
    let waiter = DualClockWaiter::new(clock.clone(), clock.sleeper(), WaitPolicy::default());
    let policy = SettlementPolicy {
        max_wait_cycles: 3,
        ..SettlementPolicy::default()
    };
    let orchestrator = Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, policy);

    let outcome = orchestrator.settle(&intent, &Shutdown::never()).await;

    assert_eq!(
        outcome,
        SettlementOutcome::Abandoned(AbandonReason::WaitBudgetExhausted(3))
    );
    // Initial attempt plus one retry per wait cycle.
    assert_eq!(gateway.apply_keys().len(), 4);
}

#[tokio::test]
async fn test_stalled_chain_hits_wait_deadline() {
    let intent = testing::intent("ETH", udec128!(1));
    let gateway = ScriptedGateway::new().on_apply(Err(testing::too_early(0, 60)));
    let clock = ManualClock::new(START_BLOCK, START_TIME, 0);
    let waiter = DualClockWaiter::new(
        clock.clone(),
        clock.sleeper(),
        WaitPolicy {
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(120),
        },
    );
    let orchestrator =
        Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, SettlementPolicy::default());

    let outcome = orchestrator.settle(&intent, &Shutdown::never()).await;

    assert_eq!(
        outcome,
        SettlementOutcome::Abandoned(AbandonReason::WaitDeadlineExceeded)
    );
    assert_eq!(gateway.apply_keys().len(), 1);
}

#[tokio::test]
async fn test_clock_failure_while_waiting_abandons() {
    let intent = testing::intent("ETH", udec128!(1));
    let gateway = ScriptedGateway::new().on_apply(Err(testing::too_early(0, 0)));
    let clock = clock();
    clock.fail_block_reads_after(0);
    let waiter = DualClockWaiter::new(clock.clone(), clock.sleeper(), WaitPolicy::default());
    let orchestrator =
        Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, SettlementPolicy::default());

    let outcome = orchestrator.settle(&intent, &Shutdown::never()).await;

    assert!(matches!(
        outcome,
        SettlementOutcome::Abandoned(AbandonReason::Connectivity(_))
    ));
    assert_eq!(gateway.apply_keys().len(), 1);
}

#[tokio::test]
async fn test_time_limit_above_max_wait_still_settles() {
    let intent = testing::intent("ETH", udec128!(1));
    let gateway = ScriptedGateway::new()
        .on_apply(Err(testing::too_early(0, 0)))
        .on_apply(Ok(Some(testing::receipt(4))));
    let clock = clock();
    let waiter = DualClockWaiter::new(clock.clone(), clock.sleeper(), WaitPolicy::default());
    let policy = SettlementPolicy {
        limits: SettlementLimits {
            block_limit: 2,
            time_limit: 900,
        },
        ..SettlementPolicy::default()
    };
    let orchestrator = Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, policy);

    let outcome = orchestrator.settle(&intent, &Shutdown::never()).await;

    assert!(outcome.is_applied());
    assert_eq!(gateway.apply_keys().len(), 2);
    assert!(clock.now_secs() >= START_TIME + 900);
}

#[tokio::test]
async fn test_cancellation_mid_wait_never_applies() {
    let intent = testing::intent("ETH", udec128!(1));
    let gateway = ScriptedGateway::new().on_apply(Err(testing::too_early(0, 0)));
    let clock = clock();
    let (trigger, shutdown) = shutdown::channel();
    let sleeper = {
        let clock = clock.clone();
        move |duration: Duration| {
            clock.advance(duration);
            trigger.trigger();
            futures::future::ready(())
        }
    };
    let waiter = DualClockWaiter::new(clock.clone(), sleeper, WaitPolicy::default());
    let orchestrator =
        Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, SettlementPolicy::default());

    let outcome = orchestrator.settle(&intent, &shutdown).await;

    assert_eq!(outcome, SettlementOutcome::Cancelled);
    assert_eq!(gateway.apply_keys().len(), 1);
}

#[tokio::test]
async fn test_batch_isolation_and_order() {
    let plan = plan(
        [
            ("STRK".to_string(), units(3, 18)),
            ("USDC".to_string(), units(50, 6)),
            ("ETH".to_string(), units(1, 18)),
        ],
        &testing::registry(),
        ACCOUNT,
        &ReservePolicy::default(),
    );
    let gateway = ScriptedGateway::new()
        .on_apply(Ok(Some(testing::receipt(1))))
        .on_apply(Err(GatewayError::Connectivity("connection reset".to_string())))
        .on_apply(Ok(Some(testing::receipt(3))));
    let waiter = DualClockWaiter::new(clock(), instant_sleep, WaitPolicy::default());
    let orchestrator =
        Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, SettlementPolicy::default());

    let report = orchestrator.run_batch(&plan, &Shutdown::never()).await;

    let symbols: Vec<_> = report.entries.iter().map(|e| e.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["STRK", "USDC", "ETH"]);
    assert_eq!(report.get("STRK").unwrap().amount, Some(udec128!(2)));
    assert!(matches!(
        &report.get("USDC").unwrap().outcome,
        TokenOutcome::Settled(SettlementOutcome::Abandoned(AbandonReason::Connectivity(_)))
    ));
    assert!(matches!(
        &report.get("ETH").unwrap().outcome,
        TokenOutcome::Settled(SettlementOutcome::Applied { .. })
    ));
    assert_eq!(report.applied(), 2);
    assert_eq!(report.abandoned(), 1);
    assert_eq!(gateway.request_count(), 3);
}

#[tokio::test]
async fn test_batch_reports_skipped_tokens() {
    let plan = plan(
        [
            ("STRK".to_string(), units(1, 17)),
            ("USDC".to_string(), units(7, 6)),
        ],
        &testing::registry(),
        ACCOUNT,
        &ReservePolicy::default(),
    );
    let gateway = ScriptedGateway::new();
    let waiter = DualClockWaiter::new(clock(), instant_sleep, WaitPolicy::default());
    let orchestrator =
        Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, SettlementPolicy::default());

    let report = orchestrator.run_batch(&plan, &Shutdown::never()).await;

    assert_eq!(report.skipped(), 1);
    assert_eq!(report.applied(), 1);
    assert!(matches!(
        &report.get("STRK").unwrap().outcome,
        TokenOutcome::Skipped(SkipReason::BelowReserve { .. })
    ));
    assert_eq!(
        gateway.calls().first(),
        Some(&GatewayCall::Request {
            symbol: "USDC".to_string()
        })
    );
}

#[tokio::test]
async fn test_cancellation_marks_remaining_tokens_cancelled() {
    let plan = plan(
        [
            ("USDC".to_string(), units(7, 6)),
            ("ETH".to_string(), units(1, 18)),
            ("STRK".to_string(), units(5, 18)),
        ],
        &testing::registry(),
        ACCOUNT,
        &ReservePolicy::default(),
    );
    let gateway = ScriptedGateway::new();
    let clock = clock();
    let (trigger, shutdown) = shutdown::channel();
    // Shutdown arrives during the first pacing pause.
    let sleeper = {
        let clock = clock.clone();
        move |duration: Duration| {
            clock.advance(duration);
            trigger.trigger();
            futures::future::ready(())
        }
    };
    let waiter = DualClockWaiter::new(clock.clone(), sleeper, WaitPolicy::default());
    let orchestrator =
        Orchestrator::new(&gateway, &Keccak256Hasher, &waiter, SettlementPolicy::default());

    let report = orchestrator.run_batch(&plan, &shutdown).await;

    assert!(matches!(
        &report.get("USDC").unwrap().outcome,
        TokenOutcome::Settled(SettlementOutcome::Applied { .. })
    ));
    assert_eq!(report.cancelled(), 2);
    assert_eq!(gateway.request_count(), 1);
}
