//! Dual-clock gate: waits until enough blocks AND enough wall-clock time
//! have passed.

use std::{future::Future, time::Duration};

use tracing::{debug, info};

use crate::{clock::ChainClock, error::DexError, shutdown::Shutdown, types::SettlementWindow};

/// Polling behaviour of [`DualClockWaiter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Delay between two clock reads.
    pub poll_interval: Duration,

    /// Upper bound on a single wait, in wall-clock time since it began.
    /// Never shorter than the window's own time requirement plus one poll.
    pub max_wait: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(600),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Both clocks reached their targets.
    Elapsed,
    /// Shutdown was requested while waiting.
    Cancelled,
    /// [`WaitPolicy::max_wait`] passed before both clocks were satisfied.
    DeadlineExceeded,
}

/// Suspends the caller until a [`SettlementWindow`] has elapsed, counted
/// from the moment the wait begins.
///
/// Sleeping is delegated to the provided `sleep` function, normally
/// [`tokio::time::sleep`].
#[derive(Clone, Debug)]
pub struct DualClockWaiter<C, S> {
    clock: C,
    sleep: S,
    policy: WaitPolicy,
}

impl<C, S, SFut> DualClockWaiter<C, S>
where
    C: ChainClock,
    S: Fn(Duration) -> SFut,
    SFut: Future<Output = ()>,
{
    pub fn new(clock: C, sleep: S, policy: WaitPolicy) -> Self {
        Self {
            clock,
            sleep,
            policy,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    /// Waits for `window` to elapse.
    ///
    /// An already open window returns immediately without touching the clock.
    /// Clock failures are propagated, they are never waited out.
    pub async fn wait(
        &self,
        window: SettlementWindow,
        shutdown: &Shutdown,
    ) -> Result<WaitOutcome, DexError> {
        if window.is_open() {
            return Ok(WaitOutcome::Elapsed);
        }

        let start_block = self.clock.block_number().await?;
        let start_time = self.clock.now();
        let target_block = start_block.saturating_add(window.remaining_blocks());
        let target_time = start_time.saturating_add(window.remaining_seconds());
        let max_wait = self.policy.max_wait.as_secs().max(
            window
                .remaining_seconds()
                .saturating_add(self.policy.poll_interval.as_secs()),
        );

        loop {
            if shutdown.is_requested() {
                return Ok(WaitOutcome::Cancelled);
            }

            let current_block = self.clock.block_number().await?;
            let now = self.clock.now();
            let blocks_left = target_block.saturating_sub(current_block);
            let seconds_left = target_time.saturating_sub(now);

            if blocks_left == 0 && seconds_left == 0 {
                info!(
                    blocks = window.remaining_blocks(),
                    seconds = window.remaining_seconds(),
                    "Settlement window elapsed"
                );
                return Ok(WaitOutcome::Elapsed);
            }

            if now.saturating_sub(start_time) >= max_wait {
                return Ok(WaitOutcome::DeadlineExceeded);
            }

            debug!(blocks_left, seconds_left, "Waiting for settlement window");

            if !self.pause(self.policy.poll_interval, shutdown).await {
                return Ok(WaitOutcome::Cancelled);
            }
        }
    }

    /// Sleeps for `duration`. Returns `false` if interrupted by shutdown.
    pub async fn pause(&self, duration: Duration, shutdown: &Shutdown) -> bool {
        tokio::select! {
            biased;
            _ = shutdown.requested() => false,
            _ = (self.sleep)(duration) => true,
        }
    }
}
