//! Cooperative cancellation of a withdrawal run.
//!
//! [`ShutdownTrigger::trigger`] is observed by [`Shutdown`] at the next
//! suspension point of the run.

use tokio::sync::watch;

/// Creates a linked trigger/listener pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Listener side, cheap to clone.
#[derive(Clone, Debug)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Listener that is never triggered.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested, never if the trigger is dropped
    /// without firing.
    pub async fn requested(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|requested| *requested).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_trigger_is_observed() {
        let (trigger, shutdown) = channel();
        assert!(!shutdown.is_requested());

        let listener = shutdown.clone();
        let handle = tokio::spawn(async move { listener.requested().await });
        trigger.trigger();

        tokio_test::assert_ok!(tokio::time::timeout(Duration::from_secs(1), handle).await);
        assert!(shutdown.is_requested());
    }

    #[tokio::test]
    async fn test_never_does_not_resolve() {
        let shutdown = Shutdown::never();
        assert!(!shutdown.is_requested());
        tokio_test::assert_err!(
            tokio::time::timeout(Duration::from_millis(20), shutdown.requested()).await
        );
    }
}
