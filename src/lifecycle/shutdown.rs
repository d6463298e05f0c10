//! Shutdown coordination for the render server.

use std::future::Future;
use tokio::sync::watch;

/// Latched shutdown flag shared by the server, the reload task and the
/// signal waiter.
///
/// Waiters that subscribe after the trigger still observe it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn trigger(&self) {
        if !self.tx.send_replace(true) {
            tracing::info!("Shutdown triggered");
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Tasks currently waiting on shutdown.
    pub fn waiter_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Resolves once shutdown is triggered, for `with_graceful_shutdown`.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // Err means every sender is gone, which cannot outlive a trigger.
            let _ = rx.wait_for(|triggered| *triggered).await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_resolves_after_trigger() {
        let shutdown = Shutdown::new();
        let waiter = tokio::spawn(shutdown.wait());
        shutdown.trigger();
        waiter.await.unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_late_waiter_sees_earlier_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();
        tokio::time::timeout(std::time::Duration::from_secs(1), shutdown.wait())
            .await
            .unwrap();
    }

    #[test]
    fn test_waiters_are_counted() {
        let shutdown = Shutdown::new();
        let first = shutdown.wait();
        assert_eq!(shutdown.waiter_count(), 1);
        drop(first);
        assert_eq!(shutdown.waiter_count(), 0);
    }
}
