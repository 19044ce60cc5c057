//! Interrupt flag shared between the signal task and the I/O loop

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

/// Latching interrupt request
///
/// Once raised it stays raised. The I/O loop waits on it concurrently with
/// the next line, so an interrupt wins even while the simulator is silent.
#[derive(Debug, Clone)]
pub struct InterruptFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_raised(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the flag is raised
    pub async fn raised(&self) {
        let mut rx = self.tx.subscribe();
        if rx.wait_for(|raised| *raised).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Raise the flag on Ctrl+C
    pub fn watch_ctrl_c(&self) -> JoinHandle<()> {
        let flag = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping the simulator");
                flag.raise();
            }
        })
    }
}

impl Default for InterruptFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_raise_latches() {
        let flag = InterruptFlag::new();
        assert!(!flag.is_raised());
        flag.raise();
        assert!(flag.is_raised());
        // already raised: resolves immediately
        tokio::time::timeout(Duration::from_millis(100), flag.raised())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_raise_from_clone_wakes_waiter() {
        let flag = InterruptFlag::new();
        let remote = flag.clone();
        let waiter = tokio::spawn(async move { flag.raised().await });
        tokio::task::yield_now().await;
        remote.raise();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
