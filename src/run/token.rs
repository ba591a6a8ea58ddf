// src/run/token.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Shared "this run is still live" flag.
///
/// Every task spawned for a run gets a clone. Cancelling is level-triggered:
/// the flag flips once and tasks notice at their next check point, or
/// immediately if they are parked in [`RunToken::cancelled`].
#[derive(Debug, Clone, Default)]
pub struct RunToken {
    inner: Arc<TokenInner>,
}

#[derive(Debug, Default)]
struct TokenInner {
    running: AtomicBool,
    notify: Notify,
}

impl RunToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Returns `false` if it was already raised.
    pub fn activate(&self) -> bool {
        !self.inner.running.swap(true, Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Lower the flag and wake every waiter.
    ///
    /// Returns `true` only for the call that actually flipped it.
    pub fn cancel(&self) -> bool {
        let was_running = self.inner.running.swap(false, Ordering::SeqCst);
        if was_running {
            self.inner.notify.notify_waiters();
        }
        was_running
    }

    /// Resolve once the flag is lowered.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn only_the_flipping_call_reports_success() {
        let token = RunToken::new();
        assert!(!token.cancel());
        assert!(token.activate());
        assert!(!token.activate());
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(!token.is_running());
    }

    #[tokio::test]
    async fn cancelled_wakes_parked_waiters() {
        let token = RunToken::new();
        token.activate();

        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_returns_immediately_when_not_running() {
        let token = RunToken::new();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("idle token counts as cancelled");
    }
}
