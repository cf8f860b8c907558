// src/cancel.rs
//! Hierarchical cancellation built on `tokio::sync::watch`.
//!
//! A child observes its own flag and every ancestor's; cancelling a child never
//! touches the parent. The process owns the root token, each streaming request
//! a child, so a dropped connection stops its own pacing timers and fetches while
//! shutdown stops everything, background retries included.

use std::sync::Arc;

use futures::future::select_all;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct CancelToken {
    /// Root first, own flag last. Never empty.
    chain: Vec<Arc<watch::Sender<bool>>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            chain: vec![Arc::new(tx)],
        }
    }

    pub fn child(&self) -> Self {
        let (tx, _rx) = watch::channel(false);
        let mut chain = self.chain.clone();
        chain.push(Arc::new(tx));
        Self { chain }
    }

    /// Cancel this token and its descendants. Idempotent.
    pub fn cancel(&self) {
        if let Some(own) = self.chain.last() {
            own.send_replace(true);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.chain.iter().any(|tx| *tx.borrow())
    }

    /// Resolves once this token or any ancestor is cancelled.
    pub async fn cancelled(&self) {
        let waits = self.chain.iter().map(|tx| {
            let mut rx = tx.subscribe();
            Box::pin(async move {
                // Senders outlive `self`, so this only returns on `true`.
                let _ = rx.wait_for(|flag| *flag).await;
            })
        });
        select_all(waits).await;
    }

    /// Cancels the token when the guard is dropped.
    pub fn drop_guard(&self) -> DropGuard {
        DropGuard {
            token: Some(self.clone()),
        }
    }
}

#[derive(Debug)]
pub struct DropGuard {
    token: Option<CancelToken>,
}

impl DropGuard {
    /// Give the token back without cancelling it.
    pub fn disarm(mut self) -> CancelToken {
        // Only `disarm` and `drop` take the token, and `disarm` consumes self.
        self.token.take().unwrap_or_default()
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}
