// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! One-shot, cancellable automatic start.
//!
//! A scheduled start runs on a spawned task after it yields to the runtime once,
//! so registrations made in the same synchronous stretch are all queued before
//! it fires. On a current-thread runtime that stretch is everything up to the
//! caller's next `.await`.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::lock;

struct PendingStart {
    id: u64,
    token: CancellationToken,
}

/// Holds at most one pending automatic start.
#[derive(Default)]
pub struct AutoStartScheduler {
    pending: Arc<Mutex<Option<PendingStart>>>,
    next_id: AtomicU64,
}

impl AutoStartScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `fire` to run after the current task yields.
    ///
    /// Returns `false` without scheduling when a start is already pending or
    /// when called outside a tokio runtime.
    pub fn schedule<F, Fut>(&self, fire: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!("No tokio runtime; automatic start not scheduled");
            return false;
        };

        let token = CancellationToken::new();
        let id = {
            let mut pending = lock(&self.pending);
            if pending.is_some() {
                return false;
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            *pending = Some(PendingStart {
                id,
                token: token.clone(),
            });
            id
        };

        let slot = Arc::clone(&self.pending);
        runtime.spawn(async move {
            tokio::task::yield_now().await;
            {
                // Cancellation happens under the same lock.
                let mut pending = lock(&slot);
                if token.is_cancelled() {
                    return;
                }
                if pending.as_ref().is_some_and(|p| p.id == id) {
                    *pending = None;
                }
            }
            fire().await;
        });

        tracing::debug!(id, "Automatic start scheduled");
        true
    }

    /// Cancel the pending start, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match lock(&self.pending).take() {
            Some(pending) => {
                pending.token.cancel();
                tracing::debug!(id = pending.id, "Automatic start cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.pending).is_some()
    }
}
