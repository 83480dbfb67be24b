use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

/// Capability to forcibly terminate one subscriber's connection.
///
/// The broadcaster invokes it on a freshly spawned task, so implementations
/// may take as long as connection teardown needs without holding up
/// [`publish`](super::BroadcastServer::publish).
#[async_trait]
pub trait CloseSlow: Send + Sync {
    async fn close_slow(&self);
}

/// [`CloseSlow`] for connections served by
/// [`accept`](super::BroadcastServer::accept).
///
/// Firing it wakes the delivery loop, which abandons any in-flight write and
/// closes the connection with the slow-consumer reason.
#[derive(Debug, Default)]
pub struct EvictionSignal {
    fired: AtomicBool,
    notify: Notify,
}

impl EvictionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.fired.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Resolves once [`fire`](Self::fire) has been called. Cancel safe.
    pub async fn fired(&self) {
        if self.is_fired() {
            return;
        }
        self.notify.notified().await;
    }
}

#[async_trait]
impl CloseSlow for EvictionSignal {
    async fn close_slow(&self) {
        self.fire();
    }
}
