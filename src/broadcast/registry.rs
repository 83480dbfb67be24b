//! Subscriber registry shared between publishers and delivery loops.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::ws::Utf8Bytes;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::metrics::{BroadcastMetrics, SUBSCRIBERS_ACTIVE};

use super::CloseSlow;

/// Registry entry for one connected subscriber
struct Subscriber {
    sender: mpsc::Sender<Utf8Bytes>,
    close_slow: Arc<dyn CloseSlow>,
    /// Set once the buffer overflowed; no further payloads are offered
    evicted: bool,
}

/// Counters for the broadcaster
#[derive(Debug, Default)]
pub struct BroadcastStats {
    /// Payloads passed to publish
    pub published: AtomicU64,
    /// Frames written to subscriber connections
    pub delivered: AtomicU64,
    /// Subscribers dropped for being too slow
    pub evicted: AtomicU64,
}

impl BroadcastStats {
    pub fn snapshot(&self) -> BroadcastStatsSnapshot {
        BroadcastStatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastStatsSnapshot {
    pub published: u64,
    pub delivered: u64,
    pub evicted: u64,
}

/// Outcome of offering one payload to every subscriber
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct FanOut {
    pub queued: usize,
    pub evicted: usize,
}

/// The set of active subscribers, guarded by a single lock.
///
/// The lock covers map bookkeeping and `try_send` only. Nothing that awaits
/// ever runs while it is held.
pub(super) struct Registry {
    subscribers: Mutex<HashMap<Uuid, Subscriber>>,
    pub(super) stats: BroadcastStats,
}

impl Registry {
    pub(super) fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            stats: BroadcastStats::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Subscriber>> {
        // Entries stay consistent even if a holder panicked
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn insert(
        self: &Arc<Self>,
        capacity: usize,
        close_slow: Arc<dyn CloseSlow>,
    ) -> Subscription {
        let (sender, receiver) = mpsc::channel(capacity);
        let id = Uuid::new_v4();

        self.lock().insert(
            id,
            Subscriber {
                sender,
                close_slow,
                evicted: false,
            },
        );
        SUBSCRIBERS_ACTIVE.inc();

        tracing::debug!(subscriber_id = %id, capacity, "Subscriber registered");

        Subscription {
            id,
            receiver,
            registry: Arc::clone(self),
        }
    }

    fn remove(&self, id: Uuid) {
        if self.lock().remove(&id).is_some() {
            SUBSCRIBERS_ACTIVE.dec();
            tracing::debug!(subscriber_id = %id, "Subscriber unregistered");
        }
    }

    pub(super) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Offer `payload` to every subscriber without waiting.
    ///
    /// A full buffer marks its subscriber evicted and spawns its
    /// [`CloseSlow`] action. Must be called from within a Tokio runtime.
    pub(super) fn fan_out(&self, payload: &Utf8Bytes) -> FanOut {
        let mut result = FanOut::default();
        let mut subscribers = self.lock();

        for (id, subscriber) in subscribers.iter_mut() {
            if subscriber.evicted {
                continue;
            }

            match subscriber.sender.try_send(payload.clone()) {
                Ok(()) => result.queued += 1,
                Err(TrySendError::Full(_)) => {
                    subscriber.evicted = true;
                    result.evicted += 1;

                    tracing::info!(
                        subscriber_id = %id,
                        capacity = subscriber.sender.max_capacity(),
                        "Subscriber buffer full, evicting slow consumer"
                    );

                    let close_slow = Arc::clone(&subscriber.close_slow);
                    tokio::spawn(async move {
                        close_slow.close_slow().await;
                    });
                }
                // Delivery loop already exited; its guard removes the entry
                Err(TrySendError::Closed(_)) => {}
            }
        }
        drop(subscribers);

        if result.evicted > 0 {
            self.stats
                .evicted
                .fetch_add(result.evicted as u64, Ordering::Relaxed);
            BroadcastMetrics::record_evicted(result.evicted);
        }

        result
    }
}

/// Membership of one subscriber in the registry.
///
/// Owns the receiving end of the subscriber's buffer. Dropping it removes
/// the subscriber from the registry and discards anything still buffered,
/// whichever way the owning task exits.
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::Receiver<Utf8Bytes>,
    registry: Arc<Registry>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next buffered payload. Cancel safe.
    pub async fn recv(&mut self) -> Option<Utf8Bytes> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Utf8Bytes> {
        self.receiver.try_recv().ok()
    }

    /// Number of payloads waiting in the buffer
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pending", &self.receiver.len())
            .finish()
    }
}
