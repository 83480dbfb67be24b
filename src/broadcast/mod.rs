//! Real-time change notification broadcaster.
//!
//! A [`BroadcastServer`] keeps a registry of connected subscribers, each with
//! a bounded FIFO buffer. [`BroadcastServer::publish`] fans a payload out to
//! every buffer without ever waiting on the network; a subscriber whose buffer
//! is already full is evicted instead of slowing the publisher down.
//! [`BroadcastServer::accept`] serves one connection for its whole lifetime.

mod registry;
mod server;
mod signal;

use std::time::Duration;

use axum::extract::ws::close_code;
use thiserror::Error;

pub use registry::{BroadcastStats, BroadcastStatsSnapshot, Subscription};
pub use server::BroadcastServer;
pub use signal::{CloseSlow, EvictionSignal};

/// Close reason sent to a subscriber that could not keep up.
pub const SLOW_CONSUMER_REASON: &str = "connection too slow to keep up with messages";

/// Close code sent together with [`SLOW_CONSUMER_REASON`].
pub const SLOW_CONSUMER_CODE: u16 = close_code::POLICY;

/// Tuning for the broadcaster
#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// Pending payloads a subscriber may hold before it is evicted
    pub buffer_capacity: usize,
    /// Upper bound for a single frame write
    pub write_timeout: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 16,
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// How a subscription ended when nothing went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closure {
    /// Peer sent a normal or going-away close frame.
    PeerClosed { code: Option<u16> },
    /// Peer vanished without a close frame.
    Disconnected,
    /// Subscriber was dropped for being too slow.
    Evicted,
}

impl Closure {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::PeerClosed { .. } => "peer_closed",
            Self::Disconnected => "disconnected",
            Self::Evicted => "evicted",
        }
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure that ended one subscription. Never affects other subscribers.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),

    #[error("write failed: {0}")]
    Write(#[source] BoxError),

    #[error("read failed: {0}")]
    Read(#[source] BoxError),

    #[error("peer closed with code {code}: {reason}")]
    AbnormalClose { code: u16, reason: String },
}

impl SubscriptionError {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::WriteTimeout(_) => "write_timeout",
            Self::Write(_) => "write_error",
            Self::Read(_) => "read_error",
            Self::AbnormalClose { .. } => "abnormal_close",
        }
    }
}
