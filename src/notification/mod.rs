//! Change notifications published to WebSocket subscribers.

mod types;

pub use types::{ChangeKind, NotificationEvent};
