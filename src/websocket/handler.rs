use std::time::Instant;

use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
};
use futures::StreamExt;

use crate::broadcast::{Closure, SubscriptionError};
use crate::metrics::BroadcastMetrics;
use crate::server::AppState;

/// WebSocket upgrade handler for change notifications
#[tracing::instrument(name = "ws.upgrade", skip(ws, state))]
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    tracing::debug!("WebSocket upgrade requested");

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serve an established WebSocket until it closes, fails or is evicted
#[tracing::instrument(name = "ws.connection", skip(socket, state))]
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_start = Instant::now();
    let (ws_sender, ws_receiver) = socket.split();

    tracing::info!(
        subscribers = state.broadcaster.subscriber_count() + 1,
        "WebSocket subscriber connected"
    );

    let outcome = state.broadcaster.accept(ws_sender, ws_receiver).await;

    let duration = connection_start.elapsed().as_secs_f64();
    let label = match &outcome {
        Ok(closure) => closure.as_label(),
        Err(e) => e.as_label(),
    };
    BroadcastMetrics::record_closed(label, duration);

    log_outcome(&outcome, duration);
}

fn log_outcome(outcome: &Result<Closure, SubscriptionError>, duration_secs: f64) {
    match outcome {
        Ok(Closure::Evicted) => {
            tracing::info!(duration_secs, "Slow WebSocket subscriber evicted");
        }
        Ok(closure) => {
            tracing::debug!(duration_secs, closure = ?closure, "WebSocket subscriber disconnected");
        }
        Err(e) => {
            tracing::warn!(duration_secs, error = %e, "WebSocket subscription failed");
        }
    }
}
