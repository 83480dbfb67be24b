use axum::{extract::State, Json};
use serde::Serialize;

use crate::broadcast::BroadcastStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub subscribers: SubscriberStats,
    pub notifications: BroadcastStatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct SubscriberStats {
    pub active: usize,
    pub buffer_capacity: usize,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        subscribers: SubscriberStats {
            active: state.broadcaster.subscriber_count(),
            buffer_capacity: state.broadcaster.config().buffer_capacity,
        },
        notifications: state.broadcaster.stats(),
    })
}
