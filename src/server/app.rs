use std::path::Path;

use axum::{http::HeaderValue, response::Redirect, routing::get, Router};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::api::api_routes;
use crate::websocket::ws_handler;

use super::AppState;

const UI_PREFIX: &str = "/ui";
const DEFAULT_UI_FILE: &str = "index.html";

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.server.cors_origins);

    // Unknown asset paths fall back to the UI entry page
    let static_dir = Path::new(&state.settings.app.static_dir);
    let ui = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join(DEFAULT_UI_FILE)));

    Router::new()
        // WebSocket endpoint
        .route("/ws", get(ws_handler))
        // Merge API routes
        .merge(api_routes(state.clone()))
        // Static frontend
        .nest_service(UI_PREFIX, ui)
        .route("/", get(|| async { Redirect::permanent(UI_PREFIX) }))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Add state
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::predicate(|origin: &HeaderValue, _| {
            origin.as_bytes().starts_with(b"http://") || origin.as_bytes().starts_with(b"https://")
        })
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
