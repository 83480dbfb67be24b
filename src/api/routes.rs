use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::{simulated_delay, AppState};

use super::companies::{
    add_company, cancel_existing_company, cancel_new_company, delete_company, edit_company, index,
    save_existing_company, save_new_company, table,
};
use super::health::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes(state: AppState) -> Router<AppState> {
    // HTMX interactions, optionally slowed down for demos
    let companies = Router::new()
        .route("/companies", get(index))
        .route("/companies/table", get(table))
        .route("/company/add", get(add_company))
        .route("/company", post(save_new_company).get(cancel_new_company))
        .route("/company/edit/{id}", get(edit_company))
        .route(
            "/company/{id}",
            get(cancel_existing_company)
                .put(save_existing_company)
                .delete(delete_company),
        )
        .route_layer(middleware::from_fn_with_state(state, simulated_delay));

    Router::new()
        // Health, stats & metrics
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        .merge(companies)
}
