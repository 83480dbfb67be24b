use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use super::AppState;

/// Delay every HTMX interaction by the configured amount, so loading
/// indicators and request ordering can be observed during demos.
pub async fn simulated_delay(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let delay = state.settings.simulated_delay();
    if !delay.is_zero() {
        tracing::trace!(delay_ms = delay.as_millis() as u64, "Applying simulated delay");
        tokio::time::sleep(delay).await;
    }

    next.run(req).await
}
