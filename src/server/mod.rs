mod app;
mod middleware;
mod state;

pub use app::create_app;
pub use middleware::simulated_delay;
pub use state::AppState;
