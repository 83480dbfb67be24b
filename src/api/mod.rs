//! API layer - HTTP endpoint handlers organized by domain.

mod companies;
mod health;
mod metrics;
mod routes;

pub use companies::{CompanyForm, SortQuery};
pub use health::{health, stats};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
