mod cli;
mod settings;

pub use cli::Cli;
pub use settings::{AppConfig, NotificationsConfig, ServerConfig, Settings};
