use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::broadcast::BroadcastConfig;

use super::Cli;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty allows any http/https origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Simulated delay in milliseconds for HTMX interactions
    #[serde(default)]
    pub simulated_delay_ms: u64,
    /// JSON file backing the company records
    #[serde(default = "default_data_file")]
    pub data_file: String,
    /// Built frontend assets served under /ui
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Pending payloads per subscriber before it is evicted
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Write deadline for a single frame, in seconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_file() -> String {
    "./data/companies.json".to_string()
}

fn default_static_dir() -> String {
    "web/frontend/dist".to_string()
}

fn default_buffer_capacity() -> usize {
    16
}

fn default_write_timeout() -> u64 {
    5 // seconds
}

impl Settings {
    /// Load settings. Precedence, highest first: command line, environment
    /// (`HTMX_APP_SERVER__PORT`, ...), config files, defaults.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("app.simulated_delay_ms", 0)?
            .set_default("app.data_file", default_data_file())?
            .set_default("app.static_dir", default_static_dir())?
            .set_default("notifications.buffer_capacity", default_buffer_capacity() as u64)?
            .set_default("notifications.write_timeout_secs", default_write_timeout())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false));

        if let Some(path) = &cli.config_file {
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        builder = builder
            .add_source(
                Environment::with_prefix("HTMX_APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            )
            .set_override_option("server.host", cli.host.clone())?
            .set_override_option("server.port", cli.port)?
            .set_override_option("app.simulated_delay_ms", cli.simulated_delay_ms)?;

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.notifications.buffer_capacity == 0 {
            return Err(ConfigError::Message(
                "notifications.buffer_capacity must be at least 1".into(),
            ));
        }
        if self.notifications.write_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "notifications.write_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn simulated_delay(&self) -> Duration {
        Duration::from_millis(self.app.simulated_delay_ms)
    }

    pub fn broadcast_config(&self) -> BroadcastConfig {
        BroadcastConfig {
            buffer_capacity: self.notifications.buffer_capacity,
            write_timeout: Duration::from_secs(self.notifications.write_timeout_secs),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            app: AppConfig::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            simulated_delay_ms: 0,
            data_file: default_data_file(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            write_timeout_secs: default_write_timeout(),
        }
    }
}
