use std::path::PathBuf;

use clap::Parser;

/// Command line overrides. Highest precedence of all configuration sources.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "htmx-company-board", version, about)]
pub struct Cli {
    /// Config file location
    #[arg(short = 'c', long = "config")]
    pub config_file: Option<PathBuf>,

    /// Server host interface
    #[arg(long)]
    pub host: Option<String>,

    /// Server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Simulated delay in milliseconds for HTMX interactions
    #[arg(long = "simulated-delay")]
    pub simulated_delay_ms: Option<u64>,
}
