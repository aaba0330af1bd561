//! CLI definitions for Horizon.

use std::path::PathBuf;

use clap::Parser;

use horizon_config::Config;

/// Horizon CLI.
#[derive(Parser, Debug)]
#[command(name = "horizon")]
#[command(about = "Real-time server dashboard backend")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "horizon.toml", env = "HORIZON_CONFIG")]
    pub config: PathBuf,

    /// Listen host (overrides `server.host`)
    #[arg(long, env = "HORIZON_HOST")]
    pub host: Option<String>,

    /// Listen port (overrides `server.port`)
    #[arg(long, env = "HORIZON_PORT")]
    pub port: Option<u16>,

    /// SQLite database path (overrides `store.path`)
    #[arg(long, env = "HORIZON_DB_PATH")]
    pub db_path: Option<String>,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(path) = &self.db_path {
            config.store.path = path.clone();
        }
    }
}
