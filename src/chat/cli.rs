// Command-line arguments for the relay server

use crate::chat::config::RelayConfig;
use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Line-oriented chat relay with block lists and private groups
#[derive(Debug, Parser)]
#[command(name = "relaychat-server")]
#[command(author, version, about, long_about = None)]
pub struct RelayCli {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on (default: 0.0.0.0:59001)
    #[arg(short, long)]
    pub listen: Option<SocketAddr>,

    /// Maximum number of concurrent connections (default: 500)
    #[arg(short, long)]
    pub max_connections: Option<usize>,

    /// Log filter, e.g. "debug" or "relaychat=trace"
    #[arg(long, default_value = "relaychat=info,warn")]
    pub log_level: String,
}

impl RelayCli {
    /// Build the effective config from the optional file and flags
    pub fn resolve_config(&self) -> Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::load(path)?,
            None => RelayConfig::default(),
        };

        if let Some(addr) = self.listen {
            config.listen_addr = addr;
        }
        if let Some(max) = self.max_connections {
            config.max_connections = max;
        }

        config.validate()?;
        Ok(config)
    }
}
