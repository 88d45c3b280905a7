// Relay configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Default listen port for the relay
pub const DEFAULT_PORT: u16 = 59001;

/// Runtime settings for a relay server.
///
/// Every field has a default, so a config file only needs to name the
/// values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the listener binds to
    pub listen_addr: SocketAddr,
    /// Upper bound on concurrently served connections
    pub max_connections: usize,
    /// Longest accepted inbound line in bytes, excluding the terminator
    pub max_line_length: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 500,
            max_line_length: 8192,
        }
    }
}

impl RelayConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            anyhow::bail!("max_connections must be at least 1");
        }
        if self.max_line_length == 0 {
            anyhow::bail!("max_line_length must be at least 1");
        }
        Ok(())
    }
}
