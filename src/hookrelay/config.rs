use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use log::debug;
use serde::Deserialize;

use crate::error::{ErrorCode, RelayError};
use crate::hookrelay::types::Topic;

pub const DEFAULT_ADDR: &str = ":8000";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address. `:port` binds all interfaces.
    pub addr: String,
    /// Topics consumed locally and written to stdout
    pub topics: Vec<Topic>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            topics: Vec::new(),
        }
    }
}

/// Relays HTTP request bodies to local topic consumers
#[derive(Debug, Parser)]
#[command(name = "hookrelay", version)]
pub struct Cli {
    /// Listen address
    #[arg(long, env = "HOOKRELAY_ADDR")]
    pub addr: Option<String>,

    /// Optional TOML file with `addr` and `topics`
    #[arg(long, env = "HOOKRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Topics to consume and print to stdout
    #[arg(value_name = "TOPIC")]
    pub topics: Vec<Topic>,
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, RelayError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RelayError::new(
                ErrorCode::ConfigInvalid,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, RelayError> {
        Ok(toml::from_str(content)?)
    }

    /// Builds the effective configuration: file first, then flags on top.
    ///
    /// `--addr` replaces the file's address; positional topics are appended
    /// to the file's topics with duplicates removed.
    pub fn from_cli(cli: Cli) -> Result<Self, RelayError> {
        let mut config = match &cli.config {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                Self::from_toml_file(path)?
            }
            None => Self::default(),
        };

        if let Some(addr) = cli.addr {
            config.addr = addr;
        }
        config.topics.extend(cli.topics);
        config.dedup_topics();
        Ok(config)
    }

    /// Address in a form `TcpListener::bind` accepts
    pub fn listen_addr(&self) -> String {
        if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        }
    }

    fn dedup_topics(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.topics.retain(|topic| seen.insert(topic.clone()));
    }
}
