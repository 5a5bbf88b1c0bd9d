//! Configuration for documents and their sync coordinator.
//!
//! Every field has a default, so a partial JSON file only needs to name the
//! settings it changes:
//!
//! ```
//! use driftdoc::config::DocumentConfig;
//!
//! let config = DocumentConfig::from_json_str(r#"{"network": {"discovery": false}}"#).unwrap();
//! assert!(!config.network.discovery);
//! assert_eq!(config.network.low_water_mark, 7);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_PEER_LOW_WATER_MARK;
use crate::Result;

/// Settings of the [`Network`](crate::sync::Network) coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// This node's peer id. A fresh unique id is generated when unset.
    pub peer_id: Option<String>,
    /// Act on peer lists and signaling messages to grow the mesh.
    ///
    /// Nodes that only accept connections, such as servers, turn this off.
    pub discovery: bool,
    /// Below this many peers, a lost connection triggers a peer-list
    /// broadcast and received peer lists are dialed.
    pub low_water_mark: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            peer_id: None,
            discovery: true,
            low_water_mark: DEFAULT_PEER_LOW_WATER_MARK,
        }
    }
}

/// Settings of a [`Document`](crate::Document).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub network: NetworkConfig,
}

impl DocumentConfig {
    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
