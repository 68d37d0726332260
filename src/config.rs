//! Configuration for the graph mapping layer.
//!
//! This module provides loading and parsing of `.graph_mapper.json`
//! configuration files: the named graph to work against, the path to the
//! server-side transaction script, and the naming convention for derived
//! edge collections.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Default configuration file looked up in the current directory.
pub const DEFAULT_CONFIG_PATH: &str = ".graph_mapper.json";

/// Default suffix of derived edge-collection handle names.
pub const DEFAULT_EDGE_COLLECTION_SUFFIX: &str = "Collection";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "configuration file not found: {path}\n\n\
         Please create a {path} file, for example:\n\
         {{\n  \
           \"graph\": \"my_graph\",\n  \
           \"transaction_script\": \"./shared/transaction.js\"\n\
         }}"
    )]
    NotFound { path: String },

    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration in '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Configuration surface of the mapping layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name of the graph all edge definitions and traversals run against.
    pub graph: String,

    /// Path to the server-side transaction script submitted on save.
    pub transaction_script: PathBuf,

    /// Suffix appended to derived edge-collection handle names.
    #[serde(default = "default_edge_collection_suffix")]
    pub edge_collection_suffix: String,
}

fn default_edge_collection_suffix() -> String {
    DEFAULT_EDGE_COLLECTION_SUFFIX.to_string()
}

impl Config {
    /// Creates a configuration without touching the filesystem.
    pub fn new(graph: impl Into<String>, transaction_script: impl Into<PathBuf>) -> Self {
        Self {
            graph: graph.into(),
            transaction_script: transaction_script.into(),
            edge_collection_suffix: default_edge_collection_suffix(),
        }
    }

    /// Loads configuration from `.graph_mapper.json` in the current directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration from an explicit path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads the server-side transaction script from the configured path.
    pub fn load_transaction_script(&self) -> Result<String, ConfigError> {
        fs::read_to_string(&self.transaction_script).map_err(|source| ConfigError::Io {
            path: self.transaction_script.clone(),
            source,
        })
    }
}
