//! Configuration data model.
//!
//! Struct/enum definitions plus defaults; path discovery and loading live in
//! `config::loader`.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Parsed `mailctl.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Verify TLS certificates on https nodes. Quick-connect endpoints skip
    /// verification regardless.
    pub verify_tls: bool,
    /// Node definitions: name → connection string.
    pub nodes: BTreeMap<String, String>,
    /// Cluster definitions: name → member list or detailed form.
    pub clusters: BTreeMap<String, ClusterConfig>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            verify_tls: true,
            nodes: BTreeMap::new(),
            clusters: BTreeMap::new(),
        }
    }
}

/// A cluster is either a bare member list or a table with shared credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ClusterConfig {
    Members(Vec<String>),
    Detailed {
        nodes: Vec<String>,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
}

impl ClusterConfig {
    pub fn members(&self) -> &[String] {
        match self {
            Self::Members(nodes) => nodes,
            Self::Detailed { nodes, .. } => nodes,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Members(_) => None,
            Self::Detailed { username, .. } => username.as_deref(),
        }
    }

    pub fn password(&self) -> Option<&str> {
        match self {
            Self::Members(_) => None,
            Self::Detailed { password, .. } => password.as_deref(),
        }
    }
}
