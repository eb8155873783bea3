//! Data structures for the host configuration and local settings files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key holding the server map in a host configuration document.
pub const MCP_SERVERS_KEY: &str = "mcpServers";

/// One entry under `mcpServers` in a host configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub command: String,
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ServerEntry {
    /// Entry launching the built CLI artifact with node.
    ///
    /// The token, when known, is passed through `NOTION_TOKEN`.
    pub fn for_artifact(artifact: &std::path::Path, notion_token: Option<&str>) -> Self {
        let mut env = BTreeMap::new();
        if let Some(token) = notion_token.filter(|t| !t.trim().is_empty()) {
            env.insert(TOKEN_ENV_VAR.to_string(), token.trim().to_string());
        }
        Self {
            command: "node".to_string(),
            args: vec![artifact.to_string_lossy().to_string()],
            env,
        }
    }
}

/// Environment variable the server reads its integration token from.
pub const TOKEN_ENV_VAR: &str = "NOTION_TOKEN";

/// Local settings file at `<project>/notion-mcp.config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSettings {
    #[serde(default)]
    pub notion_token: Option<String>,
    #[serde(default)]
    pub verbose: bool,
}
