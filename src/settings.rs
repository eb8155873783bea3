//! Optional local settings (`notion-mcp.config.json`).

use std::path::Path;

use tracing::debug;

use crate::models::{LocalSettings, TOKEN_ENV_VAR};

/// Settings plus any problem met while loading them.
#[derive(Debug, Clone, Default)]
pub struct LoadedSettings {
    pub settings: LocalSettings,
    pub warning: Option<String>,
}

/// Load settings from `path`. A missing file yields defaults; a malformed
/// one yields defaults and a warning. `NOTION_TOKEN` fills a missing token.
pub fn load_settings(path: &Path) -> LoadedSettings {
    let mut loaded = match read_settings(path) {
        Ok(Some(settings)) => {
            debug!("Loaded settings from {}", path.display());
            LoadedSettings { settings, warning: None }
        }
        Ok(None) => {
            debug!("No settings file at {}, using defaults", path.display());
            LoadedSettings::default()
        }
        Err(e) => LoadedSettings {
            settings: LocalSettings::default(),
            warning: Some(format!("{}; using defaults", e)),
        },
    };

    // A blank token counts as no token at all.
    loaded.settings.notion_token = loaded
        .settings
        .notion_token
        .take()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    if loaded.settings.notion_token.is_none() {
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            if !token.trim().is_empty() {
                debug!("Using {} from environment", TOKEN_ENV_VAR);
                loaded.settings.notion_token = Some(token.trim().to_string());
            }
        }
    }
    loaded
}

fn read_settings(path: &Path) -> Result<Option<LocalSettings>, SettingsError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SettingsError::Read(e, path.to_path_buf())),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| SettingsError::Parse(e, path.to_path_buf()))
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings {}: {}", .1.display(), .0)]
    Read(std::io::Error, std::path::PathBuf),
    #[error("Failed to parse settings {}: {}", .1.display(), .0)]
    Parse(serde_json::Error, std::path::PathBuf),
}
