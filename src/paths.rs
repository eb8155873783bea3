//! Path resolution for the project checkout and the host configuration.
//!
//! Uses env vars when set, otherwise platform defaults.

use std::path::{Path, PathBuf};

/// Fixed server identifier written into every host integration.
pub const SERVER_NAME: &str = "notion-mcp";

/// Resolved paths for one installer/verifier run.
#[derive(Debug, Clone)]
pub struct Paths {
    pub project_dir: PathBuf,
    pub desktop_config: PathBuf,
    pub settings_file: PathBuf,
}

impl Paths {
    /// Resolve paths from flags and environment, falling back to defaults.
    ///
    /// `project_dir` and `settings_file` come from the command line and win
    /// over the environment.
    pub fn resolve(project_dir: Option<&Path>, settings_file: Option<&Path>) -> Self {
        let project_dir = match project_dir {
            Some(p) => expand_tilde(&p.to_string_lossy()),
            None => resolve_path(
                "NOTION_MCP_PROJECT_DIR",
                std::env::current_dir().ok(),
                ".",
            ),
        };
        // Artifact paths end up in host configs, so they must be absolute.
        let project_dir = std::fs::canonicalize(&project_dir).unwrap_or(project_dir);

        let desktop_config = resolve_path(
            "NOTION_MCP_DESKTOP_CONFIG",
            default_desktop_config(),
            "~/.config/Claude/claude_desktop_config.json",
        );

        let settings_file = settings_file
            .map(|p| expand_tilde(&p.to_string_lossy()))
            .unwrap_or_else(|| project_dir.join("notion-mcp.config.json"));

        Self {
            project_dir,
            desktop_config,
            settings_file,
        }
    }

    /// Build paths rooted at explicit locations (no environment lookups).
    pub fn with_locations(project_dir: PathBuf, desktop_config: PathBuf) -> Self {
        let settings_file = project_dir.join("notion-mcp.config.json");
        Self {
            project_dir,
            desktop_config,
            settings_file,
        }
    }

    /// Project checkout containing package.json.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Directory whose presence shows `npm install` has run.
    pub fn dependency_marker(&self) -> PathBuf {
        self.project_dir.join("node_modules")
    }

    /// Built CLI entry point launched by the hosts.
    pub fn build_artifact(&self) -> PathBuf {
        self.project_dir.join("bin").join("cli.mjs")
    }

    /// Desktop host configuration file.
    pub fn desktop_config_path(&self) -> &Path {
        &self.desktop_config
    }

    /// Optional local settings file.
    pub fn settings_path(&self) -> &Path {
        &self.settings_file
    }
}

/// The desktop host's configuration file for the running OS family.
fn default_desktop_config() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| {
            h.join("Library/Application Support/Claude/claude_desktop_config.json")
        })
    } else if cfg!(target_os = "windows") {
        // %APPDATA% is the roaming config dir
        dirs::config_dir().map(|p| p.join("Claude").join("claude_desktop_config.json"))
    } else {
        dirs::home_dir().map(|h| h.join(".config/Claude/claude_desktop_config.json"))
    }
}

fn resolve_path(env_var: &str, platform_default: Option<PathBuf>, fallback: &str) -> PathBuf {
    if let Ok(val) = std::env::var(env_var) {
        let trimmed = val.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }
    platform_default.unwrap_or_else(|| expand_tilde(fallback))
}

fn expand_tilde(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}
