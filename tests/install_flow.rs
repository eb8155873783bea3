use std::cell::RefCell;
use std::fs;
use std::path::Path;

use notion_mcp_setup::{
    configure_desktop, install, server_entry, verify, CheckStatus, CommandOutput, CommandRunner,
    CommandSpec, InstallOptions, LocalSettings, Paths, ProcessError,
};
use serde_json::Value;
use tempfile::tempdir;

/// Pretends to be node, npm and claude. `claude mcp list` reflects adds.
#[derive(Default)]
struct FakeTools {
    registered: RefCell<bool>,
}

impl CommandRunner for FakeTools {
    fn is_available(&self, program: &str) -> bool {
        matches!(program, "node" | "npm" | "claude")
    }

    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        let line = spec.display();
        let stdout = if line == "node --version" {
            "v18.19.0\n".to_string()
        } else if line == "npm --version" {
            "10.2.3\n".to_string()
        } else if line.starts_with("claude mcp add") {
            *self.registered.borrow_mut() = true;
            String::new()
        } else if line == "claude mcp list" && *self.registered.borrow() {
            "notion-mcp: node /x/bin/cli.mjs - \u{2713} Connected\n".to_string()
        } else {
            String::new()
        };
        Ok(CommandOutput { code: Some(0), stdout, stderr: String::new() })
    }
}

fn built_project(root: &Path) -> Paths {
    let paths = Paths::with_locations(
        root.join("notion-mcp-server"),
        root.join("home").join("Claude").join("claude_desktop_config.json"),
    );
    fs::create_dir_all(paths.dependency_marker()).unwrap();
    fs::create_dir_all(paths.build_artifact().parent().unwrap()).unwrap();
    fs::write(paths.build_artifact(), "#!/usr/bin/env node\n").unwrap();
    paths
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn configure_creates_config_from_nothing() {
    let temp = tempdir().unwrap();
    let paths = built_project(temp.path());
    assert!(!paths.desktop_config_path().exists());

    let entry = server_entry(&paths, &LocalSettings::default());
    let outcome = configure_desktop(&paths, &entry).unwrap();
    assert!(outcome.backup.is_none());

    let doc = read_json(paths.desktop_config_path());
    let server = &doc["mcpServers"]["notion-mcp"];
    assert_eq!(server["command"], "node");
    let artifact = paths.build_artifact().to_string_lossy().to_string();
    assert!(Path::new(&artifact).is_absolute());
    assert!(server["args"]
        .as_array()
        .unwrap()
        .iter()
        .any(|a| a.as_str() == Some(artifact.as_str())));
}

#[test]
fn install_then_verify_passes() {
    let temp = tempdir().unwrap();
    let paths = built_project(temp.path());
    fs::create_dir_all(paths.desktop_config_path().parent().unwrap()).unwrap();
    fs::write(
        paths.desktop_config_path(),
        r#"{"mcpServers": {"filesystem": {"command": "npx", "args": ["-y", "fs"]}}, "theme": "light"}"#,
    )
    .unwrap();

    let tools = FakeTools::default();
    let settings = LocalSettings {
        notion_token: Some("ntn_test".to_string()),
        verbose: false,
    };

    let report = install(&tools, &paths, &settings, InstallOptions::default());
    assert_eq!(report.exit_code(), 0, "{:?}", report);

    let doc = read_json(paths.desktop_config_path());
    assert_eq!(doc["theme"], "light");
    assert_eq!(doc["mcpServers"]["filesystem"]["command"], "npx");
    assert_eq!(doc["mcpServers"]["notion-mcp"]["env"]["NOTION_TOKEN"], "ntn_test");

    let backups = fs::read_dir(paths.desktop_config_path().parent().unwrap())
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with("claude_desktop_config.json.backup.")
        })
        .count();
    assert_eq!(backups, 1);

    let report = verify(&tools, &paths);
    assert_eq!(report.exit_code(), 0, "{:?}", report);
    assert_eq!(report.count(CheckStatus::Warning), 0, "{:?}", report);
}
