//! Desktop host configuration (reconcile and inspect).
//!
//! Works on the raw JSON document so every key this tool does not own is
//! written back untouched.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::models::{ServerEntry, MCP_SERVERS_KEY, TOKEN_ENV_VAR};
use crate::report::{Check, Report};

/// What a successful reconcile did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// File that now holds the entry.
    pub path: PathBuf,
    /// Copy of the previous valid document, if there was one.
    pub backup: Option<PathBuf>,
    /// Recoverable problems (e.g. an unreadable previous document).
    pub warnings: Vec<String>,
}

/// Write `entry` under `mcpServers[server_name]` in the file at `path`.
///
/// A previously valid document is copied to `<name>.backup.<millis>` before
/// it is replaced. A malformed document is not an error: it is discarded,
/// a warning is returned and the write starts from an empty document.
pub fn reconcile(
    path: &Path,
    server_name: &str,
    entry: &ServerEntry,
) -> Result<ReconcileOutcome, ReconcileError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            debug!("Creating config directory {}", parent.display());
            std::fs::create_dir_all(parent)
                .map_err(|e| ReconcileError::CreateDir(e, parent.to_path_buf()))?;
        }
    }

    let mut warnings = Vec::new();
    let mut backup = None;

    let mut document = if path.exists() {
        let content =
            std::fs::read(path).map_err(|e| ReconcileError::Read(e, path.to_path_buf()))?;
        match parse_document(&content) {
            Ok(doc) => {
                let backup_path = backup_file(path)?;
                info!("Backed up {} to {}", path.display(), backup_path.display());
                backup = Some(backup_path);
                doc
            }
            Err(reason) => {
                let msg = format!(
                    "Existing config at {} could not be parsed ({}); starting from an empty configuration",
                    path.display(),
                    reason
                );
                warn!("{}", msg);
                warnings.push(msg);
                empty_document()
            }
        }
    } else {
        debug!("No config at {}, creating a new one", path.display());
        empty_document()
    };

    let servers = document
        .entry(MCP_SERVERS_KEY)
        .or_insert_with(|| Value::Object(Map::new()));
    // parse_document rejects non-object mcpServers, so this always matches
    if let Value::Object(servers) = servers {
        let value = serde_json::to_value(entry).map_err(ReconcileError::Serialize)?;
        servers.insert(server_name.to_string(), value);
    }

    let mut output =
        serde_json::to_string_pretty(&Value::Object(document)).map_err(ReconcileError::Serialize)?;
    output.push('\n');
    write_replacing(path, output.as_bytes())?;

    Ok(ReconcileOutcome {
        path: path.to_path_buf(),
        backup,
        warnings,
    })
}

/// Parse a host configuration: a JSON object whose `mcpServers`, if
/// present, is itself an object.
fn parse_document(content: &[u8]) -> Result<Map<String, Value>, String> {
    let value: Value = serde_json::from_slice(content).map_err(|e| e.to_string())?;
    let Value::Object(map) = value else {
        return Err("top-level value is not an object".to_string());
    };
    match map.get(MCP_SERVERS_KEY) {
        None | Some(Value::Object(_)) => Ok(map),
        Some(_) => Err(format!("\"{}\" is not an object", MCP_SERVERS_KEY)),
    }
}

fn empty_document() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(MCP_SERVERS_KEY.to_string(), Value::Object(Map::new()));
    map
}

/// Copy `path` to a free `<file name>.backup.<epoch millis>` sibling.
fn backup_file(path: &Path) -> Result<PathBuf, ReconcileError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "config.json".to_string());

    let mut stamp = chrono::Utc::now().timestamp_millis();
    let mut backup_path = path.with_file_name(format!("{}.backup.{}", file_name, stamp));
    while backup_path.exists() {
        stamp += 1;
        backup_path = path.with_file_name(format!("{}.backup.{}", file_name, stamp));
    }

    std::fs::copy(path, &backup_path).map_err(|e| ReconcileError::Backup(e, backup_path.clone()))?;
    Ok(backup_path)
}

/// Sibling temp file used while replacing `path`.
fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp-{}", file_name, std::process::id()))
}

/// Write to a sibling temp file, then rename it over `path`.
fn write_replacing(path: &Path, content: &[u8]) -> Result<(), ReconcileError> {
    let temp = temp_path(path);

    if let Err(e) = std::fs::write(&temp, content) {
        let _ = std::fs::remove_file(&temp);
        return Err(ReconcileError::Write(e, path.to_path_buf()));
    }
    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(ReconcileError::Write(e, path.to_path_buf()));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Failed to create directory {}: {}", .1.display(), .0)]
    CreateDir(std::io::Error, PathBuf),
    #[error("Failed to read {}: {}", .1.display(), .0)]
    Read(std::io::Error, PathBuf),
    #[error("Failed to back up config to {}: {}", .1.display(), .0)]
    Backup(std::io::Error, PathBuf),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
    #[error("{}", write_message(.0, .1))]
    Write(std::io::Error, PathBuf),
}

fn write_message(e: &std::io::Error, path: &Path) -> String {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        format!("Permission denied writing {}", path.display())
    } else {
        format!("Failed to write {}: {}", path.display(), e)
    }
}

/// State of the server entry in a host configuration file, read-only.
#[derive(Debug, Clone, PartialEq)]
pub enum Inspection {
    Missing,
    Unparseable(String),
    EntryAbsent,
    Present(Value),
}

/// Read `path` and look up `mcpServers[server_name]` without writing.
pub fn inspect(path: &Path, server_name: &str) -> Inspection {
    let content = match std::fs::read(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Inspection::Missing,
        Err(e) => return Inspection::Unparseable(e.to_string()),
    };
    match parse_document(&content) {
        Ok(doc) => match doc.get(MCP_SERVERS_KEY).and_then(|s| s.get(server_name)) {
            Some(entry) => Inspection::Present(entry.clone()),
            None => Inspection::EntryAbsent,
        },
        Err(reason) => Inspection::Unparseable(reason),
    }
}

/// Verify the desktop configuration points at `artifact`.
pub fn check_desktop_config(path: &Path, server_name: &str, artifact: &Path) -> Report {
    const NAME: &str = "Desktop config";
    let mut report = Report::new();
    let rerun = Some("Run `notion-mcp-setup install`".to_string());

    let entry = match inspect(path, server_name) {
        Inspection::Missing => {
            report.push(Check::error(
                NAME,
                format!("{} does not exist", path.display()),
                rerun,
            ));
            return report;
        }
        Inspection::Unparseable(reason) => {
            report.push(Check::error(
                NAME,
                format!("{} is not a valid config: {}", path.display(), reason),
                rerun,
            ));
            return report;
        }
        Inspection::EntryAbsent => {
            report.push(Check::error(
                NAME,
                format!("No \"{}\" entry in {}", server_name, path.display()),
                rerun,
            ));
            return report;
        }
        Inspection::Present(entry) => entry,
    };

    let command = entry.get("command").and_then(Value::as_str);
    if command != Some("node") {
        report.push(Check::error(
            NAME,
            format!("Entry command is {:?}, expected \"node\"", command.unwrap_or("")),
            rerun,
        ));
        return report;
    }

    let artifact_str = artifact.to_string_lossy();
    let has_artifact = entry
        .get("args")
        .and_then(Value::as_array)
        .is_some_and(|args| args.iter().any(|a| a.as_str() == Some(artifact_str.as_ref())));
    if !has_artifact {
        report.push(Check::error(
            NAME,
            format!("Entry args do not reference {}", artifact_str),
            rerun,
        ));
        return report;
    }

    report.push(Check::ok(
        NAME,
        format!("\"{}\" configured in {}", server_name, path.display()),
    ));

    let has_token = entry
        .get("env")
        .and_then(|env| env.get(TOKEN_ENV_VAR))
        .and_then(Value::as_str)
        .is_some_and(|t| !t.is_empty());
    if !has_token {
        report.push(Check::warning(
            "Notion token",
            format!("{} is not set in the desktop config entry", TOKEN_ENV_VAR),
            Some("Set notionToken in notion-mcp.config.json and reinstall".to_string()),
        ));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CheckStatus;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn entry() -> ServerEntry {
        ServerEntry::for_artifact(Path::new("/opt/notion/bin/cli.mjs"), None)
    }

    fn backups_in(dir: &Path) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().contains(".backup."))
            .collect();
        found.sort();
        found
    }

    #[test]
    fn creates_missing_file_and_parents() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("a").join("b").join("config.json");

        let outcome = reconcile(&path, "notion-mcp", &entry()).unwrap();
        assert_eq!(outcome.path, path);
        assert!(outcome.backup.is_none());
        assert!(outcome.warnings.is_empty());

        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["mcpServers"]["notion-mcp"]["command"], "node");
        assert_eq!(doc["mcpServers"]["notion-mcp"]["args"][0], "/opt/notion/bin/cli.mjs");
    }

    #[test]
    fn preserves_unrelated_keys_and_servers() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        let original = json!({
            "theme": "dark",
            "mcpServers": {
                "other": {"command": "python", "args": ["-m", "srv"], "env": {"A": "1"}},
                "notion-mcp": {"command": "old", "args": []}
            },
            "nested": {"list": [1, 2, 3]}
        });
        fs::write(&path, serde_json::to_string(&original).unwrap()).unwrap();

        reconcile(&path, "notion-mcp", &entry()).unwrap();

        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["theme"], original["theme"]);
        assert_eq!(doc["nested"], original["nested"]);
        assert_eq!(doc["mcpServers"]["other"], original["mcpServers"]["other"]);
        assert_eq!(doc["mcpServers"]["notion-mcp"]["command"], "node");
        assert_eq!(doc["mcpServers"]["notion-mcp"]["env"], json!({}));
    }

    #[test]
    fn keeps_key_order_of_existing_document() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"zeta": 1, "mcpServers": {}, "alpha": 2}"#).unwrap();

        reconcile(&path, "notion-mcp", &entry()).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let zeta = written.find("\"zeta\"").unwrap();
        let servers = written.find("\"mcpServers\"").unwrap();
        let alpha = written.find("\"alpha\"").unwrap();
        assert!(zeta < servers && servers < alpha);
    }

    #[test]
    fn backup_matches_previous_bytes() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        let original = "{\n  \"mcpServers\": {\"x\": {\"command\": \"y\", \"args\": []}}\n}";
        fs::write(&path, original).unwrap();

        let outcome = reconcile(&path, "notion-mcp", &entry()).unwrap();
        let backup = outcome.backup.unwrap();
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("config.json.backup."));
        assert_eq!(fs::read_to_string(&backup).unwrap(), original);
    }

    #[test]
    fn adds_mcp_servers_when_absent() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"globalShortcut": "Ctrl+Space"}"#).unwrap();

        let outcome = reconcile(&path, "notion-mcp", &entry()).unwrap();
        assert!(outcome.backup.is_some());

        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["globalShortcut"], "Ctrl+Space");
        assert_eq!(doc["mcpServers"]["notion-mcp"]["command"], "node");
    }

    #[test]
    fn reconcile_twice_is_idempotent_with_two_backups() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"mcpServers": {}}"#).unwrap();

        let first = reconcile(&path, "notion-mcp", &entry()).unwrap();
        let after_first: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let second = reconcile(&path, "notion-mcp", &entry()).unwrap();
        let after_second: Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(
            after_first["mcpServers"]["notion-mcp"],
            after_second["mcpServers"]["notion-mcp"]
        );
        assert_ne!(first.backup, second.backup);
        assert_eq!(backups_in(temp.path()).len(), 2);
    }

    #[test]
    fn invalid_json_starts_fresh_without_backup() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let outcome = reconcile(&path, "notion-mcp", &entry()).unwrap();
        assert!(outcome.backup.is_none());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(backups_in(temp.path()).is_empty());

        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let expected = json!({
            "mcpServers": {
                "notion-mcp": serde_json::to_value(entry()).unwrap()
            }
        });
        assert_eq!(doc, expected);
    }

    #[test]
    fn wrong_shape_is_treated_as_unparseable() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"mcpServers": []}"#).unwrap();

        let outcome = reconcile(&path, "notion-mcp", &entry()).unwrap();
        assert!(outcome.backup.is_none());
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn no_temp_file_left_behind() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        reconcile(&path, "notion-mcp", &entry()).unwrap();

        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["config.json".to_string()]);
    }

    #[test]
    fn write_failure_keeps_original_and_backup() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        let original = r#"{"mcpServers": {"other": {"command": "x"}}}"#;
        fs::write(&path, original).unwrap();
        // A directory in the temp file's place makes the write fail.
        fs::create_dir(temp_path(&path)).unwrap();

        let err = reconcile(&path, "notion-mcp", &entry()).unwrap_err();
        assert!(matches!(err, ReconcileError::Write(..)), "{:?}", err);
        assert!(err.to_string().contains("config.json"));

        assert_eq!(fs::read_to_string(&path).unwrap(), original);
        let backups = backups_in(temp.path());
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), original);

        let stray_files = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .count();
        assert_eq!(stray_files, 0);
    }

    #[test]
    fn parent_creation_failure_is_reported() {
        let temp = tempdir().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let path = blocker.join("sub").join("config.json");

        let err = reconcile(&path, "notion-mcp", &entry()).unwrap_err();
        assert!(matches!(err, ReconcileError::CreateDir(..)));
    }

    #[test]
    fn inspect_reports_each_state() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        assert_eq!(inspect(&path, "notion-mcp"), Inspection::Missing);

        fs::write(&path, "nope").unwrap();
        assert!(matches!(inspect(&path, "notion-mcp"), Inspection::Unparseable(_)));

        fs::write(&path, r#"{"mcpServers": {"other": {}}}"#).unwrap();
        assert_eq!(inspect(&path, "notion-mcp"), Inspection::EntryAbsent);

        reconcile(&path, "notion-mcp", &entry()).unwrap();
        assert!(matches!(inspect(&path, "notion-mcp"), Inspection::Present(_)));
    }

    #[test]
    fn check_flags_missing_token_as_warning_only() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        let artifact = Path::new("/opt/notion/bin/cli.mjs");
        reconcile(&path, "notion-mcp", &entry()).unwrap();

        let report = check_desktop_config(&path, "notion-mcp", artifact);
        assert!(!report.has_errors());
        assert_eq!(report.count(CheckStatus::Warning), 1);

        let with_token = ServerEntry::for_artifact(artifact, Some("ntn_1"));
        reconcile(&path, "notion-mcp", &with_token).unwrap();
        let report = check_desktop_config(&path, "notion-mcp", artifact);
        assert_eq!(report.count(CheckStatus::Warning), 0);
        assert_eq!(report.count(CheckStatus::Ok), 1);
    }

    #[test]
    fn check_errors_when_args_point_elsewhere() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        reconcile(&path, "notion-mcp", &entry()).unwrap();

        let report = check_desktop_config(&path, "notion-mcp", Path::new("/elsewhere/cli.mjs"));
        assert!(report.has_errors());
    }

    #[test]
    fn check_errors_on_missing_file() {
        let temp = tempdir().unwrap();
        let report =
            check_desktop_config(&temp.path().join("none.json"), "notion-mcp", Path::new("/a"));
        assert!(report.has_errors());
        assert!(report.checks()[0].fix.is_some());
    }
}
