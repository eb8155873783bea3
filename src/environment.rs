//! Runtime and package manager version checks.

use std::time::Duration;

use tracing::debug;

use crate::process::{CommandRunner, CommandSpec, ProcessError};
use crate::report::{Check, Report};

const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Lowest supported Node.js major version.
pub const MIN_NODE_MAJOR: u64 = 16;

/// A tool whose version is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tool {
    pub name: &'static str,
    pub min_major: Option<u64>,
    pub install_hint: &'static str,
}

pub const NODE: Tool = Tool {
    name: "node",
    min_major: Some(MIN_NODE_MAJOR),
    install_hint: "Install Node.js 16 or newer from https://nodejs.org",
};

pub const NPM: Tool = Tool {
    name: "npm",
    min_major: None,
    install_hint: "npm ships with Node.js; reinstall Node.js from https://nodejs.org",
};

/// Detected version of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersion {
    pub name: String,
    /// Exactly what `<tool> --version` printed, trimmed.
    pub version_string: String,
    pub satisfies_minimum: bool,
}

/// Query `<tool> --version` and compare its major version to the minimum.
pub fn check_tool(runner: &dyn CommandRunner, tool: Tool) -> Result<ToolVersion, EnvironmentError> {
    if !runner.is_available(tool.name) {
        return Err(EnvironmentError::NotFound(tool.name.to_string()));
    }

    let spec = CommandSpec::new(tool.name, ["--version"], VERSION_TIMEOUT);
    let output = runner.run(&spec).map_err(|e| match e {
        ProcessError::NotFound(_) => EnvironmentError::NotFound(tool.name.to_string()),
        other => EnvironmentError::Query(tool.name.to_string(), other),
    })?;
    if !output.success() {
        return Err(EnvironmentError::QueryFailed(
            tool.name.to_string(),
            output.combined(),
        ));
    }

    let version_string = output.stdout.trim().to_string();
    let major = parse_major(&version_string).ok_or_else(|| {
        EnvironmentError::UnparseableVersion(tool.name.to_string(), version_string.clone())
    })?;
    debug!("{} reports {} (major {})", tool.name, version_string, major);

    Ok(ToolVersion {
        name: tool.name.to_string(),
        satisfies_minimum: tool.min_major.map_or(true, |min| major >= min),
        version_string,
    })
}

/// Leading major version of strings like `v18.17.0`, `9.6.7` or `20`.
pub fn parse_major(version: &str) -> Option<u64> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix(|c: char| c == 'v' || c == 'V').unwrap_or(trimmed);
    if let Ok(v) = semver::Version::parse(trimmed) {
        return Some(v.major);
    }
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Check one tool and turn the result into a report entry.
pub fn tool_check(runner: &dyn CommandRunner, tool: Tool) -> Report {
    let label = format!("{} version", tool.name);
    let check = match check_tool(runner, tool) {
        Ok(v) if v.satisfies_minimum => Check::ok(&label, format!("{} {}", tool.name, v.version_string)),
        Ok(v) => Check::error(
            &label,
            format!(
                "{} {} is below the minimum major version {}",
                tool.name,
                v.version_string,
                tool.min_major.unwrap_or_default()
            ),
            Some(tool.install_hint.to_string()),
        ),
        Err(e) => Check::error(&label, e.to_string(), Some(tool.install_hint.to_string())),
    };
    let mut report = Report::new();
    report.push(check);
    report
}

/// Check node and npm. Errors in the report mean the environment is unusable.
pub fn check_environment(runner: &dyn CommandRunner) -> Report {
    let mut report = Report::new();
    for tool in [NODE, NPM] {
        report.merge(tool_check(runner, tool));
    }
    report
}

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("{0} is not installed or not on PATH")]
    NotFound(String),
    #[error("Failed to query {0} version: {1}")]
    Query(String, ProcessError),
    #[error("`{0} --version` failed: {1}")]
    QueryFailed(String, String),
    #[error("Could not parse {0} version from {1:?}")]
    UnparseableVersion(String, String),
}
