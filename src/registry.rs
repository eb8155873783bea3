//! Server registration inside the `claude` CLI (`claude mcp ...`).
//!
//! The registry is opaque: it is only ever listed, added to, or removed
//! from through the CLI. Parsing of the list output lives in
//! [`parse_listing`] so output format changes stay local.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::process::{CommandOutput, CommandRunner, CommandSpec, ProcessError};
use crate::report::{Check, Report};

/// Executable of the CLI tool.
pub const CLI_PROGRAM: &str = "claude";

/// Scope the server is registered under.
pub const SCOPE: &str = "user";

/// Marker printed next to servers the CLI could reach.
pub const CONNECTED_MARKER: &str = "\u{2713} Connected";

const REGISTRY_TIMEOUT: Duration = Duration::from_secs(15);

const CHECK_NAME: &str = "CLI registration";

/// Whether a server shows up in `claude mcp list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStatus {
    Absent,
    Registered { connected: bool },
}

/// Find `name` in `claude mcp list` output.
///
/// Entries look like `notion-mcp: node /path/cli.mjs - ✓ Connected`.
pub fn parse_listing(output: &str, name: &str) -> ListingStatus {
    let prefix = format!("{}:", name);
    output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with(&prefix))
        .map(|line| ListingStatus::Registered {
            connected: line.contains(CONNECTED_MARKER),
        })
        .unwrap_or(ListingStatus::Absent)
}

/// Thin wrapper over the CLI tool's `mcp` subcommands.
pub struct Registry<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> Registry<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    pub fn is_installed(&self) -> bool {
        self.runner.is_available(CLI_PROGRAM)
    }

    /// Query the registry for `name`.
    pub fn status(&self, name: &str) -> Result<ListingStatus, RegistryError> {
        let output = self.run(["mcp", "list"])?;
        if !output.success() {
            return Err(RegistryError::CommandFailed("mcp list".to_string(), output.combined()));
        }
        Ok(parse_listing(&output.stdout, name))
    }

    /// Remove `name`. Failures are expected when it is not registered and
    /// are only logged.
    pub fn remove(&self, name: &str) {
        match self.run(["mcp", "remove", name, "-s", SCOPE]) {
            Ok(output) if output.success() => debug!("Removed {} from CLI registry", name),
            Ok(output) => debug!("Ignoring failed remove of {}: {}", name, output.combined()),
            Err(e) => debug!("Ignoring failed remove of {}: {}", name, e),
        }
    }

    /// Register `name` as `command script` with optional environment.
    pub fn add(
        &self,
        name: &str,
        command: &str,
        script: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<(), RegistryError> {
        let args = add_args(name, command, script, env);
        let output = self.run(args.iter().map(String::as_str))?;
        if output.success() {
            Ok(())
        } else {
            Err(RegistryError::CommandFailed("mcp add".to_string(), output.combined()))
        }
    }

    /// Idempotent registration: drop any existing entry, add it again, and
    /// if the add fails, query to see whether the entry is there anyway.
    pub fn register(
        &self,
        name: &str,
        command: &str,
        script: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<(), RegistryError> {
        match self.status(name) {
            Ok(ListingStatus::Registered { .. }) => {
                info!("{} already registered, replacing it", name);
                self.remove(name);
            }
            Ok(ListingStatus::Absent) => {}
            Err(e) => {
                // Listing is best-effort; fall back to remove-before-add.
                debug!("Could not list CLI servers: {}", e);
                self.remove(name);
            }
        }

        match self.add(name, command, script, env) {
            Ok(()) => Ok(()),
            Err(add_err) => match self.status(name) {
                Ok(ListingStatus::Registered { .. }) => {
                    warn!("`mcp add` reported failure but {} is registered: {}", name, add_err);
                    Ok(())
                }
                _ => Err(add_err),
            },
        }
    }

    fn run<I, S>(&self, args: I) -> Result<CommandOutput, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = CommandSpec::new(CLI_PROGRAM, args, REGISTRY_TIMEOUT);
        self.runner.run(&spec).map_err(RegistryError::Process)
    }
}

fn add_args(name: &str, command: &str, script: &str, env: &BTreeMap<String, String>) -> Vec<String> {
    let mut args = vec!["mcp".to_string(), "add".to_string(), "-s".to_string(), SCOPE.to_string()];
    for (key, value) in env {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.extend([name.to_string(), "--".to_string(), command.to_string(), script.to_string()]);
    args
}

/// The add command for operators to run by hand. Env values are elided.
pub fn manual_add_command(name: &str, command: &str, script: &str, env: &BTreeMap<String, String>) -> String {
    let mut parts = vec![format!("{} mcp add -s {}", CLI_PROGRAM, SCOPE)];
    for key in env.keys() {
        parts.push(format!("-e {}=<value>", key));
    }
    parts.push(format!("{} -- {} {}", name, command, script));
    parts.join(" ")
}

/// Install-time registration, reported as warnings on failure.
pub fn register_server(
    runner: &dyn CommandRunner,
    name: &str,
    command: &str,
    script: &str,
    env: &BTreeMap<String, String>,
) -> Report {
    let mut report = Report::new();
    let registry = Registry::new(runner);
    let manual = Some(format!("Run `{}`", manual_add_command(name, command, script, env)));

    if !registry.is_installed() {
        report.push(Check::warning(
            CHECK_NAME,
            format!("`{}` CLI not found; skipped registration", CLI_PROGRAM),
            manual,
        ));
        return report;
    }

    match registry.register(name, command, script, env) {
        Ok(()) => report.push(Check::ok(CHECK_NAME, format!("Registered \"{}\" ({} scope)", name, SCOPE))),
        Err(e) => {
            warn!("CLI registration failed: {}", e);
            report.push(Check::warning(CHECK_NAME, e.to_string(), manual));
        }
    }
    report
}

/// Verify-time check. Never an error: the CLI integration is optional.
pub fn check_registration(runner: &dyn CommandRunner, name: &str) -> Report {
    let mut report = Report::new();
    let registry = Registry::new(runner);

    if !registry.is_installed() {
        report.push(Check::warning(
            CHECK_NAME,
            format!("`{}` CLI not found; skipping", CLI_PROGRAM),
            None,
        ));
        return report;
    }

    let check = match registry.status(name) {
        Ok(ListingStatus::Registered { connected: true }) => {
            Check::ok(CHECK_NAME, format!("\"{}\" registered and connected", name))
        }
        Ok(ListingStatus::Registered { connected: false }) => Check::warning(
            CHECK_NAME,
            format!("\"{}\" registered but not connected", name),
            Some(format!("Run `{} mcp list` for details", CLI_PROGRAM)),
        ),
        Ok(ListingStatus::Absent) => Check::warning(
            CHECK_NAME,
            format!("\"{}\" is not registered", name),
            Some("Run `notion-mcp-setup install`".to_string()),
        ),
        Err(e) => Check::warning(CHECK_NAME, format!("Could not query registry: {}", e), None),
    };
    report.push(check);
    report
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Process(ProcessError),
    #[error("`{} {}` failed: {}", CLI_PROGRAM, .0, .1)]
    CommandFailed(String, String),
}
