//! Install the server and wire it into both hosts.

use tracing::{info, warn};

use crate::artifacts;
use crate::config::{reconcile, ReconcileError, ReconcileOutcome};
use crate::environment;
use crate::models::{LocalSettings, ServerEntry, TOKEN_ENV_VAR};
use crate::paths::{Paths, SERVER_NAME};
use crate::process::CommandRunner;
use crate::registry;
use crate::report::{Check, Report};

/// Steps an operator can opt out of.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Reuse an existing build instead of running npm.
    pub skip_build: bool,
    /// Leave the CLI registry untouched.
    pub skip_registry: bool,
}

/// Run every install step, stopping at the first fatal one.
///
/// The returned report holds everything that ran; it contains an error
/// check exactly when a fatal step failed.
pub fn install(
    runner: &dyn CommandRunner,
    paths: &Paths,
    settings: &LocalSettings,
    options: InstallOptions,
) -> Report {
    let mut report = Report::new();

    info!("Checking environment");
    let env_report = environment::check_environment(runner);
    let env_failed = env_report.has_errors();
    report.merge(env_report);
    if env_failed {
        return report;
    }

    if options.skip_build {
        let artifacts = artifacts::check_artifacts(paths);
        let missing = artifacts.has_errors();
        report.merge(artifacts);
        if missing {
            return report;
        }
    } else {
        match artifacts::install_and_build(runner, paths) {
            Ok(r) => report.merge(r),
            Err(r) => {
                report.merge(r);
                return report;
            }
        }
    }

    report.merge(artifacts::smoke_test(runner, paths));

    let entry = server_entry(paths, settings);
    if !entry.env.contains_key(TOKEN_ENV_VAR) {
        report.push(Check::warning(
            "Notion token",
            "No token configured; the server will be registered without credentials",
            Some("Set notionToken in notion-mcp.config.json or NOTION_TOKEN, then reinstall".to_string()),
        ));
    }

    match configure_desktop(paths, &entry) {
        Ok(outcome) => report.merge(desktop_report(&outcome)),
        Err(e) => {
            report.push(Check::error(
                "Desktop config",
                e.to_string(),
                Some(format!(
                    "Check permissions on {}",
                    paths.desktop_config_path().display()
                )),
            ));
            return report;
        }
    }

    if options.skip_registry {
        info!("Skipping CLI registration");
    } else {
        let script = paths.build_artifact();
        report.merge(registry::register_server(
            runner,
            SERVER_NAME,
            &entry.command,
            &script.to_string_lossy(),
            &entry.env,
        ));
    }

    report
}

/// The entry both hosts should launch.
pub fn server_entry(paths: &Paths, settings: &LocalSettings) -> ServerEntry {
    ServerEntry::for_artifact(&paths.build_artifact(), settings.notion_token.as_deref())
}

/// Reconcile the desktop host configuration with `entry`.
pub fn configure_desktop(paths: &Paths, entry: &ServerEntry) -> Result<ReconcileOutcome, ReconcileError> {
    let path = paths.desktop_config_path();
    info!("Updating desktop config {}", path.display());
    reconcile(path, SERVER_NAME, entry)
}

fn desktop_report(outcome: &ReconcileOutcome) -> Report {
    let mut report = Report::new();
    for w in &outcome.warnings {
        warn!("{}", w);
        report.push(Check::warning("Desktop config", w.clone(), None));
    }
    let detail = match &outcome.backup {
        Some(backup) => format!("Wrote {} (backup: {})", outcome.path.display(), backup.display()),
        None => format!("Wrote {}", outcome.path.display()),
    };
    report.push(Check::ok("Desktop config", detail));
    report
}
