//! Read-only verification of everything `install` sets up.

use tracing::info;

use crate::artifacts;
use crate::config::check_desktop_config;
use crate::environment;
use crate::paths::{Paths, SERVER_NAME};
use crate::process::CommandRunner;
use crate::registry;
use crate::report::Report;

/// Run every check. Nothing is written and nothing is built.
pub fn verify(runner: &dyn CommandRunner, paths: &Paths) -> Report {
    let mut report = Report::new();

    info!("Checking environment");
    report.merge(environment::check_environment(runner));

    info!("Checking build artifacts in {}", paths.project_dir().display());
    report.merge(artifacts::check_artifacts(paths));

    info!("Checking desktop config {}", paths.desktop_config_path().display());
    report.merge(check_desktop_config(
        paths.desktop_config_path(),
        SERVER_NAME,
        &paths.build_artifact(),
    ));

    info!("Checking CLI registration");
    report.merge(registry::check_registration(runner, SERVER_NAME));

    report
}
