//! Dependency install, build, and artifact presence checks.

use std::time::Duration;

use tracing::{info, warn};

use crate::paths::Paths;
use crate::process::{CommandRunner, CommandSpec};
use crate::report::{Check, Report};

const BUILD_TIMEOUT: Duration = Duration::from_secs(600);
const SMOKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Read-only: report whether `npm install` and `npm run build` have run.
pub fn check_artifacts(paths: &Paths) -> Report {
    let mut report = Report::new();

    let marker = paths.dependency_marker();
    if marker.is_dir() {
        report.push(Check::ok("Dependencies", format!("{} present", marker.display())));
    } else {
        report.push(Check::error(
            "Dependencies",
            format!("{} is missing", marker.display()),
            Some(format!("Run `npm install` in {}", paths.project_dir().display())),
        ));
    }

    let artifact = paths.build_artifact();
    if artifact.is_file() {
        report.push(Check::ok("Build output", format!("{} present", artifact.display())));
    } else {
        report.push(Check::error(
            "Build output",
            format!("{} is missing", artifact.display()),
            Some(format!("Run `npm run build` in {}", paths.project_dir().display())),
        ));
    }

    report
}

/// Run `npm install` then `npm run build`. Any failure is fatal and is
/// returned as an `Err` carrying the failing check.
pub fn install_and_build(runner: &dyn CommandRunner, paths: &Paths) -> Result<Report, Report> {
    let mut report = Report::new();
    let steps: [(&str, &[&str]); 2] = [("Dependencies", &["install"]), ("Build", &["run", "build"])];

    for (name, args) in steps {
        let spec = CommandSpec::new("npm", args.iter().copied(), BUILD_TIMEOUT).in_dir(paths.project_dir());
        info!("Running `{}` in {}", spec.display(), paths.project_dir().display());

        let failure = match runner.run(&spec) {
            Ok(output) if output.success() => None,
            Ok(output) => Some(format!(
                "`{}` exited with {}: {}",
                spec.display(),
                output.code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                last_lines(&output.combined(), 5)
            )),
            Err(e) => Some(e.to_string()),
        };

        match failure {
            None => report.push(Check::ok(name, format!("`{}` succeeded", spec.display()))),
            Some(message) => {
                report.push(Check::error(
                    name,
                    message,
                    Some(format!("Run `{}` manually to see the full output", spec.display())),
                ));
                return Err(report);
            }
        }
    }

    if !paths.build_artifact().is_file() {
        report.push(Check::error(
            "Build output",
            format!("Build finished but {} was not produced", paths.build_artifact().display()),
            None,
        ));
        return Err(report);
    }

    Ok(report)
}

/// Launch the built CLI with `--help` to confirm it starts. Non-fatal.
pub fn smoke_test(runner: &dyn CommandRunner, paths: &Paths) -> Report {
    let mut report = Report::new();
    let artifact = paths.build_artifact();
    let spec = CommandSpec::new(
        "node",
        [artifact.to_string_lossy().to_string(), "--help".to_string()],
        SMOKE_TIMEOUT,
    )
    .in_dir(paths.project_dir());

    match runner.run(&spec) {
        Ok(output) if output.success() => {
            report.push(Check::ok("Smoke test", "Server CLI starts"));
        }
        Ok(output) => {
            warn!("Smoke test exited with {:?}", output.code);
            report.push(Check::warning(
                "Smoke test",
                format!("Server CLI exited with {:?}: {}", output.code, last_lines(&output.combined(), 3)),
                Some(format!("Run `{}` to investigate", spec.display())),
            ));
        }
        Err(e) => {
            warn!("Smoke test failed: {}", e);
            report.push(Check::warning("Smoke test", e.to_string(), None));
        }
    }

    report
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
