//! Check results collected by the installer and verifier.

use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    /// Command or action the operator should take to fix it.
    pub fix: Option<String>,
}

impl Check {
    pub fn ok(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.into(),
            fix: None,
        }
    }

    pub fn warning(name: &str, message: impl Into<String>, fix: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.into(),
            fix,
        }
    }

    pub fn error(name: &str, message: impl Into<String>, fix: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.into(),
            fix,
        }
    }
}

/// Ordered list of checks. Each step returns its own `Report`, which the
/// caller merges into the run's report.
#[derive(Debug, Clone, Default)]
pub struct Report {
    checks: Vec<Check>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, check: Check) {
        self.checks.push(check);
    }

    pub fn merge(&mut self, other: Report) {
        self.checks.extend(other.checks);
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(CheckStatus::Error) > 0
    }

    /// 0 unless at least one check failed. Warnings never fail a run.
    pub fn exit_code(&self) -> i32 {
        if self.has_errors() {
            1
        } else {
            0
        }
    }

    /// Print every check followed by a one-line summary.
    pub fn print(&self) {
        const INDENT: &str = "    ";

        for check in &self.checks {
            println!("{} {}: {}", status_symbol(check.status), check.name.bold(), check.message);
            if let Some(fix) = check.fix.as_deref().filter(|_| check.status != CheckStatus::Ok) {
                println!("{}{} {}", INDENT, "fix:".dimmed(), fix);
            }
        }

        println!();
        println!(
            "{} passed, {} warnings, {} errors",
            self.count(CheckStatus::Ok).to_string().green(),
            self.count(CheckStatus::Warning).to_string().yellow(),
            self.count(CheckStatus::Error).to_string().red(),
        );
    }
}

fn status_symbol(status: CheckStatus) -> colored::ColoredString {
    match status {
        CheckStatus::Ok => "\u{2713}".green(),
        CheckStatus::Warning => "\u{26A0}".yellow(),
        CheckStatus::Error => "\u{2717}".red(),
    }
}
