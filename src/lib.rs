//! notion-mcp-setup
//!
//! Installs the Notion MCP server into the desktop host and the `claude`
//! CLI, and verifies an existing installation.

pub mod artifacts;
pub mod config;
pub mod environment;
pub mod install;
pub mod models;
pub mod paths;
pub mod process;
pub mod registry;
pub mod report;
pub mod settings;
pub mod verify;

pub use config::{check_desktop_config, inspect, reconcile, Inspection, ReconcileError, ReconcileOutcome};
pub use environment::{check_tool, parse_major, EnvironmentError, ToolVersion};
pub use install::{configure_desktop, install, server_entry, InstallOptions};
pub use models::{LocalSettings, ServerEntry};
pub use paths::{Paths, SERVER_NAME};
pub use process::{CommandOutput, CommandRunner, CommandSpec, ProcessError, SystemRunner};
pub use registry::{parse_listing, ListingStatus, Registry};
pub use report::{Check, CheckStatus, Report};
pub use settings::load_settings;
pub use verify::verify;
