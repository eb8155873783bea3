//! notion-mcp-setup CLI

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use notion_mcp_setup::{install, load_settings, verify, InstallOptions, Paths, SystemRunner, SERVER_NAME};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "notion-mcp-setup")]
#[command(about = "Install and verify the Notion MCP server host integrations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Project checkout (default: $NOTION_MCP_PROJECT_DIR or current directory)
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    /// Local settings file (default: <project>/notion-mcp.config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the server and register it with the desktop app and CLI
    Install {
        /// Skip `npm install` / `npm run build` and use the existing build
        #[arg(long)]
        skip_build: bool,

        /// Do not touch the `claude` CLI registry
        #[arg(long)]
        skip_registry: bool,
    },

    /// Check an existing installation without changing anything
    Verify,

    /// Show resolved paths (for debugging)
    Paths,
}

fn main() {
    let cli = Cli::parse();
    let paths = Paths::resolve(cli.project_dir.as_deref(), cli.config.as_deref());

    // Settings are loaded before logging so `verbose` can raise the level.
    let loaded = load_settings(paths.settings_path());
    init_logging(cli.debug || loaded.settings.verbose);
    if let Some(w) = &loaded.warning {
        eprintln!("{} {}", "Warning:".yellow(), w);
    }

    match cli.command {
        Commands::Paths => {
            println!("Project dir:      {}", paths.project_dir().display());
            println!("Build artifact:   {}", paths.build_artifact().display());
            println!("Desktop config:   {}", paths.desktop_config_path().display());
            println!("Settings file:    {}", paths.settings_path().display());
            println!("Desktop config exists: {}", paths.desktop_config_path().exists());
            println!("Settings exists:       {}", paths.settings_path().exists());
            println!();
            println!("To uninstall, remove \"{}\" from the desktop config and run:", SERVER_NAME);
            println!("    claude mcp remove {} -s user", SERVER_NAME);
        }
        Commands::Install { skip_build, skip_registry } => {
            let options = InstallOptions { skip_build, skip_registry };
            let report = install(&SystemRunner, &paths, &loaded.settings, options);
            report.print();
            if report.has_errors() {
                eprintln!("{}", "Installation failed.".red().bold());
            } else {
                println!("{}", "Installation complete. Restart the desktop app to load the server.".green());
            }
            std::process::exit(report.exit_code());
        }
        Commands::Verify => {
            let report = verify(&SystemRunner, &paths);
            report.print();
            std::process::exit(report.exit_code());
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
