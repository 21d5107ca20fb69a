//! Beacon CLI - terminal client for the notification backend.
//!
//! Logs in, keeps a live push channel open, and lists or acknowledges
//! notifications. Useful for headless operation, scripting and debugging
//! the channel.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{debug, info};

use bc_core::config::{AppConfig, ConfigHandle};
use bc_core::error::BcResult;
use bc_core::logging;

/// Beacon - real-time notifications in the terminal.
#[derive(Parser)]
#[command(
    name = "beacon",
    version,
    about = "Beacon notification client CLI",
    long_about = "A command-line interface for the Beacon notification backend.\n\
                   Log in once, then follow notifications live or manage them from scripts."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Obtain an API token and store it in the config file.
    Login {
        /// Backend address (overrides config).
        #[arg(short, long)]
        address: Option<String>,
        /// Account username (prompted if omitted).
        #[arg(short, long)]
        username: Option<String>,
        /// Account password (prompted if omitted).
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Forget the stored API token.
    Logout,
    /// Open the push channel and print notifications as they arrive.
    Listen {
        /// Number of recent notifications to show on startup.
        #[arg(short = 'n', long, default_value = "5")]
        recent: usize,
    },
    /// List and acknowledge notifications.
    Notifications {
        #[command(subcommand)]
        action: commands::notifications::NotificationsAction,
    },
    /// Inspect the configuration.
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Show backend reachability and login state.
    Status,
}

#[tokio::main]
async fn main() -> BcResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = match cli.config.as_deref() {
        Some(path) => PathBuf::from(path),
        None => AppConfig::default_config_path()?,
    };
    let config = if config_path.exists() {
        AppConfig::load_from_file(&config_path)?
    } else {
        AppConfig::default()
    };

    // Initialize logging
    let mut log_config = config.logging.clone();
    if cli.verbose {
        log_config.level = "debug".into();
    }
    let log_dir = config
        .effective_log_dir()
        .unwrap_or_else(|_| PathBuf::from("logs"));
    let _guard = logging::init_logging(&log_config, &log_dir)?;

    info!("Beacon CLI v{}", bc_core::constants::APP_VERSION);
    debug!("using config {}", config_path.display());

    let config_handle = ConfigHandle::with_path(config, config_path);

    // Dispatch to command handlers
    match cli.command {
        Commands::Login { address, username, password } => {
            commands::login::run(config_handle, address, username, password, cli.format).await
        }
        Commands::Logout => commands::login::logout(config_handle, cli.format).await,
        Commands::Listen { recent } => {
            commands::listen::run(config_handle, recent, cli.format).await
        }
        Commands::Notifications { action } => {
            commands::notifications::run(config_handle, action, cli.format).await
        }
        Commands::Config { action } => {
            commands::config::run(config_handle, action, cli.format).await
        }
        Commands::Status => commands::status::run(config_handle, cli.format).await,
    }
}
