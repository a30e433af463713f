//! Rentkar CLI - drive the realtime notification pipeline from a terminal.
//!
//! Useful for headless smoke testing against a backend: store a token,
//! reconcile counts, follow live notifications, or push a chat message.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use rk_core::config::{AppConfig, ConfigHandle};
use rk_core::error::RkResult;
use rk_core::logging;

/// Rentkar - realtime chat and booking notifications.
#[derive(Parser)]
#[command(
    name = "rentkar",
    version,
    about = "Rentkar realtime notifications CLI",
    long_about = "A command-line client for the Rentkar realtime pipeline.\n\
                   Connects to the chat socket, reconciles badge counts over REST\n\
                   and shows booking and chat notifications on the desktop."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

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
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the auth token used for REST and socket calls.
    Login {
        /// JWT issued by the backend.
        #[arg(short, long)]
        token: String,
    },
    /// Forget the stored auth token and push registration.
    Logout,
    /// Fetch unread chat and pending booking counts once.
    Counts,
    /// Connect and follow notifications until Ctrl+C.
    Listen,
    /// Send a chat message over the socket.
    Send {
        /// Chat room id.
        #[arg(long = "chat")]
        chat_id: String,
        /// Message text.
        content: String,
    },
    /// Inspect or create the configuration file.
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> RkResult<()> {
    let cli = Cli::parse();

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => AppConfig::default_config_path()?,
    };
    let config = if config_path.exists() {
        AppConfig::load_from_file(&config_path)?
    } else {
        AppConfig::default()
    };

    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let _guard = logging::init_logging(
        &log_level,
        &config.effective_log_dir()?,
        config.logging.json_output,
    )?;

    let config_handle = ConfigHandle::new(config);

    info!("Rentkar CLI v{}", rk_core::constants::APP_VERSION);

    match cli.command {
        Commands::Login { token } => commands::auth::login(config_handle, token, cli.format).await,
        Commands::Logout => commands::auth::logout(config_handle, cli.format).await,
        Commands::Counts => commands::counts::run(config_handle, cli.format).await,
        Commands::Listen => commands::listen::run(config_handle, cli.format).await,
        Commands::Send { chat_id, content } => {
            commands::send::run(config_handle, chat_id, content, cli.format).await
        }
        Commands::Config { action } => {
            commands::config::run(config_handle, action, config_path, cli.format).await
        }
    }
}
