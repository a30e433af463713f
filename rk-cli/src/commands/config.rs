//! Config commands.

use std::path::PathBuf;

use clap::Subcommand;
use console::style;

use rk_core::config::{AppConfig, ConfigHandle};
use rk_core::error::{RkError, RkResult};

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show,
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration file path.
    Path,
}

pub async fn run(
    config: ConfigHandle,
    action: ConfigAction,
    path: PathBuf,
    format: OutputFormat,
) -> RkResult<()> {
    match action {
        ConfigAction::Show => {
            let cfg = config.read().await;
            match format {
                OutputFormat::Json => super::print_json(&*cfg)?,
                OutputFormat::Text => {
                    let os = cfg.device.os;
                    println!("{}", style("Effective endpoints").bold());
                    println!("  API:       {}", cfg.server.effective_api_base_url(os));
                    println!("  WebSocket: {}", cfg.server.effective_ws_url(os));
                    println!();
                    let rendered = toml::to_string_pretty(&*cfg)
                        .map_err(|e| RkError::Config(e.to_string()))?;
                    print!("{rendered}");
                }
            }
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                println!(
                    "{} {} already exists (use --force to overwrite)",
                    style("--").dim(),
                    path.display()
                );
                return Ok(());
            }
            AppConfig::default().save_to_file(&path)?;
            println!("{} Config written to {}", style("OK").green().bold(), path.display());
        }
        ConfigAction::Path => match format {
            OutputFormat::Json => super::print_json(&serde_json::json!({ "path": path }))?,
            OutputFormat::Text => println!("{}", path.display()),
        },
    }
    Ok(())
}
