//! Login / logout: manage the stored credentials.

use console::style;

use rk_core::config::ConfigHandle;
use rk_core::constants;
use rk_core::error::{RkError, RkResult};
use rk_core::kv::KeyValueStore;

use crate::OutputFormat;

pub async fn login(config: ConfigHandle, token: String, format: OutputFormat) -> RkResult<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(RkError::MissingCredential("empty token".into()));
    }

    let store = super::open_store(&config).await?;
    store.set(constants::AUTH_TOKEN_KEY, token)?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({ "loggedIn": true })),
        OutputFormat::Text => {
            println!("{} Token stored.", style("OK").green().bold());
            Ok(())
        }
    }
}

pub async fn logout(config: ConfigHandle, format: OutputFormat) -> RkResult<()> {
    let store = super::open_store(&config).await?;
    let had_token = store.remove(constants::AUTH_TOKEN_KEY)?;
    store.remove(constants::PUSH_TOKEN_KEY)?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({ "loggedOut": had_token })),
        OutputFormat::Text => {
            if had_token {
                println!("{} Logged out.", style("OK").green().bold());
            } else {
                println!("{} Not logged in.", style("--").dim());
            }
            Ok(())
        }
    }
}
