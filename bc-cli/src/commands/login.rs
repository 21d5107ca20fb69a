//! Login and logout commands.

use console::style;
use dialoguer::{Input, Password};

use bc_api::ApiClient;
use bc_core::config::{AppConfig, ConfigHandle};
use bc_core::error::{BcError, BcResult};
use bc_services::{ConfigCredentialStore, CredentialStore};

use crate::OutputFormat;

/// Exchange username and password for an API token and persist it.
pub async fn run(
    config: ConfigHandle,
    address: Option<String>,
    username: Option<String>,
    password: Option<String>,
    format: OutputFormat,
) -> BcResult<()> {
    // Determine address: arg > config > interactive prompt
    let configured = config.read().await.server.address.clone();
    let addr = match address {
        Some(a) => a,
        None if !configured.is_empty() => configured,
        None => Input::new()
            .with_prompt("Backend address")
            .interact_text()
            .map_err(|e| BcError::Internal(e.to_string()))?,
    };
    let addr = AppConfig::sanitize_server_address(&addr);
    if addr.is_empty() {
        return Err(BcError::MissingConfig("server.address".into()));
    }

    let known_user = config.read().await.auth.username.clone();
    let user = match username {
        Some(u) => u,
        None => {
            let mut prompt = Input::<String>::new().with_prompt("Username");
            if !known_user.is_empty() {
                prompt = prompt.default(known_user);
            }
            prompt
                .interact_text()
                .map_err(|e| BcError::Internal(e.to_string()))?
        }
    };

    let pass = match password {
        Some(p) => p,
        None => Password::new()
            .with_prompt("Password")
            .interact()
            .map_err(|e| BcError::Internal(e.to_string()))?,
    };

    if matches!(format, OutputFormat::Text) {
        println!(
            "{} Requesting token from {}...",
            style("[1/2]").bold().dim(),
            style(&addr).cyan()
        );
    }

    let server_config = {
        let mut cfg = config.write().await;
        cfg.server.address = addr.clone();
        cfg.server.clone()
    };
    let api = ApiClient::new(&server_config)?;
    let token = api.obtain_token(&user, &pass).await?;

    config.write().await.auth.username = user.clone();
    ConfigCredentialStore::new(config.clone()).store(&token).await?;
    let path = config.path()?;

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "logged_in": true,
                "username": user,
                "server": addr,
                "config": path.display().to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!(
                "{} Saving credentials...",
                style("[2/2]").bold().dim()
            );
            println!(
                "  {} Logged in as {} (config: {})",
                style("OK").green().bold(),
                style(&user).bold(),
                path.display()
            );
        }
    }

    Ok(())
}

/// Forget the stored token. The server address and username are kept.
pub async fn logout(config: ConfigHandle, format: OutputFormat) -> BcResult<()> {
    let store = ConfigCredentialStore::new(config.clone());
    let had_token = store.load().await.is_some();
    store.clear().await?;

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({ "logged_out": had_token });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text if had_token => {
            println!("{} Logged out", style("OK").green().bold());
        }
        OutputFormat::Text => {
            println!("{} No stored token", style("--").dim());
        }
    }
    Ok(())
}
