//! Status command - show backend reachability and login state.

use console::style;

use bc_api::RetryConfig;
use bc_core::config::ConfigHandle;
use bc_core::error::{BcError, BcResult};
use bc_socket::ChannelEndpoint;

use crate::OutputFormat;

/// Run the status command.
pub async fn run(config: ConfigHandle, format: OutputFormat) -> BcResult<()> {
    let (address, username, logged_in, channel_url) = {
        let cfg = config.read().await;
        let channel_url = cfg
            .is_server_configured()
            .then(|| ChannelEndpoint::from_config(&cfg).url_for("TOKEN"));
        (
            cfg.server.address.clone(),
            cfg.auth.username.clone(),
            cfg.is_logged_in(),
            channel_url,
        )
    };

    // The unread count doubles as an authenticated reachability check.
    let mut latency_ms = None;
    let check: Option<BcResult<u64>> = if logged_in {
        let api = super::create_api_client(&config)
            .await?
            .with_retry_config(RetryConfig::none());
        let start = std::time::Instant::now();
        let result = api.unread_count().await;
        latency_ms = Some(start.elapsed().as_millis());
        Some(result)
    } else {
        None
    };

    let reachable = matches!(
        check,
        Some(Ok(_)) | Some(Err(BcError::AuthFailed(_))) | Some(Err(BcError::ServerError { .. }))
    );
    let token_valid = matches!(check, Some(Ok(_)));

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "server_address": address,
                "channel_url": channel_url,
                "username": username,
                "logged_in": logged_in,
                "server_reachable": reachable,
                "token_valid": token_valid,
                "latency_ms": latency_ms,
                "unread": check.as_ref().and_then(|r| r.as_ref().ok()),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("{}", style("Beacon Status").bold().underlined());
            println!();
            if address.is_empty() {
                println!("  Server:    {}", style("not configured").yellow());
            } else {
                println!("  Server:    {address}");
            }
            if let Some(url) = &channel_url {
                println!("  Channel:   {}", style(url).dim());
            }

            if !logged_in {
                println!("  Login:     {}", style("not logged in").yellow());
                return Ok(());
            }
            let who = if username.is_empty() { "token only" } else { username.as_str() };
            println!("  Login:     {who}");

            match &check {
                Some(Ok(unread)) => {
                    println!(
                        "  Reachable: {} ({}ms)",
                        style("yes").green(),
                        latency_ms.unwrap_or_default()
                    );
                    println!("  Unread:    {unread}");
                }
                Some(Err(e)) if reachable => {
                    println!("  Reachable: {}", style("yes").green());
                    let verdict = match e {
                        BcError::AuthFailed(_) => "rejected",
                        _ => "unverified",
                    };
                    println!("  Token:     {} ({e})", style(verdict).red());
                }
                Some(Err(e)) => {
                    println!("  Reachable: {} ({e})", style("no").red());
                }
                None => {}
            }
        }
    }

    Ok(())
}
