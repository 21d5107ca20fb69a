//! Listen command: follow notifications live until Ctrl+C.

use std::sync::Arc;

use console::style;
use tokio::sync::broadcast::error::RecvError;

use bc_core::config::ConfigHandle;
use bc_core::error::BcResult;
use bc_services::{
    AppEvent, ConfigCredentialStore, CredentialStore, EventBus, FeedService, FeedSettings,
    NotificationBackend, Service,
};
use bc_socket::{ChannelState, WsTransportFactory};

use super::{create_api_client, format_timestamp, require_login, truncate};
use crate::OutputFormat;

pub async fn run(config: ConfigHandle, recent: usize, format: OutputFormat) -> BcResult<()> {
    require_login(&config).await?;

    let settings = FeedSettings::from_config(&*config.read().await);
    let poll_secs = settings.poll_interval.as_secs();
    let backend: Arc<dyn NotificationBackend> = Arc::new(create_api_client(&config).await?);
    let credentials: Arc<dyn CredentialStore> = Arc::new(ConfigCredentialStore::new(config.clone()));

    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let mut service = FeedService::new(settings, backend, credentials, bus, WsTransportFactory::new());

    if matches!(format, OutputFormat::Text) {
        println!(
            "{} Starting notification feed...",
            style("[1/2]").bold().dim()
        );
    }
    service.init().await?;

    if matches!(format, OutputFormat::Text) {
        println!(
            "  {} {} unread",
            style("OK").green().bold(),
            service.unread_count()
        );
        for n in service.recent(recent).iter().rev() {
            let marker = if n.is_read { style(" ").dim() } else { style("*").yellow().bold() };
            println!(
                "  {} {} {}",
                marker,
                style(format_timestamp(n.created_at)).dim(),
                truncate(n.headline(), 70)
            );
        }
        println!(
            "{} Listening for notifications... (Ctrl+C to stop)",
            style("[2/2]").bold().dim()
        );
        println!();
    }

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => print_event(&ev, format, poll_secs)?,
                    Err(RecvError::Lagged(n)) => {
                        println!(
                            "  {} Missed {n} events (slow consumer)",
                            style("WARN").yellow()
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if matches!(format, OutputFormat::Text) {
                    println!("\n  Disconnecting...");
                }
                break;
            }
        }
    }

    service.shutdown().await
}

fn print_event(event: &AppEvent, format: OutputFormat, poll_secs: u64) -> BcResult<()> {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string(&event_json(event))?);
        return Ok(());
    }

    match event {
        AppEvent::NotificationReceived { notification } => {
            let kind = notification.kind.as_deref().unwrap_or("notice");
            println!(
                "  {} {}",
                style(format!("[{kind}]")).cyan(),
                style(notification.headline()).bold()
            );
            if !notification.title.is_empty() && !notification.message.is_empty() {
                println!("    {}", notification.message);
            }
        }
        AppEvent::NotificationsSynced { added, unread, .. } if *added > 0 => {
            println!(
                "  {} {added} new from server ({unread} unread)",
                style("[sync]").cyan()
            );
        }
        AppEvent::NotificationsSynced { .. } => {}
        AppEvent::NotificationRead { unread, .. } => {
            println!("  {} {unread} unread", style("[read]").dim());
        }
        AppEvent::ChannelError { message } => {
            println!("  {} {message}", style("WARN").yellow());
        }
        AppEvent::ChannelStateChanged { state, attempt_count } => match state {
            ChannelState::Open => println!("  {} channel open", style("OK").green()),
            ChannelState::Closed => println!(
                "  {} channel closed, reconnecting (attempt {})",
                style("--").dim(),
                attempt_count + 1
            ),
            ChannelState::Exhausted => println!(
                "  {} channel gave up after {attempt_count} attempts, polling every {poll_secs}s",
                style("FAIL").red()
            ),
            ChannelState::Idle | ChannelState::Connecting | ChannelState::Disposed => {}
        },
    }
    Ok(())
}

fn event_json(event: &AppEvent) -> serde_json::Value {
    match event {
        AppEvent::NotificationReceived { notification } => serde_json::json!({
            "event": "notification",
            "notification": notification,
        }),
        AppEvent::NotificationsSynced { added, updated, unread } => serde_json::json!({
            "event": "synced",
            "added": added,
            "updated": updated,
            "unread": unread,
        }),
        AppEvent::NotificationRead { id, unread } => serde_json::json!({
            "event": "read",
            "id": id,
            "unread": unread,
        }),
        AppEvent::ChannelError { message } => serde_json::json!({
            "event": "channel_error",
            "message": message,
        }),
        AppEvent::ChannelStateChanged { state, attempt_count } => serde_json::json!({
            "event": "channel_state",
            "state": state,
            "attempt_count": attempt_count,
        }),
    }
}
