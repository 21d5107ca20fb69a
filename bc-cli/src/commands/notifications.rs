//! Notification listing and acknowledgement commands.

use clap::Subcommand;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;

use bc_api::{Notification, NotificationId};
use bc_core::config::ConfigHandle;
use bc_core::error::BcResult;

use super::{create_api_client, format_timestamp, require_login, truncate};
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum NotificationsAction {
    /// List recent notifications, newest first.
    List {
        /// Maximum number of notifications to fetch.
        #[arg(short, long, default_value = "20")]
        limit: u32,
        /// Only show unread notifications.
        #[arg(short, long)]
        unread: bool,
    },
    /// Mark one notification as read.
    Read {
        /// Notification ID.
        id: String,
    },
    /// Mark every notification as read.
    ReadAll,
    /// Print the unread count.
    Unread,
}

pub async fn run(config: ConfigHandle, action: NotificationsAction, format: OutputFormat) -> BcResult<()> {
    require_login(&config).await?;
    let api = create_api_client(&config).await?;

    match action {
        NotificationsAction::List { limit, unread } => {
            let mut items = api.list_notifications(limit).await?;
            if unread {
                items.retain(|n| !n.is_read);
            }
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&items)?);
                }
                OutputFormat::Text => print_table(&items),
            }
        }
        NotificationsAction::Read { id } => {
            let id = NotificationId::new(id);
            api.mark_notification_read(&id).await?;
            match format {
                OutputFormat::Json => {
                    let out = serde_json::json!({ "id": id, "read": true });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
                OutputFormat::Text => {
                    println!("{} Marked {} as read", style("OK").green().bold(), id);
                }
            }
        }
        NotificationsAction::ReadAll => {
            api.mark_all_notifications_read().await?;
            match format {
                OutputFormat::Json => {
                    let out = serde_json::json!({ "read_all": true });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
                OutputFormat::Text => {
                    println!("{} All notifications marked as read", style("OK").green().bold());
                }
            }
        }
        NotificationsAction::Unread => {
            let count = api.unread_count().await?;
            match format {
                OutputFormat::Json => {
                    let out = serde_json::json!({ "unread": count });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
                OutputFormat::Text => println!("{count}"),
            }
        }
    }

    Ok(())
}

fn print_table(items: &[Notification]) {
    if items.is_empty() {
        println!("No notifications.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "", "Type", "Title", "Received"]);

    for n in items {
        table.add_row(vec![
            n.id.to_string(),
            if n.is_read { String::new() } else { "*".into() },
            n.kind.clone().unwrap_or_default(),
            truncate(n.headline(), 60),
            format_timestamp(n.created_at),
        ]);
    }

    println!("{table}");
    let unread = items.iter().filter(|n| !n.is_read).count();
    println!("{} notification(s), {} unread", items.len(), unread);
}
