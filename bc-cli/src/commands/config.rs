//! Config inspection commands.

use clap::Subcommand;
use console::style;

use bc_core::config::ConfigHandle;
use bc_core::error::{BcError, BcResult};

use super::mask_secret;
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration with the token masked.
    Show,
    /// Print the config file location.
    Path,
}

pub async fn run(config: ConfigHandle, action: ConfigAction, format: OutputFormat) -> BcResult<()> {
    match action {
        ConfigAction::Show => {
            let mut cfg = config.read().await.clone();
            cfg.auth.token = mask_secret(&cfg.auth.token);
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&cfg)?);
                }
                OutputFormat::Text => {
                    let text = toml::to_string_pretty(&cfg)
                        .map_err(|e| BcError::Serialization(e.to_string()))?;
                    print!("{text}");
                }
            }
        }
        ConfigAction::Path => {
            let path = config.path()?;
            let exists = path.exists();
            match format {
                OutputFormat::Json => {
                    let out = serde_json::json!({
                        "path": path.display().to_string(),
                        "exists": exists,
                    });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
                OutputFormat::Text if exists => println!("{}", path.display()),
                OutputFormat::Text => {
                    println!("{} {}", path.display(), style("(not created yet)").dim());
                }
            }
        }
    }
    Ok(())
}
