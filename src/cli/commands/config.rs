//! Config command implementations.

use super::{Context, print_json};
use crate::cli::{Cli, ConfigCommands};
use crate::config::{ClientConfig, ConfigFile, config_path, load_config, save_config};
use crate::error::Result;
use colored::Colorize;
use tracing::warn;

/// Execute config commands.
///
/// Only `show` resolves the full configuration; `set` and `path` work even
/// when the existing file is unreadable, so a broken file can be repaired.
///
/// # Errors
///
/// Returns an error if the config file cannot be read (for `show`) or
/// written, or the key/value is invalid.
pub fn execute(command: &ConfigCommands, cli: &Cli, json: bool) -> Result<()> {
    match command {
        ConfigCommands::Show => show(&Context::from_cli(cli, json)?.config, json),
        ConfigCommands::Set { key, value } => {
            let mut file = load_config().unwrap_or_else(|e| {
                warn!(error = %e, "replacing unreadable config file");
                ConfigFile::default()
            });
            file.set(key, value)?;
            let path = save_config(&file)?;

            if json {
                return print_json(&serde_json::json!({
                    "key": key,
                    "path": path.display().to_string(),
                }));
            }
            println!("Set {key} in {}", path.display());
            Ok(())
        }
        ConfigCommands::Path => {
            let path = config_path()?;
            if json {
                return print_json(&serde_json::json!({ "path": path.display().to_string() }));
            }
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn show(config: &ClientConfig, json: bool) -> Result<()> {
    if json {
        return print_json(config);
    }

    let unset = || "(unset)".dimmed().to_string();
    println!("{}", "Configuration".cyan().bold());
    println!("  api_url:             {}", config.api_url);
    println!(
        "  api_token:           {}",
        if config.api_token.is_some() { "********".to_string() } else { unset() }
    );
    println!("  workspace:           {}", config.workspace.clone().unwrap_or_else(unset));
    println!("  project:             {}", config.project.clone().unwrap_or_else(unset));
    println!("  retry_count:         {}", config.retry_count);
    println!("  retry_base_delay_ms: {}", config.retry_base_delay_ms);
    println!("  rollback_on_failure: {}", config.rollback_on_failure);
    Ok(())
}
