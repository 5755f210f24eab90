//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use garage_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "data_dir, database_file, state_history_limit, parking_history_limit, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "database_file": config.database_file,
                    "state_history_limit": config.state_history_limit,
                    "parking_history_limit": config.parking_history_limit,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.database_path().display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:              {}", config.data_dir.display());
            println!("  database_file:         {}", config.database_file);
            println!("  state_history_limit:   {}", config.state_history_limit);
            println!("  parking_history_limit: {}", config.parking_history_limit);
            println!(
                "  log_file:              {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "database_file" => {
            if value.is_empty() {
                bail!("database_file must not be empty");
            }
            config.database_file = value.to_string();
        }
        "state_history_limit" => {
            config.state_history_limit = value
                .parse()
                .context("Invalid value for state_history_limit. Use a whole number.")?;
        }
        "parking_history_limit" => {
            config.parking_history_limit = value
                .parse()
                .context("Invalid value for parking_history_limit. Use a whole number.")?;
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }
    Ok(())
}
