//! Command handlers
//!
//! One module per resource. Handlers take an already-opened store, except
//! `init` and `config` which run before (or without) one.

pub mod car;
pub mod config;
pub mod family;
pub mod init;
pub mod parking;
pub mod reset;
pub mod state;
pub mod status;

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Parse a JSON argument given on the command line
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).context("Invalid JSON argument")
}

/// Read and parse a JSON file
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON in {:?}", path))
}

/// Ask a yes/no question on stdin, defaulting to no
pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim(), "y" | "Y" | "yes" | "YES"))
}
