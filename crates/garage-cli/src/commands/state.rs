//! Saved state command handlers

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde_json::Value;

use garage_core::{SavedState, Store};

use super::{parse_json, read_json_file};
use crate::output::Output;

/// List saved states, newest first
pub fn list(store: &Store, output: &Output) -> Result<()> {
    let states = store.saved_states().get_all_descending()?;
    output.print_states(&states);
    Ok(())
}

/// Show one saved state including its payload
pub fn show(store: &Store, id: i64, output: &Output) -> Result<()> {
    match store.saved_states().get(id)? {
        Some(state) => {
            output.print_record(&state, &id.to_string());
            Ok(())
        }
        None => bail!("Saved state not found: {}", id),
    }
}

/// Save a state snapshot, evicting the oldest beyond the history limit
pub fn save(
    store: &Store,
    name: String,
    data: Option<String>,
    file: Option<PathBuf>,
    keep: Option<usize>,
    output: &Output,
) -> Result<()> {
    let payload: Value = match (data, file) {
        (Some(text), _) => parse_json(&text)?,
        (None, Some(path)) => read_json_file(&path)?,
        (None, None) => bail!("Provide the state with --data or --file"),
    };

    let state = SavedState::new(name, payload);
    let capacity = keep.unwrap_or(store.config().state_history_limit);
    let outcome = store.saved_states().append(&state, capacity)?;

    if output.is_quiet() {
        println!("{}", outcome.id);
    } else if outcome.pruned > 0 {
        output.success(&format!(
            "Saved state {} (removed {} older)",
            outcome.id, outcome.pruned
        ));
    } else {
        output.success(&format!("Saved state {}", outcome.id));
    }
    Ok(())
}

/// Delete a saved state
pub fn delete(store: &Store, id: i64, output: &Output) -> Result<()> {
    if store.saved_states().delete(id)? {
        output.success(&format!("Deleted saved state {}", id));
    } else {
        output.message(&format!("No saved state {}", id));
    }
    Ok(())
}
