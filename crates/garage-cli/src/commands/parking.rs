//! Saved parking command handlers

use anyhow::{bail, Result};

use garage_core::{SavedParking, Store};

use crate::output::Output;

/// List parking entries, newest first, optionally only those with `name`
pub fn list(store: &Store, name: Option<String>, output: &Output) -> Result<()> {
    let entries = match name {
        Some(name) => store.saved_parking().find_by_name(&name)?,
        None => store.saved_parking().get_all_descending()?,
    };
    output.print_parking(&entries);
    Ok(())
}

/// Show one parking entry
pub fn show(store: &Store, id: i64, output: &Output) -> Result<()> {
    match store.saved_parking().get(id)? {
        Some(entry) => {
            output.print_record(&entry, &id.to_string());
            Ok(())
        }
        None => bail!("Saved parking not found: {}", id),
    }
}

/// Save a parking entry, evicting the oldest beyond the history limit
///
/// Entries with the same name are kept side by side.
pub fn save(
    store: &Store,
    name: String,
    limit: i64,
    memo: Option<String>,
    keep: Option<usize>,
    output: &Output,
) -> Result<()> {
    let entry = SavedParking::new(name, limit, memo.unwrap_or_default());
    let capacity = keep.unwrap_or(store.config().parking_history_limit);
    let outcome = store.saved_parking().append(&entry, capacity)?;

    if output.is_quiet() {
        println!("{}", outcome.id);
    } else if outcome.pruned > 0 {
        output.success(&format!(
            "Saved parking {} (removed {} older)",
            outcome.id, outcome.pruned
        ));
    } else {
        output.success(&format!("Saved parking {}", outcome.id));
    }
    Ok(())
}

/// Delete a parking entry
pub fn delete(store: &Store, id: i64, output: &Output) -> Result<()> {
    if store.saved_parking().delete(id)? {
        output.success(&format!("Deleted saved parking {}", id));
    } else {
        output.message(&format!("No saved parking {}", id));
    }
    Ok(())
}
