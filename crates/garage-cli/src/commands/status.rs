//! Status command handler

use anyhow::Result;

use garage_core::Store;

use crate::output::Output;

/// Show schema version and row counts
pub fn show(store: &Store, output: &Output) -> Result<()> {
    let stats = store.stats()?;
    let location = store
        .database_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ":memory:".to_string());

    output.print_stats(&stats, &location);
    Ok(())
}
