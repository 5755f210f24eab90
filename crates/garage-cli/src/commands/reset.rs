//! Reset command handler

use anyhow::Result;

use garage_core::Store;

use super::confirm;
use crate::output::Output;

/// Remove all families, cars, saved states and saved parking
pub fn run(store: &Store, yes: bool, output: &Output) -> Result<()> {
    if !yes && output.should_prompt() && !confirm("Delete ALL stored data?")? {
        output.message("Aborted.");
        return Ok(());
    }

    store.clear_all_data()?;
    output.success("All data cleared");
    Ok(())
}
