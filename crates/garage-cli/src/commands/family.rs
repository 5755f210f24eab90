//! Family command handlers

use std::path::PathBuf;

use anyhow::{bail, Result};

use garage_core::{Family, Store};

use super::{parse_json, read_json_file};
use crate::output::Output;

/// List families in display order
pub fn list(store: &Store, output: &Output) -> Result<()> {
    let mut families = store.families().get_all()?;
    sort_for_display(&mut families);
    output.print_families(&families);
    Ok(())
}

/// Show one family
pub fn show(store: &Store, name: String, output: &Output) -> Result<()> {
    match store.families().get(&name)? {
        Some(family) => {
            output.print_record(&family, &family.family_name);
            Ok(())
        }
        None => bail!("Family not found: {}", name),
    }
}

/// Insert or replace a family from a JSON object
pub fn put(store: &Store, json: String, output: &Output) -> Result<()> {
    let family: Family = parse_json(&json)?;
    store.families().put(&family)?;
    output.success(&format!("Saved family {}", family.family_name));
    Ok(())
}

/// Insert or replace every family in a JSON array file, all or nothing
pub fn import(store: &Store, file: PathBuf, output: &Output) -> Result<()> {
    let families: Vec<Family> = read_json_file(&file)?;
    let count = store.families().bulk_put(&families)?;
    output.success(&format!("Imported {} family(ies)", count));
    Ok(())
}

/// Delete a family
pub fn delete(store: &Store, name: String, output: &Output) -> Result<()> {
    if store.families().delete(&name)? {
        output.success(&format!("Deleted family {}", name));
    } else {
        output.message(&format!("No family named {}", name));
    }
    Ok(())
}

/// Delete every family
pub fn clear(store: &Store, output: &Output) -> Result<()> {
    let removed = store.families().clear()?;
    output.success(&format!("Removed {} family(ies)", removed));
    Ok(())
}

/// Families without an order go last; ties fall back to the name
fn sort_for_display(families: &mut [Family]) {
    families.sort_by(|a, b| {
        let key = |f: &Family| f.order.unwrap_or(i64::MAX);
        key(a)
            .cmp(&key(b))
            .then_with(|| a.family_name.cmp(&b.family_name))
    });
}
