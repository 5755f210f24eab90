//! Init command handler

use std::path::PathBuf;

use anyhow::{Context, Result};

use garage_core::{Config, Seed, Store};

use super::read_json_file;
use crate::output::Output;

/// Create (or upgrade) the database, seeding it on first creation
///
/// The seed file is a JSON object with optional `families` and `cars`
/// arrays. An existing database is never reseeded.
pub fn run(config: Config, seed_file: Option<PathBuf>, output: &Output) -> Result<Store> {
    let seed: Seed = match &seed_file {
        Some(path) => read_json_file(path)?,
        None => Seed::empty(),
    };

    let (store, created) = open_store(config, &seed)?;

    if output.is_json() {
        println!(
            "{}",
            serde_json::json!({
                "database": store.database_path(),
                "created": created,
                "seeded": created && !seed.is_empty(),
            })
        );
    } else if !created {
        output.message("Store already initialized.");
        if seed_file.is_some() {
            output.message("Seed ignored: reference data is only written when the store is created.");
        }
    } else {
        output.success(&format!(
            "Created store with {} family(ies) and {} car(s)",
            seed.families.len(),
            seed.cars.len()
        ));
    }

    Ok(store)
}

/// Open the store; `true` when this call ran the first schema step
///
/// A file that exists but holds no schema yet (e.g. zero bytes) counts as
/// created, since the seed is written into it.
fn open_store(config: Config, seed: &Seed) -> Result<(Store, bool)> {
    let store = Store::new(config);
    let report = store.open(seed).context("Failed to open store")?;
    let created = report.map_or(false, |r| r.from == 0);
    Ok((store, created))
}
