//! SQLite schema and version-gated migrations
//!
//! The schema version lives in `schema_info` under the key `version`
//! (0 when the table or the key is absent). Opening a store runs every
//! migration whose version is above the stored one, in ascending order,
//! inside one IMMEDIATE transaction: either the database ends up at
//! `SCHEMA_VERSION` or nothing changes.
//!
//! Seeding belongs to the version 1 step, so reference data is written only
//! when the store is created. Re-opening never reseeds, even if the tables
//! have since been emptied.

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::models::{Family, Seed};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::repository::upsert;

/// Current schema version
pub const SCHEMA_VERSION: u32 = 2;

/// Tables holding user data, in the order they are cleared by a reset
pub const DATA_TABLES: [&str; 4] = ["families", "cars", "saved_states", "saved_parking"];

/// One upgrade step
pub struct Migration {
    /// Version the database is at once this step has run
    pub version: u32,
    pub description: &'static str,
    pub apply: fn(&Transaction<'_>, &Seed) -> StorageResult<()>,
}

/// Every migration, ascending by version
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "families and cars tables, initial seed",
        apply: migrate_v1,
    },
    Migration {
        version: 2,
        description: "saved_states and saved_parking history tables",
        apply: migrate_v2,
    },
];

/// What an upgrade did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    pub from: u32,
    pub to: u32,
    /// Versions of the steps that ran
    pub applied: Vec<u32>,
}

impl UpgradeReport {
    pub fn upgraded(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Bring the database up to `SCHEMA_VERSION`
///
/// Fails with `VersionTooNew` if the database was written by a newer build,
/// and with `Migration` if any step fails; in both cases nothing is changed.
pub fn upgrade(conn: &mut Connection, seed: &Seed) -> StorageResult<UpgradeReport> {
    let setup_failed = |source: rusqlite::Error| StorageError::Migration {
        version: SCHEMA_VERSION,
        source: Box::new(source.into()),
    };

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(setup_failed)?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
    .map_err(setup_failed)?;

    let from = get_schema_version(&tx).map_err(setup_failed)?;
    if from > SCHEMA_VERSION {
        warn!(
            found = from,
            supported = SCHEMA_VERSION,
            "Database was written by a newer version"
        );
        return Err(StorageError::VersionTooNew {
            found: from,
            supported: SCHEMA_VERSION,
        });
    }

    let mut applied = Vec::new();
    for migration in MIGRATIONS.iter().filter(|m| m.version > from) {
        debug!(
            version = migration.version,
            "Applying migration: {}", migration.description
        );
        (migration.apply)(&tx, seed).map_err(|e| StorageError::Migration {
            version: migration.version,
            source: Box::new(e),
        })?;
        applied.push(migration.version);
    }

    if !applied.is_empty() {
        set_schema_version(&tx, SCHEMA_VERSION).map_err(setup_failed)?;
    }
    tx.commit().map_err(setup_failed)?;

    if !applied.is_empty() {
        info!(from, to = SCHEMA_VERSION, "Schema upgraded");
    }

    Ok(UpgradeReport {
        from,
        to: SCHEMA_VERSION,
        applied,
    })
}

/// Get the stored schema version, 0 for a new database
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    if !table_exists(conn, "schema_info")? {
        return Ok(0);
    }

    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_info WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
}

/// Check if the database is behind `SCHEMA_VERSION`
pub fn needs_upgrade(conn: &Connection) -> rusqlite::Result<bool> {
    Ok(get_schema_version(conn)? < SCHEMA_VERSION)
}

fn set_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?1)",
        params![version.to_string()],
    )?;
    Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?
        .exists(params![name])
}

/// V1: reference tables, seeded when created
fn migrate_v1(tx: &Transaction<'_>, seed: &Seed) -> StorageResult<()> {
    let families_fresh = !table_exists(tx, "families")?;
    let cars_fresh = !table_exists(tx, "cars")?;

    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS families (
            family_name TEXT PRIMARY KEY NOT NULL,
            data TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS cars (
            id TEXT PRIMARY KEY NOT NULL,
            data TEXT NOT NULL
        );
        ",
    )?;

    if families_fresh {
        for (position, family) in seed.families.iter().enumerate() {
            upsert(tx, &seeded_family(family, position))?;
        }
    }
    if cars_fresh {
        for car in &seed.cars {
            upsert(tx, car)?;
        }
    }

    debug!(
        families = if families_fresh { seed.families.len() } else { 0 },
        cars = if cars_fresh { seed.cars.len() } else { 0 },
        "Seeded reference tables"
    );
    Ok(())
}

/// V2: bounded history logs
fn migrate_v2(tx: &Transaction<'_>, _seed: &Seed) -> StorageResult<()> {
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS saved_states (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            data TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_saved_states_timestamp ON saved_states(timestamp);

        CREATE TABLE IF NOT EXISTS saved_parking (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            data TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_saved_parking_timestamp ON saved_parking(timestamp);
        CREATE INDEX IF NOT EXISTS idx_saved_parking_name ON saved_parking(name);
        ",
    )?;
    Ok(())
}

/// A seed family with `order` defaulted to its position in the seed
fn seeded_family(family: &Family, position: usize) -> Family {
    let mut family = family.clone();
    if family.order.is_none() {
        family.order = Some(position as i64);
    }
    family
}
