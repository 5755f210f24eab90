//! Unified storage interface
//!
//! The `Store` owns the single SQLite connection and hands out borrowed
//! repositories and retention logs that run their requests on it.
//!
//! ## Lifecycle
//!
//! `Store::new` only records where the database lives. `Store::open`
//! connects, upgrades the schema (seeding the reference tables when the
//! database is created) and keeps the connection; calling it again is a
//! no-op. Every other operation fails with `StorageError::NotOpen` until
//! then.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::new(Config::load()?);
//! store.open(&seed)?;
//!
//! store.families().put(&Family::new("Sedan"))?;
//! store.saved_states().append(&SavedState::new("slot 1", state), 10)?;
//! ```

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::models::{Car, Family, SavedParking, SavedState, Seed};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::repository::Repository;
use crate::storage::retention::{AppendOutcome, RetentionLog};
use crate::storage::schema::{self, UpgradeReport, DATA_TABLES};

/// How long a request waits on a database lock held elsewhere
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the database lives
#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Row counts and schema version of an open store
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoreStats {
    pub schema_version: u32,
    pub families: usize,
    pub cars: usize,
    pub saved_states: usize,
    pub saved_parking: usize,
}

/// Unified storage interface for Garage
///
/// Share it across threads with `Arc<Store>`; requests are serialized on
/// the one connection.
pub struct Store {
    config: Config,
    location: Location,
    conn: Mutex<Option<Connection>>,
}

impl Store {
    /// Create an unopened store backed by `config.database_path()`
    pub fn new(config: Config) -> Self {
        let location = Location::File(config.database_path());
        Self {
            config,
            location,
            conn: Mutex::new(None),
        }
    }

    /// Create an unopened in-memory store (for testing)
    pub fn in_memory() -> Self {
        Self {
            config: Config::default(),
            location: Location::Memory,
            conn: Mutex::new(None),
        }
    }

    /// Open the store, creating or upgrading the database as needed
    ///
    /// `seed` is written only when the database is created. Returns what the
    /// upgrade did, or `None` if the store was already open (`seed` is then
    /// ignored).
    pub fn open(&self, seed: &Seed) -> StorageResult<Option<UpgradeReport>> {
        let mut slot = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        if slot.is_some() {
            debug!("Store already open");
            return Ok(None);
        }

        let mut conn = self.connect()?;
        let report = schema::upgrade(&mut conn, seed)?;

        info!(
            location = %self.describe_location(),
            version = report.to,
            upgraded = report.upgraded(),
            "Store opened"
        );
        *slot = Some(conn);
        Ok(Some(report))
    }

    /// Whether `open` has succeeded
    pub fn is_open(&self) -> StorageResult<bool> {
        let slot = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(slot.is_some())
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path of the database file, `None` for in-memory stores
    pub fn database_path(&self) -> Option<&PathBuf> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    /// Stored schema version
    pub fn schema_version(&self) -> StorageResult<u32> {
        self.with_conn(|conn| Ok(schema::get_schema_version(conn)?))
    }

    // ==================== Tables ====================

    /// Families, keyed by `familyName`
    pub fn families(&self) -> Repository<'_, Family> {
        Repository::new(self)
    }

    /// Cars, keyed by `id`
    pub fn cars(&self) -> Repository<'_, Car> {
        Repository::new(self)
    }

    /// Saved application states, newest kept
    pub fn saved_states(&self) -> RetentionLog<'_, SavedState> {
        RetentionLog::new(self)
    }

    /// Saved parking entries, newest kept
    pub fn saved_parking(&self) -> RetentionLog<'_, SavedParking> {
        RetentionLog::new(self)
    }

    /// Append a saved state using the configured history limit
    pub fn append_saved_state(&self, state: &SavedState) -> StorageResult<AppendOutcome> {
        self.saved_states()
            .append(state, self.config.state_history_limit)
    }

    /// Append a parking entry using the configured history limit
    pub fn append_saved_parking(&self, parking: &SavedParking) -> StorageResult<AppendOutcome> {
        self.saved_parking()
            .append(parking, self.config.parking_history_limit)
    }

    // ==================== Reset ====================

    /// Empty every data table in one transaction
    ///
    /// If any table fails to clear, none are cleared.
    pub fn clear_all_data(&self) -> StorageResult<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            for table in DATA_TABLES {
                tx.execute(&format!("DELETE FROM {table}"), [])?;
            }
            tx.commit()?;

            info!("All data cleared");
            Ok(())
        })
    }

    // ==================== Stats ====================

    /// Row counts per table, read in one transaction
    pub fn stats(&self) -> StorageResult<StoreStats> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let count = |table: &str| -> StorageResult<usize> {
                let n: i64 =
                    tx.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })?;
                Ok(n as usize)
            };

            let stats = StoreStats {
                schema_version: schema::get_schema_version(&tx)?,
                families: count("families")?,
                cars: count("cars")?,
                saved_states: count("saved_states")?,
                saved_parking: count("saved_parking")?,
            };
            tx.commit()?;
            Ok(stats)
        })
    }

    // ==================== Internals ====================

    /// Run `f` on the open connection
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut slot = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let conn = slot.as_mut().ok_or(StorageError::NotOpen)?;
        f(conn)
    }

    fn connect(&self) -> StorageResult<Connection> {
        match &self.location {
            Location::Memory => {
                let conn = Connection::open_in_memory().map_err(|source| StorageError::Open {
                    path: PathBuf::from(":memory:"),
                    source,
                })?;
                conn.execute_batch("PRAGMA foreign_keys = ON;")
                    .map_err(|source| StorageError::Open {
                        path: PathBuf::from(":memory:"),
                        source,
                    })?;
                Ok(conn)
            }
            Location::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
                }

                let open_failed = |source| StorageError::Open {
                    path: path.clone(),
                    source,
                };

                let conn = Connection::open(path).map_err(open_failed)?;
                conn.busy_timeout(BUSY_TIMEOUT).map_err(open_failed)?;
                // First statement to touch the file; a corrupt file fails here
                conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get::<_, String>(0))
                    .map_err(open_failed)?;
                conn.execute_batch("PRAGMA synchronous=NORMAL; PRAGMA foreign_keys = ON;")
                    .map_err(open_failed)?;
                Ok(conn)
            }
        }
    }

    fn describe_location(&self) -> String {
        match &self.location {
            Location::File(path) => path.display().to_string(),
            Location::Memory => ":memory:".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::error::ErrorKind;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().join("data"),
            ..Config::default()
        }
    }

    fn sample_seed() -> Seed {
        Seed::new(
            vec![Family::new("A"), Family::new("B").with_order(5)],
            vec![Car::new("car-1").with_field("family", json!("A"))],
        )
    }

    #[test]
    fn test_open_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let store = Store::new(config.clone());
        assert!(!store.is_open().unwrap());

        store.open(&Seed::empty()).unwrap();

        assert!(store.is_open().unwrap());
        assert!(config.database_path().exists());
        assert_eq!(store.schema_version().unwrap(), schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_seed_scenario() {
        let store = Store::in_memory();
        store.open(&sample_seed()).unwrap();

        let a = store.families().get("A").unwrap().unwrap();
        let b = store.families().get("B").unwrap().unwrap();
        assert_eq!(a.order, Some(0));
        assert_eq!(b.order, Some(5));

        let car = store.cars().get("car-1").unwrap().unwrap();
        assert_eq!(car.extra.get("family"), Some(&json!("A")));
    }

    #[test]
    fn test_open_is_idempotent() {
        let store = Store::in_memory();
        store.open(&Seed::empty()).unwrap();
        store.cars().put(&Car::new("kept")).unwrap();

        // Second open keeps the same connection and ignores the seed
        store.open(&sample_seed()).unwrap();

        assert!(store.cars().get("kept").unwrap().is_some());
        assert!(store.families().get_all().unwrap().is_empty());
    }

    #[test]
    fn test_reopen_does_not_reseed() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        {
            let store = Store::new(config.clone());
            store.open(&sample_seed()).unwrap();
            store.families().clear().unwrap();
        }

        let store = Store::new(config);
        store.open(&sample_seed()).unwrap();
        assert!(store.families().get_all().unwrap().is_empty());
        assert_eq!(store.cars().count().unwrap(), 1);
    }

    #[test]
    fn test_data_persists_across_reopens() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let appended;
        {
            let store = Store::new(config.clone());
            store.open(&Seed::empty()).unwrap();
            appended = store
                .saved_states()
                .append(&SavedState::at("slot", 10, json!({"level": 3})), 5)
                .unwrap();
            store
                .saved_parking()
                .append(&SavedParking::at("lot", 4, "memo", 11), 5)
                .unwrap();
        }

        let store = Store::new(config);
        store.open(&Seed::empty()).unwrap();

        let state = store.saved_states().get(appended.id).unwrap().unwrap();
        assert_eq!(state.state, json!({"level": 3}));
        assert_eq!(store.saved_parking().count().unwrap(), 1);
    }

    #[test]
    fn test_operations_before_open_fail() {
        let store = Store::in_memory();

        let err = store.clear_all_data().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotOpen);
        assert!(matches!(store.stats(), Err(StorageError::NotOpen)));
        assert!(matches!(
            store.append_saved_state(&SavedState::at("s", 1, json!(null))),
            Err(StorageError::NotOpen)
        ));
    }

    #[test]
    fn test_corrupt_file_fails_open() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        std::fs::create_dir_all(&config.data_dir).unwrap();
        std::fs::write(config.database_path(), vec![b'x'; 4096]).unwrap();

        let store = Store::new(config);
        let err = store.open(&Seed::empty()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Open);
        assert!(!store.is_open().unwrap());
    }

    #[test]
    fn test_newer_database_fails_open() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        {
            let store = Store::new(config.clone());
            store.open(&Seed::empty()).unwrap();
        }
        {
            let conn = Connection::open(config.database_path()).unwrap();
            conn.execute(
                "UPDATE schema_info SET value = '9' WHERE key = 'version'",
                [],
            )
            .unwrap();
        }

        let store = Store::new(config);
        let err = store.open(&Seed::empty()).unwrap_err();
        assert!(matches!(err, StorageError::VersionTooNew { found: 9, .. }));
        assert!(!store.is_open().unwrap());
    }

    #[test]
    fn test_clear_all_data() {
        let store = Store::in_memory();
        store.open(&sample_seed()).unwrap();
        store
            .append_saved_state(&SavedState::at("s", 1, json!(null)))
            .unwrap();
        store
            .append_saved_parking(&SavedParking::at("p", 1, "", 1))
            .unwrap();

        store.clear_all_data().unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.families, 0);
        assert_eq!(stats.cars, 0);
        assert_eq!(stats.saved_states, 0);
        assert_eq!(stats.saved_parking, 0);

        // Already empty is still a success
        store.clear_all_data().unwrap();
    }

    #[test]
    fn test_clear_all_data_is_atomic() {
        let store = Store::in_memory();
        store.open(&sample_seed()).unwrap();

        // Make the last table in the reset fail to clear
        store
            .with_conn(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER block_parking_delete BEFORE DELETE ON saved_parking
                     BEGIN SELECT RAISE(ABORT, 'blocked'); END;",
                )?;
                Ok(())
            })
            .unwrap();
        store
            .saved_parking()
            .append(&SavedParking::at("p", 1, "", 1), 5)
            .unwrap();

        let err = store.clear_all_data().unwrap_err();
        assert!(matches!(err, StorageError::Database(_)));

        let stats = store.stats().unwrap();
        assert_eq!(stats.families, 2);
        assert_eq!(stats.cars, 1);
        assert_eq!(stats.saved_parking, 1);
    }

    #[test]
    fn test_append_uses_configured_limits() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            state_history_limit: 2,
            parking_history_limit: 3,
            ..test_config(&temp_dir)
        };
        let store = Store::new(config);
        store.open(&Seed::empty()).unwrap();

        for ts in 0..6 {
            store
                .append_saved_state(&SavedState::at("s", ts, json!(null)))
                .unwrap();
            store
                .append_saved_parking(&SavedParking::at("p", 1, "", ts))
                .unwrap();
        }

        assert_eq!(store.saved_states().count().unwrap(), 2);
        assert_eq!(store.saved_parking().count().unwrap(), 3);
    }

    #[test]
    fn test_stats() {
        let store = Store::in_memory();
        store.open(&sample_seed()).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.schema_version, schema::SCHEMA_VERSION);
        assert_eq!(stats.families, 2);
        assert_eq!(stats.cars, 1);
    }

    #[test]
    fn test_open_reports_upgrade_once() {
        let store = Store::in_memory();

        let report = store.open(&Seed::empty()).unwrap().unwrap();
        assert_eq!(report.from, 0);
        assert_eq!(report.to, schema::SCHEMA_VERSION);

        assert!(store.open(&Seed::empty()).unwrap().is_none());
    }

    #[test]
    fn test_empty_existing_file_is_created_and_seeded() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        std::fs::create_dir_all(&config.data_dir).unwrap();
        std::fs::write(config.database_path(), b"").unwrap();

        let store = Store::new(config);
        let report = store.open(&sample_seed()).unwrap().unwrap();

        assert_eq!(report.from, 0);
        assert_eq!(store.families().count().unwrap(), 2);
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        let store = Store::in_memory();
        store.open(&Seed::empty()).unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = store.with_conn(|_| -> StorageResult<()> { panic!("boom") });
        }));
        assert!(result.is_err());

        assert!(matches!(store.is_open(), Err(StorageError::LockPoisoned)));
        assert!(matches!(store.stats(), Err(StorageError::LockPoisoned)));
    }

    #[test]
    fn test_stats_counts_every_table() {
        let store = Store::in_memory();
        store.open(&sample_seed()).unwrap();
        store
            .append_saved_state(&SavedState::at("s", 1, json!(null)))
            .unwrap();
        store
            .append_saved_parking(&SavedParking::at("p", 1, "", 1))
            .unwrap();
        store
            .append_saved_parking(&SavedParking::at("p", 1, "", 2))
            .unwrap();

        assert_eq!(
            store.stats().unwrap(),
            StoreStats {
                schema_version: schema::SCHEMA_VERSION,
                families: 2,
                cars: 1,
                saved_states: 1,
                saved_parking: 2,
            }
        );
    }

    #[test]
    fn test_shared_across_threads() {
        let store = Arc::new(Store::in_memory());
        store.open(&Seed::empty()).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let cars: Vec<Car> = (0..10).map(|j| Car::new(format!("{i}-{j}"))).collect();
                    store.cars().bulk_put(&cars).unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.cars().count().unwrap(), 40);
    }
}
