//! Key-value repositories for the reference tables
//!
//! `families` and `cars` share one layout: the natural key in its own
//! primary-key column and the full JSON record in `data`. `put` is an upsert,
//! so a table never holds two rows for the same key.

use std::marker::PhantomData;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::models::{Car, Family};
use crate::storage::error::{StorageError, StorageResult};
use crate::store::Store;

/// A record stored in a table keyed by a natural identifier
pub trait KeyedRecord: Serialize + DeserializeOwned {
    /// Table name
    const TABLE: &'static str;
    /// Primary-key column holding `key()`
    const KEY_COLUMN: &'static str;
    /// Field name of the key in the JSON encoding (for error messages)
    const KEY_FIELD: &'static str;

    /// The natural key
    fn key(&self) -> &str;
}

impl KeyedRecord for Family {
    const TABLE: &'static str = "families";
    const KEY_COLUMN: &'static str = "family_name";
    const KEY_FIELD: &'static str = "familyName";

    fn key(&self) -> &str {
        &self.family_name
    }
}

impl KeyedRecord for Car {
    const TABLE: &'static str = "cars";
    const KEY_COLUMN: &'static str = "id";
    const KEY_FIELD: &'static str = "id";

    fn key(&self) -> &str {
        &self.id
    }
}

/// Insert or fully replace `record` using an existing connection or transaction
pub(crate) fn upsert<R: KeyedRecord>(conn: &Connection, record: &R) -> StorageResult<()> {
    let key = record.key();
    if key.trim().is_empty() {
        return Err(StorageError::InvalidRecord {
            table: R::TABLE,
            reason: format!("{} must not be empty", R::KEY_FIELD),
        });
    }

    let data = serde_json::to_string(record)?;
    let mut stmt = conn.prepare_cached(&format!(
        "INSERT OR REPLACE INTO {} ({}, data) VALUES (?1, ?2)",
        R::TABLE,
        R::KEY_COLUMN
    ))?;
    stmt.execute(params![key, data])?;
    Ok(())
}

/// Repository over one keyed table
///
/// Borrowed from a [`Store`]; every call runs in its own transaction on the
/// store's single connection.
pub struct Repository<'a, R> {
    store: &'a Store,
    _record: PhantomData<R>,
}

impl<'a, R: KeyedRecord> Repository<'a, R> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    /// Get a record by key. A missing key is `Ok(None)`.
    pub fn get(&self, key: &str) -> StorageResult<Option<R>> {
        self.store.with_conn(|conn| {
            let data: Option<String> = conn
                .query_row(
                    &format!(
                        "SELECT data FROM {} WHERE {} = ?1",
                        R::TABLE,
                        R::KEY_COLUMN
                    ),
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;

            data.map(|d| serde_json::from_str(&d).map_err(StorageError::from))
                .transpose()
        })
    }

    /// Get every record, in engine order
    ///
    /// The order carries no meaning; callers that need `Family::order`
    /// must sort the result themselves.
    pub fn get_all(&self) -> StorageResult<Vec<R>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT data FROM {}", R::TABLE))?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

            let mut records = Vec::new();
            for data in rows {
                records.push(serde_json::from_str(&data?)?);
            }
            Ok(records)
        })
    }

    /// Insert or replace a record by its key
    pub fn put(&self, record: &R) -> StorageResult<()> {
        self.store.with_conn(|conn| {
            upsert(conn, record)?;
            debug!(table = R::TABLE, key = record.key(), "Record stored");
            Ok(())
        })
    }

    /// Put several records in one transaction
    ///
    /// Either every record is committed or, if any put fails, none are.
    pub fn bulk_put(&self, records: &[R]) -> StorageResult<usize> {
        self.store.with_conn(|conn| {
            if records.is_empty() {
                return Ok(0);
            }

            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            for record in records {
                upsert(&tx, record)?;
            }
            tx.commit()?;

            debug!(table = R::TABLE, count = records.len(), "Bulk put committed");
            Ok(records.len())
        })
    }

    /// Delete a record by key. Deleting a missing key is not an error.
    pub fn delete(&self, key: &str) -> StorageResult<bool> {
        self.store.with_conn(|conn| {
            let removed = conn.execute(
                &format!("DELETE FROM {} WHERE {} = ?1", R::TABLE, R::KEY_COLUMN),
                params![key],
            )?;
            Ok(removed > 0)
        })
    }

    /// Remove every row in the table
    pub fn clear(&self) -> StorageResult<usize> {
        self.store.with_conn(|conn| {
            let removed = conn.execute(&format!("DELETE FROM {}", R::TABLE), [])?;
            debug!(table = R::TABLE, removed, "Table cleared");
            Ok(removed)
        })
    }

    /// Number of rows in the table
    pub fn count(&self) -> StorageResult<usize> {
        self.store.with_conn(|conn| {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", R::TABLE), [], |row| {
                    row.get(0)
                })?;
            Ok(count as usize)
        })
    }
}
