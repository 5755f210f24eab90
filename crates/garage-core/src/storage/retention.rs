//! Bounded retention logs
//!
//! `saved_states` and `saved_parking` are append-only histories capped at a
//! caller-supplied capacity. Each append inserts the new row, counts the
//! table and, when the count exceeds the capacity, deletes the oldest rows by
//! `timestamp` (ties broken by ascending `id`). All three steps run in a
//! single IMMEDIATE transaction, so two appends can never interleave their
//! prune passes and a failed prune also discards the insert.

use std::marker::PhantomData;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::models::{SavedParking, SavedState};
use crate::storage::error::StorageResult;
use crate::store::Store;

/// A record kept in a bounded, timestamp-ordered log
pub trait LogRecord: Serialize + DeserializeOwned {
    /// Table name
    const TABLE: &'static str;

    /// Engine-assigned key, if the record has been stored
    fn id(&self) -> Option<i64>;
    fn set_id(&mut self, id: i64);
    fn name(&self) -> &str;
    fn timestamp(&self) -> i64;
}

impl LogRecord for SavedState {
    const TABLE: &'static str = "saved_states";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl LogRecord for SavedParking {
    const TABLE: &'static str = "saved_parking";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Result of [`RetentionLog::append`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Key assigned to the appended record
    pub id: i64,
    /// Rows removed to get back under capacity
    pub pruned: usize,
}

/// Retention log over one table
pub struct RetentionLog<'a, R> {
    store: &'a Store,
    _record: PhantomData<R>,
}

impl<'a, R: LogRecord> RetentionLog<'a, R> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    /// Get a record by id. A missing id is `Ok(None)`.
    pub fn get(&self, id: i64) -> StorageResult<Option<R>> {
        self.store.with_conn(|conn| {
            let row: Option<(i64, String)> = conn
                .query_row(
                    &format!("SELECT id, data FROM {} WHERE id = ?1", R::TABLE),
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            row.map(|(id, data)| decode(id, &data)).transpose()
        })
    }

    /// All records, newest first
    ///
    /// Rows are fetched in storage order and sorted here by `timestamp`
    /// descending; equal timestamps put the later-appended row first.
    pub fn get_all_descending(&self) -> StorageResult<Vec<R>> {
        let mut records: Vec<R> = self.store.with_conn(|conn| {
            query_records(conn, &format!("SELECT id, data FROM {}", R::TABLE), [])
        })?;

        records.sort_by(|a, b| {
            b.timestamp()
                .cmp(&a.timestamp())
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(records)
    }

    /// Records with the given name, newest first
    ///
    /// Names are not unique; the store never collapses entries that share one.
    pub fn find_by_name(&self, name: &str) -> StorageResult<Vec<R>> {
        self.store.with_conn(|conn| {
            query_records(
                conn,
                &format!(
                    "SELECT id, data FROM {} WHERE name = ?1 ORDER BY timestamp DESC, id DESC",
                    R::TABLE
                ),
                params![name],
            )
        })
    }

    /// Append a record and prune the table back to `capacity` rows
    ///
    /// Any `id` already set on `record` is ignored; the engine assigns a new
    /// one. With a capacity of zero the table ends up empty, including the
    /// record just appended.
    pub fn append(&self, record: &R, capacity: usize) -> StorageResult<AppendOutcome> {
        let data = encode(record)?;

        self.store.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            tx.execute(
                &format!(
                    "INSERT INTO {} (name, timestamp, data) VALUES (?1, ?2, ?3)",
                    R::TABLE
                ),
                params![record.name(), record.timestamp(), data],
            )?;
            let id = tx.last_insert_rowid();

            let count: i64 =
                tx.query_row(&format!("SELECT COUNT(*) FROM {}", R::TABLE), [], |row| {
                    row.get(0)
                })?;

            let excess = (count as usize).saturating_sub(capacity);
            let pruned = if excess > 0 {
                prune_oldest(&tx, R::TABLE, excess)?
            } else {
                0
            };

            tx.commit()?;

            if pruned > 0 {
                debug!(table = R::TABLE, pruned, capacity, "Pruned oldest entries");
            }
            Ok(AppendOutcome { id, pruned })
        })
    }

    /// Delete a record by id. Deleting a missing id is not an error.
    pub fn delete(&self, id: i64) -> StorageResult<bool> {
        self.store.with_conn(|conn| {
            let removed = conn.execute(
                &format!("DELETE FROM {} WHERE id = ?1", R::TABLE),
                params![id],
            )?;
            Ok(removed > 0)
        })
    }

    /// Number of rows in the log
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

/// Delete the `excess` oldest rows, walking the timestamp index upward
fn prune_oldest(conn: &Connection, table: &str, excess: usize) -> StorageResult<usize> {
    let removed = conn.execute(
        &format!(
            "DELETE FROM {table} WHERE id IN (
                SELECT id FROM {table} ORDER BY timestamp ASC, id ASC LIMIT ?1
            )"
        ),
        params![excess as i64],
    )?;
    Ok(removed)
}

fn query_records<R: LogRecord, P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> StorageResult<Vec<R>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, data) = row?;
        records.push(decode(id, &data)?);
    }
    Ok(records)
}

/// JSON payload without the `id` field; the key lives in its own column
fn encode<R: LogRecord>(record: &R) -> StorageResult<String> {
    let mut value = serde_json::to_value(record)?;
    if let Value::Object(map) = &mut value {
        map.remove("id");
    }
    Ok(serde_json::to_string(&value)?)
}

fn decode<R: LogRecord>(id: i64, data: &str) -> StorageResult<R> {
    let mut record: R = serde_json::from_str(data)?;
    record.set_id(id);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Seed;
    use crate::storage::error::StorageError;
    use serde_json::json;
    use std::sync::Arc;

    fn open_store() -> Store {
        let store = Store::in_memory();
        store.open(&Seed::empty()).unwrap();
        store
    }

    fn timestamps<R: LogRecord>(records: &[R]) -> Vec<i64> {
        records.iter().map(|r| r.timestamp()).collect()
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let store = open_store();
        let log = store.saved_states();

        let first = log
            .append(&SavedState::at("a", 1, json!({})), 10)
            .unwrap();
        let second = log
            .append(&SavedState::at("b", 2, json!({})), 10)
            .unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.pruned, 0);

        let stored = log.get(first.id).unwrap().unwrap();
        assert_eq!(stored.id, Some(first.id));
        assert_eq!(stored.name, "a");
    }

    #[test]
    fn test_append_ignores_caller_id() {
        let store = open_store();
        let log = store.saved_states();

        let mut state = SavedState::at("a", 1, json!(null));
        state.id = Some(999);
        let outcome = log.append(&state, 10).unwrap();

        assert_ne!(outcome.id, 999);
        assert!(log.get(999).unwrap().is_none());
    }

    #[test]
    fn test_capacity_five_drops_oldest() {
        let store = open_store();
        let log = store.saved_states();

        for ts in 1..=6 {
            log.append(&SavedState::at(format!("s{ts}"), ts, json!({"ts": ts})), 5)
                .unwrap();
        }

        let all = log.get_all_descending().unwrap();
        assert_eq!(timestamps(&all), vec![6, 5, 4, 3, 2]);
        assert_eq!(log.count().unwrap(), 5);
    }

    #[test]
    fn test_prune_uses_timestamp_not_insertion_order() {
        let store = open_store();
        let log = store.saved_parking();

        log.append(&SavedParking::at("late", 1, "", 50), 2).unwrap();
        log.append(&SavedParking::at("early", 1, "", 10), 2).unwrap();
        let outcome = log
            .append(&SavedParking::at("mid", 1, "", 30), 2)
            .unwrap();

        assert_eq!(outcome.pruned, 1);
        let names: Vec<String> = log
            .get_all_descending()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["late", "mid"]);
    }

    #[test]
    fn test_equal_timestamps_prune_lowest_id() {
        let store = open_store();
        let log = store.saved_states();

        let a = log.append(&SavedState::at("a", 7, json!(1)), 2).unwrap();
        let b = log.append(&SavedState::at("b", 7, json!(2)), 2).unwrap();
        let c = log.append(&SavedState::at("c", 7, json!(3)), 2).unwrap();

        assert!(log.get(a.id).unwrap().is_none());
        assert!(log.get(b.id).unwrap().is_some());
        assert!(log.get(c.id).unwrap().is_some());

        // Ties sort later appends first
        let all = log.get_all_descending().unwrap();
        assert_eq!(all[0].id, Some(c.id));
        assert_eq!(all[1].id, Some(b.id));
    }

    #[test]
    fn test_count_never_exceeds_capacity() {
        let store = open_store();
        let log = store.saved_states();

        for ts in 0..40 {
            // Non-monotonic timestamps
            let stamp = (ts * 7919) % 23;
            log.append(&SavedState::at("s", stamp, json!(ts)), 4).unwrap();
            assert!(log.count().unwrap() <= 4);
        }
    }

    #[test]
    fn test_shrinking_capacity_prunes_several() {
        let store = open_store();
        let log = store.saved_states();

        for ts in 1..=8 {
            log.append(&SavedState::at("s", ts, json!(null)), 10).unwrap();
        }
        let outcome = log.append(&SavedState::at("s", 9, json!(null)), 3).unwrap();

        assert_eq!(outcome.pruned, 6);
        assert_eq!(
            timestamps(&log.get_all_descending().unwrap()),
            vec![9, 8, 7]
        );
    }

    #[test]
    fn test_zero_capacity_empties_log() {
        let store = open_store();
        let log = store.saved_states();

        log.append(&SavedState::at("s", 1, json!(null)), 5).unwrap();
        let outcome = log.append(&SavedState::at("s", 2, json!(null)), 0).unwrap();

        assert_eq!(outcome.pruned, 2);
        assert_eq!(log.count().unwrap(), 0);
    }

    #[test]
    fn test_descending_with_duplicates() {
        let store = open_store();
        let log = store.saved_parking();

        for ts in [3, 1, 3, 2, 5, 1] {
            log.append(&SavedParking::at("p", 1, "", ts), 100).unwrap();
        }

        let got = timestamps(&log.get_all_descending().unwrap());
        assert_eq!(got, vec![5, 3, 3, 2, 1, 1]);
        assert!(got.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_same_name_entries_coexist() {
        let store = open_store();
        let log = store.saved_parking();

        log.append(&SavedParking::at("home", 2, "first", 1), 10).unwrap();
        log.append(&SavedParking::at("home", 3, "second", 2), 10).unwrap();
        log.append(&SavedParking::at("work", 1, "", 3), 10).unwrap();

        let home = log.find_by_name("home").unwrap();
        assert_eq!(home.len(), 2);
        assert_eq!(home[0].memo, "second");
        assert_eq!(home[1].memo, "first");
        assert!(log.find_by_name("gym").unwrap().is_empty());
    }

    #[test]
    fn test_parking_fields_round_trip() {
        let store = open_store();
        let log = store.saved_parking();

        let outcome = log
            .append(&SavedParking::at("lot", 12, "near exit", 42), 10)
            .unwrap();
        let stored = log.get(outcome.id).unwrap().unwrap();

        assert_eq!(stored.limit, 12);
        assert_eq!(stored.memo, "near exit");
        assert_eq!(stored.timestamp, 42);
    }

    #[test]
    fn test_failed_prune_discards_insert() {
        let store = open_store();
        let log = store.saved_states();
        log.append(&SavedState::at("kept", 1, json!(1)), 1).unwrap();

        store
            .with_conn(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER block_state_delete BEFORE DELETE ON saved_states
                     BEGIN SELECT RAISE(ABORT, 'blocked'); END;",
                )?;
                Ok(())
            })
            .unwrap();

        let err = log
            .append(&SavedState::at("dropped", 2, json!(2)), 1)
            .unwrap_err();
        assert!(matches!(err, StorageError::Database(_)));

        let remaining = log.get_all_descending().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "kept");
    }

    #[test]
    fn test_delete() {
        let store = open_store();
        let log = store.saved_states();

        let outcome = log.append(&SavedState::at("s", 1, json!(null)), 5).unwrap();
        assert!(log.delete(outcome.id).unwrap());
        assert!(!log.delete(outcome.id).unwrap());
        assert!(log.get(outcome.id).unwrap().is_none());
    }

    #[test]
    fn test_not_open() {
        let store = Store::in_memory();
        let err = store
            .saved_states()
            .append(&SavedState::at("s", 1, json!(null)), 5)
            .unwrap_err();
        assert!(matches!(err, StorageError::NotOpen));
        assert!(matches!(
            store.saved_parking().get_all_descending(),
            Err(StorageError::NotOpen)
        ));
    }

    #[test]
    fn test_concurrent_appends_respect_capacity() {
        let store = Arc::new(open_store());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let ts = worker * 100 + i;
                        let outcome = store
                            .saved_states()
                            .append(&SavedState::at("w", ts, json!(null)), 10)
                            .unwrap();
                        assert!(outcome.id > 0);
                        assert!(store.saved_states().count().unwrap() <= 10);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.saved_states().count().unwrap(), 10);
    }
}
