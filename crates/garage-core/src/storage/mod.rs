//! Storage layer
//!
//! SQLite-backed tables behind the [`Store`](crate::store::Store).
//!
//! ## Layout
//!
//! - `schema`: versioned migrations, run once per version bump on open
//! - `repository`: upsert-keyed reference tables (`families`, `cars`)
//! - `retention`: capacity-bounded history logs (`saved_states`, `saved_parking`)
//! - `error`: error taxonomy shared by all of the above

pub mod error;
pub mod repository;
pub mod retention;
pub mod schema;

pub use error::{ErrorKind, StorageError, StorageResult};
pub use repository::{KeyedRecord, Repository};
pub use retention::{AppendOutcome, LogRecord, RetentionLog};
pub use schema::{get_schema_version, needs_upgrade, upgrade, UpgradeReport, SCHEMA_VERSION};
