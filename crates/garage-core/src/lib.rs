//! Garage Core Library
//!
//! This crate provides the storage engine for Garage, a local, versioned
//! store for a single-device application.
//!
//! # Architecture
//!
//! - **SQLite**: one connection, owned by [`Store`]
//! - **Reference tables**: `families` and `cars`, keyed by a natural identifier
//! - **History logs**: `saved_states` and `saved_parking`, capped at a capacity
//!   with the oldest entries evicted on append
//!
//! # Quick Start
//!
//! ```text
//! let store = Store::new(Config::load()?);
//! store.open(&Seed::empty())?;
//!
//! store.cars().put(&Car::new("car-1"))?;
//! store.append_saved_parking(&SavedParking::new("home", 4, "level 2"))?;
//!
//! let recent = store.saved_parking().get_all_descending()?;
//! ```
//!
//! # Modules
//!
//! - `store`: Connection manager and main entry point
//! - `models`: Records kept in the store
//! - `storage`: Schema migrations, repositories, retention logs and errors
//! - `config`: Application configuration

pub mod config;
pub mod models;
pub mod storage;
pub mod store;

pub use config::Config;
pub use models::{Car, Family, SavedParking, SavedState, Seed};
pub use storage::{
    AppendOutcome, ErrorKind, KeyedRecord, LogRecord, Repository, RetentionLog, StorageError,
    StorageResult, UpgradeReport, SCHEMA_VERSION,
};
pub use store::{Store, StoreStats};
