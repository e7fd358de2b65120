//! Object store facade over SQLite.
//!
//! # Responsibility
//! - Provide create/read/update/delete/query over the catalog stores.
//! - Stamp timestamps and keys, and announce writes on the event bus.
//!
//! # Invariants
//! - Every call runs in its own transaction; nothing spans calls.
//! - Events fire after commit, with the connection lock released.
//! - Generated keys are never reused within a store.

mod backup;
mod object_store;
mod query;
mod settings;
mod typed;

pub use backup::{Backup, ImportSummary};
pub use query::{GetAllOptions, RecordComparator, RecordFilter};

use crate::db::{open_connection, open_connection_in_memory, DbError};
use crate::event::EventBus;
use crate::model::clock::IsoClock;
use crate::model::record::RecordKey;
use crate::schema::{RecordValidationError, StoreName};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level error for persistence and query operations.
#[derive(Debug)]
pub enum StoreError {
    /// The storage engine could not be opened or upgraded. Fatal at startup.
    StorageUnavailable(DbError),
    /// The opened schema does not contain this store.
    StoreMissing(StoreName),
    DuplicateKey {
        store: StoreName,
        key: RecordKey,
    },
    NotFound {
        store: StoreName,
        key: RecordKey,
    },
    MissingKey(StoreName),
    UnknownIndex {
        store: StoreName,
        index: String,
    },
    InvalidIndexValue {
        store: StoreName,
        index: String,
    },
    Validation(RecordValidationError),
    InvalidData(String),
    StorageOperationFailed(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageUnavailable(err) => write!(f, "storage unavailable: {err}"),
            Self::StoreMissing(store) => write!(f, "store `{store}` is not in the opened schema"),
            Self::DuplicateKey { store, key } => {
                write!(f, "key {key} already exists in store `{store}`")
            }
            Self::NotFound { store, key } => write!(f, "record {key} not found in store `{store}`"),
            Self::MissingKey(store) => write!(f, "record for store `{store}` carries no key"),
            Self::UnknownIndex { store, index } => {
                write!(f, "store `{store}` has no index `{index}`")
            }
            Self::InvalidIndexValue { store, index } => write!(
                f,
                "value for index `{index}` of store `{store}` must be a string, number or boolean"
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid record data: {message}"),
            Self::StorageOperationFailed(err) => write!(f, "storage operation failed: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageUnavailable(err) | Self::StorageOperationFailed(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RecordValidationError> for StoreError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::StorageOperationFailed(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidData(value.to_string())
    }
}

struct StoreInner {
    conn: Connection,
    clock: IsoClock,
}

/// Durable record collections shared by every module.
///
/// Open once at startup and share as `Arc<Store>`.
pub struct Store {
    inner: Mutex<StoreInner>,
    bus: Arc<EventBus>,
    version: u32,
}

/// Opens (or creates) the database at `path` at schema `version`.
///
/// # Errors
/// - `StoreError::StorageUnavailable` when the file cannot be opened, the
///   upgrade fails, or the file was written by a newer schema.
pub fn open_store(
    path: impl AsRef<Path>,
    version: u32,
    bus: Arc<EventBus>,
) -> StoreResult<Store> {
    let conn = open_connection(path, version).map_err(StoreError::StorageUnavailable)?;
    Ok(Store::from_connection(conn, version, bus))
}

/// Opens a fresh in-memory store at schema `version`.
pub fn open_store_in_memory(version: u32, bus: Arc<EventBus>) -> StoreResult<Store> {
    let conn = open_connection_in_memory(version).map_err(StoreError::StorageUnavailable)?;
    Ok(Store::from_connection(conn, version, bus))
}

impl Store {
    /// Wraps an already upgraded connection.
    pub fn from_connection(conn: Connection, version: u32, bus: Arc<EventBus>) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                conn,
                clock: IsoClock::new(),
            }),
            bus,
            version,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // A panic mid-transaction drops the transaction, which rolls it back.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
