//! SQLite storage bootstrap and schema upgrade entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections backing the object stores.
//! - Bring the persisted store catalog up to the requested schema version.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Upgrades are additive: stores and indexes are created, never dropped.
//! - No record may be read or written before the upgrade succeeds.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_connection, open_connection_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    InvalidSchemaVersion(u32),
    UnsupportedSchemaVersion {
        db_version: u32,
        requested: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::InvalidSchemaVersion(version) => {
                write!(f, "schema version must be at least 1, got {version}")
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                requested,
            } => write!(
                f,
                "database schema version {db_version} is newer than requested {requested}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::InvalidSchemaVersion(_) | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
