//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by the store.
//! - Run the schema upgrade before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections are at exactly the requested schema version.

use super::migrations::upgrade_schema;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens a SQLite database file and upgrades it to `version`.
///
/// # Side effects
/// - Creates the file when missing.
/// - Emits `db_open` logging events with duration and status.
pub fn open_connection(path: impl AsRef<Path>, version: u32) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=file version={version}");

    let conn = Connection::open(path);
    finish_open(conn, version, "file", started_at)
}

/// Opens an in-memory SQLite database and upgrades it to `version`.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_connection_in_memory(version: u32) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=memory version={version}");

    let conn = Connection::open_in_memory();
    finish_open(conn, version, "memory", started_at)
}

fn finish_open(
    conn: rusqlite::Result<Connection>,
    version: u32,
    mode: &str,
    started_at: Instant,
) -> DbResult<Connection> {
    let mut conn = match conn {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, version) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} version={} duration_ms={}",
                mode,
                version,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, version: u32) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    upgrade_schema(conn, version)?;
    Ok(())
}
