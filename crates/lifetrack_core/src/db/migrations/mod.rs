//! Schema upgrade executor.
//!
//! # Responsibility
//! - Create the shared storage layout.
//! - Register every store and index of the catalog that the database lacks.
//!
//! # Invariants
//! - Upgrades only add stores and indexes; nothing is dropped or renamed.
//! - The whole upgrade runs in one transaction.
//! - Applied version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use crate::schema::{KeyGeneration, StoreDefinition, STORES};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

const LAYOUT_SQL: &str = include_str!("0001_layout.sql");

/// Upgrades the database to `requested` using the built-in store catalog.
pub fn upgrade_schema(conn: &mut Connection, requested: u32) -> DbResult<()> {
    upgrade_schema_with(conn, requested, STORES)
}

/// Upgrades the database to `requested` using an explicit store catalog.
///
/// Stores already present keep their records, key counters and indexes.
pub fn upgrade_schema_with(
    conn: &mut Connection,
    requested: u32,
    catalog: &[StoreDefinition],
) -> DbResult<()> {
    if requested == 0 {
        return Err(DbError::InvalidSchemaVersion(requested));
    }

    let current = current_user_version(conn)?;
    if current > requested {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            requested,
        });
    }
    if current == requested {
        return Ok(());
    }

    let tx = conn.transaction()?;
    tx.execute_batch(LAYOUT_SQL)?;
    let mut created_stores = 0_usize;
    let mut created_indexes = 0_usize;
    for definition in catalog {
        if ensure_store(&tx, definition, requested)? {
            created_stores += 1;
        }
        created_indexes += ensure_indexes(&tx, definition, requested)?;
    }
    tx.execute_batch(&format!("PRAGMA user_version = {requested};"))?;
    tx.commit()?;

    info!(
        "event=schema_upgrade module=db status=ok from_version={} to_version={} created_stores={} created_indexes={}",
        current, requested, created_stores, created_indexes
    );
    Ok(())
}

/// Returns the persisted schema version (`0` for a fresh database).
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

fn ensure_store(tx: &Transaction<'_>, definition: &StoreDefinition, version: u32) -> DbResult<bool> {
    let exists = tx
        .query_row(
            "SELECT 1 FROM object_stores WHERE name = ?1;",
            [definition.name.as_str()],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists {
        return Ok(false);
    }

    let auto_increment = match definition.key_generation {
        KeyGeneration::Auto => 1_i64,
        KeyGeneration::Supplied => 0_i64,
    };
    tx.execute(
        "INSERT INTO object_stores (name, key_path, auto_increment, created_in_version)
         VALUES (?1, ?2, ?3, ?4);",
        params![
            definition.name.as_str(),
            definition.key_path,
            auto_increment,
            version
        ],
    )?;
    Ok(true)
}

fn ensure_indexes(
    tx: &Transaction<'_>,
    definition: &StoreDefinition,
    version: u32,
) -> DbResult<usize> {
    let mut created = 0;
    for index in definition.indexes {
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO store_indexes (store, name, field, created_in_version)
             VALUES (?1, ?2, ?3, ?4);",
            params![definition.name.as_str(), index.name, index.field, version],
        )?;
        // Index and field names come from the static catalog, never from callers.
        tx.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{store}_{name}\"
             ON records (store, json_extract(body, '$.{field}'));",
            store = definition.name.as_str(),
            name = index.name,
            field = index.field,
        ))?;
        created += inserted;
    }
    Ok(created)
}
