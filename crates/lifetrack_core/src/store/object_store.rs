//! Per-record CRUD and index queries.

use super::{GetAllOptions, Store, StoreError, StoreResult};
use crate::event::EventName;
use crate::model::record::{record_key, Record, RecordKey, CREATED_AT_FIELD, UPDATED_AT_FIELD};
use crate::schema::{validate_record, IndexDefinition, StoreName};
use log::{debug, info};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, OptionalExtension, Transaction};
use serde_json::Value;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Add,
    Update,
    Upsert,
}

impl WriteMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Upsert => "upsert",
        }
    }
}

struct StoredStamps {
    created_at: String,
    updated_at: String,
}

impl Store {
    /// Inserts a new record and returns its key.
    ///
    /// A key is generated unless the record carries one. Emits `DataSaved`.
    ///
    /// # Errors
    /// - `DuplicateKey` when a caller-supplied key is taken.
    /// - `Validation` when the record breaks the store rules.
    pub fn add(&self, store: StoreName, record: Record) -> StoreResult<RecordKey> {
        self.write(store, record, WriteMode::Add)
    }

    /// Replaces an existing record as a whole. Emits `DataSaved`.
    ///
    /// `createdAt` is kept from the stored record; `updatedAt` moves strictly
    /// forward.
    ///
    /// # Errors
    /// - `MissingKey` when the record carries no key.
    /// - `NotFound` when no record has that key.
    pub fn update(&self, store: StoreName, record: Record) -> StoreResult<RecordKey> {
        self.write(store, record, WriteMode::Update)
    }

    /// Creates or replaces a record. Emits `DataSaved`.
    pub fn upsert(&self, store: StoreName, record: Record) -> StoreResult<RecordKey> {
        self.write(store, record, WriteMode::Upsert)
    }

    /// Removes one record; returns whether it existed. Emits `DataDeleted`.
    pub fn delete(&self, store: StoreName, key: &RecordKey) -> StoreResult<bool> {
        let removed = {
            let mut inner = self.lock();
            let tx = inner.conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM records WHERE store = ?1 AND record_key = ?2;",
                params![store.as_str(), key],
            )?;
            tx.commit()?;
            removed > 0
        };

        info!(
            "event=record_delete module=store status=ok store={} key={} removed={}",
            store, key, removed
        );
        self.bus
            .emit(EventName::DataDeleted, &[Value::from(store.as_str()), key.to_value()]);
        Ok(removed)
    }

    /// Returns the record with `key`, or `None` on a miss.
    pub fn get_by_id(&self, store: StoreName, key: &RecordKey) -> StoreResult<Option<Record>> {
        let inner = self.lock();
        let body: Option<String> = inner
            .conn
            .query_row(
                "SELECT body FROM records WHERE store = ?1 AND record_key = ?2;",
                params![store.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|body| parse_body(&body)).transpose()
    }

    /// Returns records of `store` shaped by `options`.
    ///
    /// Order of application: index scan, filter, sort, limit. Without a sort
    /// the result is in ascending key order (index value first for an
    /// index scan without a value).
    pub fn get_all(&self, store: StoreName, options: &GetAllOptions) -> StoreResult<Vec<Record>> {
        let records = match options.index.as_deref() {
            Some(index) => self.scan_index(store, index, options.value.as_ref())?,
            None => self.scan_store(store)?,
        };
        Ok(options.apply(records))
    }

    /// Equality lookup through a secondary index, in ascending key order.
    ///
    /// # Errors
    /// - `UnknownIndex` when `store` declares no index named `index`.
    pub fn search(&self, store: StoreName, index: &str, value: &Value) -> StoreResult<Vec<Record>> {
        self.scan_index(store, index, Some(value))
    }

    /// Number of records in `store`.
    pub fn count(&self, store: StoreName) -> StoreResult<usize> {
        let inner = self.lock();
        let count: i64 = inner.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE store = ?1;",
            [store.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Number of records across every store.
    pub fn count_all(&self) -> StoreResult<usize> {
        let inner = self.lock();
        let count: i64 = inner
            .conn
            .query_row("SELECT COUNT(*) FROM records;", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Empties one store, or every store when `None`.
    ///
    /// Key generators keep their position, so cleared keys are not reissued.
    pub fn clear(&self, store: Option<StoreName>) -> StoreResult<usize> {
        let removed = {
            let mut inner = self.lock();
            let tx = inner.conn.transaction()?;
            let removed = match store {
                Some(store) => tx.execute("DELETE FROM records WHERE store = ?1;", [store.as_str()])?,
                None => tx.execute("DELETE FROM records;", [])?,
            };
            tx.commit()?;
            removed
        };
        info!(
            "event=store_clear module=store status=ok store={} removed={}",
            store.map_or("all", StoreName::as_str),
            removed
        );
        Ok(removed)
    }

    fn write(&self, store: StoreName, mut record: Record, mode: WriteMode) -> StoreResult<RecordKey> {
        let started_at = Instant::now();
        validate_record(store, &record)?;
        let key_path = store.definition().key_path;
        let supplied = record_key(&record, key_path);
        if supplied.is_none() && mode == WriteMode::Update {
            return Err(StoreError::MissingKey(store));
        }

        let key = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let tx = inner.conn.transaction()?;
            require_store(&tx, store)?;

            let key = match supplied {
                Some(key) => key,
                None => next_generated_key(&tx, store)?,
            };
            let existing = fetch_stamps(&tx, store, &key)?;
            let (created_at, updated_at, replace) = match (mode, existing) {
                (WriteMode::Add, Some(_)) => return Err(StoreError::DuplicateKey { store, key }),
                (WriteMode::Update, None) => return Err(StoreError::NotFound { store, key }),
                (_, Some(stamps)) => {
                    let updated_at = inner.clock.next_after(Some(&stamps.updated_at));
                    (stamps.created_at, updated_at, true)
                }
                (_, None) => {
                    let now = inner.clock.next();
                    (now.clone(), now, false)
                }
            };

            record.insert(key_path.to_string(), key.to_value());
            record.insert(CREATED_AT_FIELD.to_string(), Value::from(created_at.as_str()));
            record.insert(UPDATED_AT_FIELD.to_string(), Value::from(updated_at.as_str()));
            let body = serde_json::to_string(&record)?;

            if replace {
                tx.execute(
                    "UPDATE records SET body = ?3, updated_at = ?4
                     WHERE store = ?1 AND record_key = ?2;",
                    params![store.as_str(), &key, body, updated_at],
                )?;
            } else {
                if let Some(value) = key.as_int() {
                    tx.execute(
                        "UPDATE object_stores SET key_counter = MAX(key_counter, ?2) WHERE name = ?1;",
                        params![store.as_str(), value],
                    )?;
                }
                tx.execute(
                    "INSERT INTO records (store, record_key, body, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5);",
                    params![store.as_str(), &key, body, created_at, updated_at],
                )?;
            }
            tx.commit()?;
            key
        };

        info!(
            "event=record_write module=store status=ok op={} store={} key={} duration_ms={}",
            mode.as_str(),
            store,
            key,
            started_at.elapsed().as_millis()
        );
        self.bus.emit(
            EventName::DataSaved,
            &[Value::from(store.as_str()), Value::Object(record)],
        );
        Ok(key)
    }

    fn scan_store(&self, store: StoreName) -> StoreResult<Vec<Record>> {
        let inner = self.lock();
        let mut stmt = inner
            .conn
            .prepare("SELECT body FROM records WHERE store = ?1 ORDER BY record_key;")?;
        let bodies = stmt
            .query_map([store.as_str()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        bodies.iter().map(|body| parse_body(body)).collect()
    }

    fn scan_index(
        &self,
        store: StoreName,
        index: &str,
        value: Option<&Value>,
    ) -> StoreResult<Vec<Record>> {
        let definition: &IndexDefinition =
            store
                .definition()
                .index(index)
                .ok_or_else(|| StoreError::UnknownIndex {
                    store,
                    index: index.to_string(),
                })?;
        // Field names come from the static catalog, matching the index expression.
        let extract = format!("json_extract(body, '$.{}')", definition.field);

        let (sql, bound) = match value {
            Some(value) => {
                let bound = index_value_to_sql(value).ok_or_else(|| {
                    StoreError::InvalidIndexValue {
                        store,
                        index: index.to_string(),
                    }
                })?;
                (
                    format!(
                        "SELECT body FROM records WHERE store = ?1 AND {extract} = ?2 ORDER BY record_key;"
                    ),
                    Some(bound),
                )
            }
            None => (
                format!(
                    "SELECT body FROM records WHERE store = ?1 AND {extract} IS NOT NULL
                     ORDER BY {extract}, record_key;"
                ),
                None,
            ),
        };

        let inner = self.lock();
        let mut stmt = inner.conn.prepare(&sql)?;
        let bodies = match bound {
            Some(bound) => stmt
                .query_map(params![store.as_str(), bound], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([store.as_str()], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?,
        };
        debug!(
            "event=index_scan module=store status=ok store={} index={} hits={}",
            store,
            index,
            bodies.len()
        );
        bodies.iter().map(|body| parse_body(body)).collect()
    }
}

fn require_store(tx: &Transaction<'_>, store: StoreName) -> StoreResult<()> {
    let present = tx
        .query_row(
            "SELECT 1 FROM object_stores WHERE name = ?1;",
            [store.as_str()],
            |_| Ok(()),
        )
        .optional()?;
    present.ok_or(StoreError::StoreMissing(store))
}

fn next_generated_key(tx: &Transaction<'_>, store: StoreName) -> StoreResult<RecordKey> {
    let next: Option<i64> = tx
        .query_row(
            "UPDATE object_stores SET key_counter = key_counter + 1
             WHERE name = ?1 AND auto_increment = 1
             RETURNING key_counter;",
            [store.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    next.map(RecordKey::Int)
        .ok_or(StoreError::MissingKey(store))
}

fn fetch_stamps(
    tx: &Transaction<'_>,
    store: StoreName,
    key: &RecordKey,
) -> StoreResult<Option<StoredStamps>> {
    let stamps = tx
        .query_row(
            "SELECT created_at, updated_at FROM records WHERE store = ?1 AND record_key = ?2;",
            params![store.as_str(), key],
            |row| {
                Ok(StoredStamps {
                    created_at: row.get(0)?,
                    updated_at: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(stamps)
}

fn parse_body(body: &str) -> StoreResult<Record> {
    match serde_json::from_str::<Value>(body)? {
        Value::Object(record) => Ok(record),
        _ => Err(StoreError::InvalidData(
            "persisted record body is not a JSON object".to_string(),
        )),
    }
}

/// Maps an index lookup value to what `json_extract` yields for it.
fn index_value_to_sql(value: &Value) -> Option<SqlValue> {
    match value {
        Value::Bool(flag) => Some(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => Some(SqlValue::Integer(integer)),
            None => number.as_f64().map(SqlValue::Real),
        },
        Value::String(text) => Some(SqlValue::Text(text.clone())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
