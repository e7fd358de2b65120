//! Export and import of store contents.
//!
//! Import is "append as new": records get fresh keys in the destination.
//! Settings are the exception, since their key is the setting name.

use super::{Store, StoreError, StoreResult};
use crate::model::record::Record;
use crate::schema::StoreName;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Store name to records, as produced by [`Store::export`].
pub type Backup = BTreeMap<String, Vec<Record>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    /// Entries naming no catalog store; left untouched.
    pub skipped_stores: Vec<String>,
}

impl Store {
    /// Serializes one store, or every store when `None`.
    pub fn export(&self, store: Option<StoreName>) -> StoreResult<Backup> {
        let stores = match store {
            Some(store) => vec![store],
            None => StoreName::ALL.to_vec(),
        };
        let mut backup = Backup::new();
        for store in stores {
            let records = self.get_all(store, &Default::default())?;
            backup.insert(store.as_str().to_string(), records);
        }
        info!(
            "event=store_export module=store status=ok stores={}",
            backup.len()
        );
        Ok(backup)
    }

    /// Re-adds every record of `backup`, discarding previously assigned keys.
    ///
    /// Each record is an independent write; on failure the records already
    /// imported stay in place.
    pub fn import(&self, backup: &Backup) -> StoreResult<ImportSummary> {
        let mut summary = ImportSummary::default();
        for (name, records) in backup {
            let Ok(store) = name.parse::<StoreName>() else {
                warn!(
                    "event=store_import module=store status=skipped store={} records={}",
                    name,
                    records.len()
                );
                summary.skipped_stores.push(name.clone());
                continue;
            };

            for record in records {
                let mut record = record.clone();
                if store == StoreName::Settings {
                    self.upsert(store, record)?;
                } else {
                    record.remove(store.definition().key_path);
                    self.add(store, record)?;
                }
                summary.imported += 1;
            }
        }
        info!(
            "event=store_import module=store status=ok imported={} skipped_stores={}",
            summary.imported,
            summary.skipped_stores.len()
        );
        Ok(summary)
    }

    /// [`Store::export`] rendered as pretty JSON.
    pub fn export_json(&self, store: Option<StoreName>) -> StoreResult<String> {
        let backup = self.export(store)?;
        Ok(serde_json::to_string_pretty(&backup)?)
    }

    /// Parses a JSON backup and imports it.
    pub fn import_json(&self, json: &str) -> StoreResult<ImportSummary> {
        let backup: Backup = serde_json::from_str(json)
            .map_err(|err| StoreError::InvalidData(format!("backup is not valid JSON: {err}")))?;
        self.import(&backup)
    }
}
