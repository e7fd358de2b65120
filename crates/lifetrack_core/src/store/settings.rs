//! Key/value settings on top of the `settings` store.

use super::{Store, StoreResult};
use crate::model::record::{Record, RecordKey};
use crate::schema::StoreName;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

const SETTING_VALUE_FIELD: &str = "value";

impl Store {
    /// Returns the stored value of setting `key`, or `default` on a miss.
    pub fn get_setting(&self, key: &str, default: Value) -> StoreResult<Value> {
        let stored = self.get_by_id(StoreName::Settings, &RecordKey::from(key))?;
        Ok(stored
            .and_then(|mut record| record.remove(SETTING_VALUE_FIELD))
            .unwrap_or(default))
    }

    /// Typed variant of [`Store::get_setting`].
    ///
    /// A stored value that does not decode as `T` also yields `default`.
    pub fn get_setting_as<T: DeserializeOwned>(&self, key: &str, default: T) -> StoreResult<T> {
        match self.get_setting(key, Value::Null)? {
            Value::Null => Ok(default),
            value => match serde_json::from_value(value) {
                Ok(decoded) => Ok(decoded),
                Err(err) => {
                    warn!(
                        "event=setting_decode module=store status=error key={} error={}",
                        key, err
                    );
                    Ok(default)
                }
            },
        }
    }

    /// Creates or replaces setting `key`.
    pub fn save_setting(&self, key: &str, value: impl Serialize) -> StoreResult<()> {
        let mut record = Record::new();
        record.insert("key".to_string(), Value::from(key));
        record.insert(SETTING_VALUE_FIELD.to_string(), serde_json::to_value(value)?);
        self.upsert(StoreName::Settings, record)?;
        Ok(())
    }
}
