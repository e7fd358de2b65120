//! Opaque record and primary key types.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// One persisted item: a JSON object of named fields.
///
/// Fields other than the key, the timestamps and indexed fields are owned by
/// the calling module and opaque to the store.
pub type Record = Map<String, Value>;

/// Field stamped once when a record is first stored.
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Field refreshed on every write.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Primary key of a record.
///
/// Generated keys are integers; caller-supplied keys may be integers or
/// non-empty strings. Integers order before strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    Int(i64),
    Text(String),
}

impl RecordKey {
    /// Reads a key from a JSON value, rejecting non-key shapes.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_i64().filter(|n| *n >= 0).map(Self::Int),
            Value::String(text) if !text.is_empty() => Some(Self::Text(text.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(value) => Value::from(*value),
            Self::Text(value) => Value::String(value.clone()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl ToSql for RecordKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Int(value) => Ok(ToSqlOutput::from(*value)),
            Self::Text(value) => Ok(ToSqlOutput::from(value.as_str())),
        }
    }
}

impl FromSql for RecordKey {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(value) => Ok(Self::Int(value)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|text| Self::Text(text.to_string()))
                .map_err(|err| FromSqlError::Other(Box::new(err))),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// Reads the key stored under `key_path`, if any.
pub fn record_key(record: &Record, key_path: &str) -> Option<RecordKey> {
    record.get(key_path).and_then(RecordKey::from_value)
}

#[cfg(test)]
mod tests {
    use super::{record_key, RecordKey};
    use serde_json::json;

    #[test]
    fn reads_integer_and_text_keys() {
        let record = json!({"id": 7}).as_object().cloned().unwrap();
        assert_eq!(record_key(&record, "id"), Some(RecordKey::Int(7)));

        let record = json!({"id": "r-1"}).as_object().cloned().unwrap();
        assert_eq!(record_key(&record, "id"), Some(RecordKey::Text("r-1".into())));
    }

    #[test]
    fn rejects_non_key_values() {
        for value in [json!(null), json!(true), json!(-1), json!(1.5), json!(""), json!([1])] {
            assert_eq!(RecordKey::from_value(&value), None, "value {value}");
        }
    }

    #[test]
    fn integers_order_before_text() {
        assert!(RecordKey::Int(999) < RecordKey::Text("0".into()));
    }
}
