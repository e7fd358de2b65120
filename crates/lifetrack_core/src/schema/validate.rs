//! Boundary validation for records entering a store.

use super::{KeyGeneration, StoreName};
use crate::model::clock::parse_timestamp;
use crate::model::record::{Record, RecordKey};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));
static TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("valid time regex"));

/// Prayer slots accepted in `prayer.vakit`.
pub const PRAYER_SLOTS: &[&str] = &["imsak", "gunes", "ogle", "ikindi", "aksam", "yatsi"];

/// Record validation failure at the store boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    InvalidKey {
        store: StoreName,
        field: &'static str,
        expected: &'static str,
    },
    MissingKey {
        store: StoreName,
        field: &'static str,
    },
    MissingField {
        store: StoreName,
        field: &'static str,
    },
    InvalidField {
        store: StoreName,
        field: String,
        expected: &'static str,
    },
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKey {
                store,
                field,
                expected,
            } => write!(f, "{store}.{field} must be {expected}"),
            Self::MissingKey { store, field } => {
                write!(f, "{store}.{field} is required as the record key")
            }
            Self::MissingField { store, field } => write!(f, "{store}.{field} is required"),
            Self::InvalidField {
                store,
                field,
                expected,
            } => write!(f, "{store}.{field} must be {expected}"),
        }
    }
}

impl Error for RecordValidationError {}

type ValidationResult = Result<(), RecordValidationError>;

/// Validates `record` against the catalog rules of `store`.
///
/// # Errors
/// - Key field present but not of the store's key type, or absent where required.
/// - Indexed field holding a non-scalar value.
/// - Store-specific field rules (required names, dates, enumerations).
pub fn validate_record(store: StoreName, record: &Record) -> ValidationResult {
    let definition = store.definition();
    match record.get(definition.key_path) {
        Some(value)
            if !RecordKey::from_value(value)
                .is_some_and(|key| definition.key_type.accepts(&key)) =>
        {
            return Err(RecordValidationError::InvalidKey {
                store,
                field: definition.key_path,
                expected: definition.key_type.describe(),
            });
        }
        None if definition.key_generation == KeyGeneration::Supplied => {
            return Err(RecordValidationError::MissingKey {
                store,
                field: definition.key_path,
            });
        }
        _ => {}
    }

    for index in definition.indexes {
        match record.get(index.field) {
            None | Some(Value::Null) => {}
            Some(Value::String(_)) | Some(Value::Number(_)) | Some(Value::Bool(_)) => {}
            Some(_) => {
                return Err(invalid(store, index.field, "a string, number or boolean"));
            }
        }
    }

    let fields = FieldCheck { store, record };
    match store {
        StoreName::Todo => {
            fields.required_text("title")?;
            fields.optional_bool("completed")?;
            fields.optional_integer_in("priority", 0, 3)?;
            fields.optional_date("date")?;
        }
        StoreName::Routine => {
            fields.required_text("name")?;
            fields.required_text("category")?;
            fields.required_text("frequency")?;
            fields.optional_bool("isActive")?;
            fields.optional_time("time")?;
        }
        StoreName::HabitChain => {
            fields.required_text("name")?;
            fields.optional_date("date")?;
        }
        StoreName::Prayer => {
            fields.optional_one_of("vakit", PRAYER_SLOTS)?;
            fields.optional_date("date")?;
            fields.optional_time("time")?;
        }
        StoreName::Workout => fields.optional_date("date")?,
        StoreName::Memorization => fields.optional_timestamp("nextReview")?,
        StoreName::Notification => {
            fields.optional_timestamp("scheduledTime")?;
            fields.optional_text("module")?;
        }
        StoreName::Meal | StoreName::Settings => {}
    }
    Ok(())
}

struct FieldCheck<'a> {
    store: StoreName,
    record: &'a Record,
}

impl FieldCheck<'_> {
    fn present(&self, field: &str) -> Option<&Value> {
        self.record.get(field).filter(|value| !value.is_null())
    }

    fn required_text(&self, field: &'static str) -> ValidationResult {
        match self.present(field) {
            None => Err(RecordValidationError::MissingField {
                store: self.store,
                field,
            }),
            Some(Value::String(text)) if !text.trim().is_empty() => Ok(()),
            Some(_) => Err(invalid(self.store, field, "a non-empty string")),
        }
    }

    fn optional_text(&self, field: &'static str) -> ValidationResult {
        match self.present(field) {
            None | Some(Value::String(_)) => Ok(()),
            Some(_) => Err(invalid(self.store, field, "a string")),
        }
    }

    fn optional_bool(&self, field: &'static str) -> ValidationResult {
        match self.present(field) {
            None | Some(Value::Bool(_)) => Ok(()),
            Some(_) => Err(invalid(self.store, field, "a boolean")),
        }
    }

    fn optional_integer_in(&self, field: &'static str, min: i64, max: i64) -> ValidationResult {
        match self.present(field) {
            None => Ok(()),
            Some(value) => match value.as_i64() {
                Some(number) if (min..=max).contains(&number) => Ok(()),
                _ => Err(invalid(self.store, field, "an integer in range")),
            },
        }
    }

    fn optional_one_of(&self, field: &'static str, allowed: &[&str]) -> ValidationResult {
        match self.present(field) {
            None => Ok(()),
            Some(Value::String(text)) if allowed.contains(&text.as_str()) => Ok(()),
            Some(_) => Err(invalid(self.store, field, "a known prayer slot")),
        }
    }

    fn optional_date(&self, field: &'static str) -> ValidationResult {
        match self.present(field) {
            None => Ok(()),
            Some(Value::String(text)) if is_calendar_date(text) => Ok(()),
            Some(_) => Err(invalid(self.store, field, "a YYYY-MM-DD date")),
        }
    }

    fn optional_time(&self, field: &'static str) -> ValidationResult {
        match self.present(field) {
            None => Ok(()),
            Some(Value::String(text)) if TIME_PATTERN.is_match(text) => Ok(()),
            Some(_) => Err(invalid(self.store, field, "an HH:MM time")),
        }
    }

    fn optional_timestamp(&self, field: &'static str) -> ValidationResult {
        match self.present(field) {
            None => Ok(()),
            Some(Value::String(text)) if parse_timestamp(text).is_some() => Ok(()),
            Some(_) => Err(invalid(self.store, field, "an ISO-8601 timestamp")),
        }
    }
}

/// Returns whether `value` is a real `YYYY-MM-DD` calendar date.
pub fn is_calendar_date(value: &str) -> bool {
    DATE_PATTERN.is_match(value) && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

fn invalid(store: StoreName, field: &str, expected: &'static str) -> RecordValidationError {
    RecordValidationError::InvalidField {
        store,
        field: field.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_calendar_date, validate_record, RecordValidationError};
    use crate::model::record::Record;
    use crate::schema::StoreName;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn todo_requires_title() {
        let err = validate_record(StoreName::Todo, &record(json!({"completed": false})))
            .expect_err("missing title must fail");
        assert_eq!(
            err,
            RecordValidationError::MissingField {
                store: StoreName::Todo,
                field: "title"
            }
        );
        validate_record(StoreName::Todo, &record(json!({"title": "Buy milk"})))
            .expect("minimal todo is valid");
    }

    #[test]
    fn indexed_fields_must_be_scalar() {
        let err = validate_record(
            StoreName::Meal,
            &record(json!({"type": ["kiler"], "name": "rice"})),
        )
        .expect_err("array index value must fail");
        assert!(matches!(err, RecordValidationError::InvalidField { .. }));
    }

    #[test]
    fn settings_require_string_key() {
        let err = validate_record(StoreName::Settings, &record(json!({"value": 1})))
            .expect_err("settings key is required");
        assert!(matches!(err, RecordValidationError::MissingKey { .. }));
        let err = validate_record(StoreName::Settings, &record(json!({"key": 5, "value": 1})))
            .expect_err("integer settings key must fail");
        assert!(matches!(err, RecordValidationError::InvalidKey { .. }));
        validate_record(StoreName::Settings, &record(json!({"key": "theme", "value": "dark"})))
            .expect("named setting is valid");
    }

    #[test]
    fn rejects_invalid_keys() {
        let err = validate_record(StoreName::Todo, &record(json!({"id": true, "title": "x"})))
            .expect_err("boolean key must fail");
        assert!(matches!(err, RecordValidationError::InvalidKey { .. }));
    }

    #[test]
    fn text_keys_are_limited_to_routines() {
        let err = validate_record(StoreName::Todo, &record(json!({"id": "t-1", "title": "x"})))
            .expect_err("text todo key must fail");
        assert_eq!(err.to_string(), "todo.id must be a non-negative integer");
        validate_record(
            StoreName::Routine,
            &record(json!({
                "id": "0b7c4f0e-2d7e-4c1b-9a55-1f1e2d3c4b5a",
                "name": "Stretch",
                "category": "health",
                "frequency": "daily"
            })),
        )
        .expect("routine accepts uuid keys");
    }

    #[test]
    fn prayer_slot_and_dates_are_checked() {
        validate_record(
            StoreName::Prayer,
            &record(json!({"vakit": "ogle", "date": "2024-02-29"})),
        )
        .expect("valid prayer entry");
        assert!(validate_record(StoreName::Prayer, &record(json!({"vakit": "noon"}))).is_err());
        assert!(validate_record(StoreName::Prayer, &record(json!({"date": "2023-02-29"}))).is_err());
    }

    #[test]
    fn calendar_date_rejects_impossible_days() {
        assert!(is_calendar_date("2024-12-31"));
        assert!(!is_calendar_date("2024-13-01"));
        assert!(!is_calendar_date("24-1-1"));
    }
}
