//! Static object store catalog.
//!
//! # Responsibility
//! - Enumerate every store with its key path, key rules and indexes.
//! - Validate records at the store boundary before they are persisted.
//!
//! # Invariants
//! - Store names are fixed at build time; `StoreName` is a closed set.
//! - Secondary indexes are non-unique and lookup-only.

mod validate;

pub use validate::{validate_record, RecordValidationError};

use crate::model::record::RecordKey;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Schema version requested by the application at startup.
pub const DB_VERSION: u32 = 2;

/// Closed set of object stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StoreName {
    #[serde(rename = "meal")]
    Meal,
    #[serde(rename = "workout")]
    Workout,
    #[serde(rename = "prayer")]
    Prayer,
    #[serde(rename = "memorization")]
    Memorization,
    #[serde(rename = "habitChain")]
    HabitChain,
    #[serde(rename = "todo")]
    Todo,
    #[serde(rename = "routine")]
    Routine,
    #[serde(rename = "settings")]
    Settings,
    #[serde(rename = "notification")]
    Notification,
}

impl StoreName {
    pub const ALL: [StoreName; 9] = [
        StoreName::Meal,
        StoreName::Workout,
        StoreName::Prayer,
        StoreName::Memorization,
        StoreName::HabitChain,
        StoreName::Todo,
        StoreName::Routine,
        StoreName::Settings,
        StoreName::Notification,
    ];

    /// Stable persisted name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Meal => "meal",
            Self::Workout => "workout",
            Self::Prayer => "prayer",
            Self::Memorization => "memorization",
            Self::HabitChain => "habitChain",
            Self::Todo => "todo",
            Self::Routine => "routine",
            Self::Settings => "settings",
            Self::Notification => "notification",
        }
    }

    pub fn definition(self) -> &'static StoreDefinition {
        // `STORES` lists every variant in declaration order.
        &STORES[self as usize]
    }
}

impl Display for StoreName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreName {
    type Err = UnknownStoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        StoreName::ALL
            .into_iter()
            .find(|name| name.as_str() == value)
            .ok_or_else(|| UnknownStoreError(value.to_string()))
    }
}

/// Returned when a string does not name a catalog store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStoreError(pub String);

impl Display for UnknownStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown store: {}", self.0)
    }
}

impl Error for UnknownStoreError {}

/// How a store obtains primary keys for new records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGeneration {
    /// Store assigns increasing integers; a caller may still supply a key.
    Auto,
    /// Caller must supply the key.
    Supplied,
}

/// Key values a store accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Integer,
    Text,
    IntegerOrText,
}

impl KeyType {
    pub fn accepts(self, key: &RecordKey) -> bool {
        matches!(
            (self, key),
            (Self::Integer, RecordKey::Int(_))
                | (Self::Text, RecordKey::Text(_))
                | (Self::IntegerOrText, _)
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Integer => "a non-negative integer",
            Self::Text => "a non-empty string",
            Self::IntegerOrText => "a non-negative integer or a non-empty string",
        }
    }
}

/// Non-unique secondary index over one top-level record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDefinition {
    pub name: &'static str,
    pub field: &'static str,
}

/// Catalog entry for one object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreDefinition {
    pub name: StoreName,
    pub key_path: &'static str,
    pub key_generation: KeyGeneration,
    pub key_type: KeyType,
    pub indexes: &'static [IndexDefinition],
}

impl StoreDefinition {
    pub fn index(&self, name: &str) -> Option<&'static IndexDefinition> {
        self.indexes.iter().find(|index| index.name == name)
    }
}

macro_rules! idx {
    ($name:literal) => {
        IndexDefinition {
            name: $name,
            field: $name,
        }
    };
}

const fn auto(name: StoreName, indexes: &'static [IndexDefinition]) -> StoreDefinition {
    StoreDefinition {
        name,
        key_path: "id",
        key_generation: KeyGeneration::Auto,
        key_type: KeyType::Integer,
        indexes,
    }
}

/// Every store, indexed by `StoreName as usize`.
pub const STORES: &[StoreDefinition] = &[
    auto(StoreName::Meal, &[idx!("type"), idx!("createdAt")]),
    auto(StoreName::Workout, &[idx!("type"), idx!("date")]),
    auto(StoreName::Prayer, &[idx!("date"), idx!("vakit")]),
    auto(StoreName::Memorization, &[idx!("type"), idx!("nextReview")]),
    auto(StoreName::HabitChain, &[idx!("name"), idx!("date")]),
    auto(
        StoreName::Todo,
        &[idx!("date"), idx!("module"), idx!("priority"), idx!("completed")],
    ),
    // Routines carry caller-supplied UUID strings.
    StoreDefinition {
        key_type: KeyType::IntegerOrText,
        ..auto(
            StoreName::Routine,
            &[
                idx!("category"),
                idx!("frequency"),
                idx!("isActive"),
                idx!("createdAt"),
            ],
        )
    },
    StoreDefinition {
        name: StoreName::Settings,
        key_path: "key",
        key_generation: KeyGeneration::Supplied,
        key_type: KeyType::Text,
        indexes: &[],
    },
    auto(
        StoreName::Notification,
        &[idx!("scheduledTime"), idx!("module")],
    ),
];
