//! Typed per-store record shapes.
//!
//! Module code works with these structs; the store persists them as
//! [`Record`]s and validates the result at its boundary.

use crate::model::record::{Record, RecordKey};
use crate::schema::StoreName;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed record bound to exactly one store.
pub trait StoreRecord: Serialize + DeserializeOwned {
    const STORE: StoreName;

    fn to_record(&self) -> serde_json::Result<Record> {
        match serde_json::to_value(self)? {
            Value::Object(record) => Ok(record),
            _ => Err(serde::ser::Error::custom("store records serialize to objects")),
        }
    }

    fn from_record(record: Record) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(record))
    }
}

macro_rules! store_record {
    ($ty:ty, $store:expr) => {
        impl StoreRecord for $ty {
            const STORE: StoreName = $store;
        }
    };
}

/// Entry kinds kept in the `meal` store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MealEntryKind {
    Pantry,
    Recipe,
    WeeklyPlan,
    Shopping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: MealEntryKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutEntryKind {
    Program,
    Session,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: WorkoutEntryKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Daily prayer slot, persisted under its Turkish name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerSlot {
    Imsak,
    Gunes,
    Ogle,
    Ikindi,
    Aksam,
    Yatsi,
}

impl PrayerSlot {
    pub const ALL: [PrayerSlot; 6] = [
        PrayerSlot::Imsak,
        PrayerSlot::Gunes,
        PrayerSlot::Ogle,
        PrayerSlot::Ikindi,
        PrayerSlot::Aksam,
        PrayerSlot::Yatsi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Imsak => "imsak",
            Self::Gunes => "gunes",
            Self::Ogle => "ogle",
            Self::Ikindi => "ikindi",
            Self::Aksam => "aksam",
            Self::Yatsi => "yatsi",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayerEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub date: String,
    pub vakit: PrayerSlot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default)]
    pub performed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorizationKind {
    Goal,
    Review,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorizationItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: MemorizationKind,
    pub title: String,
    /// Days until the next review after the last successful one.
    #[serde(default = "default_interval_days")]
    pub interval_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review: Option<String>,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn default_interval_days() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitChainKind {
    Chain,
    Log,
}

/// Either a chain definition or one completed day of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitChainEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: HabitChainKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// 0 = low .. 3 = urgent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    /// Due date, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Module the task was created from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Todo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: None,
            category: None,
            priority: None,
            date: None,
            module: None,
            completed: false,
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routine {
    /// Generated integer or caller-supplied string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordKey>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    pub frequency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default)]
    pub days: Vec<String>,
    #[serde(default)]
    pub reminder: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub completed_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub module: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// ISO-8601 instant the notification is due.
    pub scheduled_time: String,
    #[serde(default)]
    pub sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

store_record!(Meal, StoreName::Meal);
store_record!(Workout, StoreName::Workout);
store_record!(PrayerEntry, StoreName::Prayer);
store_record!(MemorizationItem, StoreName::Memorization);
store_record!(HabitChainEntry, StoreName::HabitChain);
store_record!(Todo, StoreName::Todo);
store_record!(Routine, StoreName::Routine);
store_record!(Notification, StoreName::Notification);
