//! Event vocabulary.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Every event the application emits.
///
/// Wire strings are stable and used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventName {
    ModuleChanged,
    ModuleLoaded,
    ModuleUnloaded,

    DataSaved,
    DataLoaded,
    DataDeleted,

    ViewChanged,
    ThemeChanged,
    ModalOpened,
    ModalClosed,

    NotificationRequested,
    NotificationSent,
    NotificationClicked,

    MealPlanCreated,
    MealPlanUpdated,
    PantryItemAdded,
    PantryItemUpdated,
    PantryItemDeleted,
    RecipeCreated,
    RecipeUpdated,
    ShoppingListUpdated,

    WorkoutProgramCreated,
    WorkoutSessionStarted,
    WorkoutSessionCompleted,
    WorkoutStreakUpdated,

    PrayerSlotAdded,
    PrayerSlotUpdated,
    PrayerPerformed,

    MemorizationGoalAdded,
    MemorizationReviewCompleted,
    MemorizationProgressUpdated,

    HabitChainCreated,
    HabitChainCompleted,
    HabitChainBroken,

    TodoCreated,
    TodoUpdated,
    TodoCompleted,
    TodoDeleted,

    RoutineCreated,
    RoutineUpdated,
    RoutineDeleted,
    RoutineCompleted,

    AiRequestStarted,
    AiRequestCompleted,
    AiRequestFailed,
}

impl EventName {
    pub const ALL: [EventName; 45] = [
        EventName::ModuleChanged,
        EventName::ModuleLoaded,
        EventName::ModuleUnloaded,
        EventName::DataSaved,
        EventName::DataLoaded,
        EventName::DataDeleted,
        EventName::ViewChanged,
        EventName::ThemeChanged,
        EventName::ModalOpened,
        EventName::ModalClosed,
        EventName::NotificationRequested,
        EventName::NotificationSent,
        EventName::NotificationClicked,
        EventName::MealPlanCreated,
        EventName::MealPlanUpdated,
        EventName::PantryItemAdded,
        EventName::PantryItemUpdated,
        EventName::PantryItemDeleted,
        EventName::RecipeCreated,
        EventName::RecipeUpdated,
        EventName::ShoppingListUpdated,
        EventName::WorkoutProgramCreated,
        EventName::WorkoutSessionStarted,
        EventName::WorkoutSessionCompleted,
        EventName::WorkoutStreakUpdated,
        EventName::PrayerSlotAdded,
        EventName::PrayerSlotUpdated,
        EventName::PrayerPerformed,
        EventName::MemorizationGoalAdded,
        EventName::MemorizationReviewCompleted,
        EventName::MemorizationProgressUpdated,
        EventName::HabitChainCreated,
        EventName::HabitChainCompleted,
        EventName::HabitChainBroken,
        EventName::TodoCreated,
        EventName::TodoUpdated,
        EventName::TodoCompleted,
        EventName::TodoDeleted,
        EventName::RoutineCreated,
        EventName::RoutineUpdated,
        EventName::RoutineDeleted,
        EventName::RoutineCompleted,
        EventName::AiRequestStarted,
        EventName::AiRequestCompleted,
        EventName::AiRequestFailed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ModuleChanged => "module:changed",
            Self::ModuleLoaded => "module:loaded",
            Self::ModuleUnloaded => "module:unloaded",
            Self::DataSaved => "data:saved",
            Self::DataLoaded => "data:loaded",
            Self::DataDeleted => "data:deleted",
            Self::ViewChanged => "view:changed",
            Self::ThemeChanged => "theme:changed",
            Self::ModalOpened => "modal:opened",
            Self::ModalClosed => "modal:closed",
            Self::NotificationRequested => "notification:requested",
            Self::NotificationSent => "notification:sent",
            Self::NotificationClicked => "notification:clicked",
            Self::MealPlanCreated => "meal:plan:created",
            Self::MealPlanUpdated => "meal:plan:updated",
            Self::PantryItemAdded => "pantry:item:added",
            Self::PantryItemUpdated => "pantry:item:updated",
            Self::PantryItemDeleted => "pantry:item:deleted",
            Self::RecipeCreated => "recipe:created",
            Self::RecipeUpdated => "recipe:updated",
            Self::ShoppingListUpdated => "shopping:list:updated",
            Self::WorkoutProgramCreated => "workout:program:created",
            Self::WorkoutSessionStarted => "workout:session:started",
            Self::WorkoutSessionCompleted => "workout:session:completed",
            Self::WorkoutStreakUpdated => "workout:streak:updated",
            Self::PrayerSlotAdded => "prayer:slot:added",
            Self::PrayerSlotUpdated => "prayer:slot:updated",
            Self::PrayerPerformed => "prayer:performed",
            Self::MemorizationGoalAdded => "memorization:goal:added",
            Self::MemorizationReviewCompleted => "memorization:review:completed",
            Self::MemorizationProgressUpdated => "memorization:progress:updated",
            Self::HabitChainCreated => "habit-chain:created",
            Self::HabitChainCompleted => "habit-chain:completed",
            Self::HabitChainBroken => "habit-chain:broken",
            Self::TodoCreated => "todo:created",
            Self::TodoUpdated => "todo:updated",
            Self::TodoCompleted => "todo:completed",
            Self::TodoDeleted => "todo:deleted",
            Self::RoutineCreated => "routine:created",
            Self::RoutineUpdated => "routine:updated",
            Self::RoutineDeleted => "routine:deleted",
            Self::RoutineCompleted => "routine:completed",
            Self::AiRequestStarted => "ai:request:started",
            Self::AiRequestCompleted => "ai:request:completed",
            Self::AiRequestFailed => "ai:request:failed",
        }
    }
}

impl Display for EventName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = UnknownEventError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .into_iter()
            .find(|name| name.as_str() == value)
            .ok_or_else(|| UnknownEventError(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventError(pub String);

impl Display for UnknownEventError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown event name: {}", self.0)
    }
}

impl Error for UnknownEventError {}
