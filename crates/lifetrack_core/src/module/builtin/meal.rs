//! Meal planning: pantry, recipes, weekly plans and shopping lists.

use super::{escape, start_watch, stop_watch, DataWatch};
use crate::event::EventName;
use crate::model::domain::{Meal, MealEntryKind};
use crate::model::record::RecordKey;
use crate::module::{Module, ModuleContext, ModuleResult};
use crate::schema::StoreName;
use serde_json::Value;

const KINDS: [(MealEntryKind, &str, &str); 4] = [
    (MealEntryKind::Pantry, "pantry", "Pantry"),
    (MealEntryKind::Recipe, "recipe", "Recipes"),
    (MealEntryKind::WeeklyPlan, "weekly-plan", "Weekly plan"),
    (MealEntryKind::Shopping, "shopping", "Shopping"),
];

#[derive(Debug)]
pub struct MealModule {
    watch: DataWatch,
}

impl MealModule {
    pub fn new() -> Self {
        Self {
            watch: DataWatch::new(StoreName::Meal),
        }
    }

    pub fn watch(&self) -> &DataWatch {
        &self.watch
    }

    pub fn add_pantry_item(
        &self,
        ctx: &ModuleContext,
        name: &str,
        quantity: Option<&str>,
    ) -> ModuleResult<RecordKey> {
        self.add_entry(
            ctx,
            &Meal {
                id: None,
                kind: MealEntryKind::Pantry,
                name: name.to_string(),
                quantity: quantity.map(str::to_string),
                notes: None,
                created_at: None,
                updated_at: None,
            },
        )
    }

    /// Stores any meal entry and announces it with the event for its kind.
    pub fn add_entry(&self, ctx: &ModuleContext, entry: &Meal) -> ModuleResult<RecordKey> {
        let key = ctx.store.add_typed(entry)?;
        let event = match entry.kind {
            MealEntryKind::Pantry => EventName::PantryItemAdded,
            MealEntryKind::Recipe => EventName::RecipeCreated,
            MealEntryKind::WeeklyPlan => EventName::MealPlanCreated,
            MealEntryKind::Shopping => EventName::ShoppingListUpdated,
        };
        ctx.bus
            .emit(event, &[key.to_value(), Value::from(entry.name.as_str())]);
        Ok(key)
    }

    pub fn count_by_kind(&self, ctx: &ModuleContext, kind: MealEntryKind) -> ModuleResult<usize> {
        let tag = KINDS
            .iter()
            .find(|(candidate, _, _)| *candidate == kind)
            .map_or("pantry", |(_, tag, _)| *tag);
        Ok(ctx
            .data(StoreName::Meal)
            .search("type", &Value::from(tag))?
            .len())
    }
}

impl Default for MealModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for MealModule {
    fn render(&mut self, ctx: &ModuleContext) -> ModuleResult<String> {
        let mut items = String::new();
        for (kind, _, label) in KINDS {
            items.push_str(&format!(
                "<li>{} <strong>{}</strong></li>",
                escape(label),
                self.count_by_kind(ctx, kind)?
            ));
        }
        let suggestions = if ctx.ai_credential()?.is_some() {
            "<button data-action=\"suggest\">Suggest recipes</button>"
        } else {
            ""
        };
        Ok(self
            .watch
            .section(&format!("<h2>Meals</h2><ul>{items}</ul>{suggestions}")))
    }

    fn init(&mut self, ctx: &ModuleContext) -> ModuleResult<()> {
        start_watch(&self.watch, ctx)
    }

    fn cleanup(&mut self, ctx: &ModuleContext) -> ModuleResult<()> {
        stop_watch(&self.watch, ctx)
    }
}
