//! Recurring routines module.

use super::{escape, format_date, parse_date, start_watch, stop_watch, DataWatch};
use crate::event::EventName;
use crate::model::domain::{Routine, StoreRecord};
use crate::model::record::RecordKey;
use crate::module::{Module, ModuleContext, ModuleResult};
use crate::schema::StoreName;
use crate::store::{GetAllOptions, StoreError};
use chrono::{Duration, NaiveDate};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug)]
pub struct RoutineModule {
    watch: DataWatch,
}

impl RoutineModule {
    pub fn new() -> Self {
        Self {
            watch: DataWatch::new(StoreName::Routine),
        }
    }

    pub fn watch(&self) -> &DataWatch {
        &self.watch
    }

    /// Adds `routine`, assigning a fresh UUID string id when it has none.
    pub fn create_routine(
        &self,
        ctx: &ModuleContext,
        mut routine: Routine,
    ) -> ModuleResult<RecordKey> {
        if routine.id.is_none() {
            routine.id = Some(RecordKey::Text(Uuid::new_v4().to_string()));
        }
        let key = ctx.store.add_typed(&routine)?;
        ctx.bus.emit(
            EventName::RoutineCreated,
            &[key.to_value(), Value::from(routine.name.as_str())],
        );
        Ok(key)
    }

    pub fn set_active(
        &self,
        ctx: &ModuleContext,
        key: &RecordKey,
        active: bool,
    ) -> ModuleResult<Routine> {
        let mut routine = load(ctx, key)?;
        routine.is_active = active;
        ctx.store.update_typed(&routine)?;
        ctx.bus.emit(
            EventName::RoutineUpdated,
            &[key.to_value(), Value::from(active)],
        );
        Ok(routine)
    }

    /// Records a completion on `date`. Completing on consecutive days extends
    /// the streak; a second completion on the same day is ignored.
    pub fn complete_routine(
        &self,
        ctx: &ModuleContext,
        key: &RecordKey,
        date: NaiveDate,
    ) -> ModuleResult<Routine> {
        let mut routine = load(ctx, key)?;
        let day = format_date(date);
        if routine.last_completed.as_deref() == Some(day.as_str()) {
            return Ok(routine);
        }
        let previous = routine.last_completed.as_deref().and_then(parse_date);
        routine.streak = match previous {
            Some(previous) if previous + Duration::days(1) == date => routine.streak + 1,
            _ => 1,
        };
        routine.completed_count += 1;
        routine.last_completed = Some(day.clone());
        ctx.store.update_typed(&routine)?;

        ctx.bus.emit(
            EventName::RoutineCompleted,
            &[key.to_value(), Value::from(day), Value::from(routine.streak)],
        );
        Ok(routine)
    }

    pub fn delete_routine(&self, ctx: &ModuleContext, key: &RecordKey) -> ModuleResult<bool> {
        let removed = ctx.data(Routine::STORE).delete(key)?;
        if removed {
            ctx.bus.emit(EventName::RoutineDeleted, &[key.to_value()]);
        }
        Ok(removed)
    }

    /// Active routines by time of day. A routine without `isActive` is active.
    pub fn active_routines(&self, ctx: &ModuleContext) -> ModuleResult<Vec<Routine>> {
        let options = GetAllOptions::new()
            .filter(|record| record.get("isActive") != Some(&Value::Bool(false)))
            .sort_by_field("time", false);
        Ok(ctx.data(Routine::STORE).rows(&options)?)
    }
}

fn load(ctx: &ModuleContext, key: &RecordKey) -> ModuleResult<Routine> {
    let routine: Routine = ctx.store.get_typed(key)?.ok_or_else(|| StoreError::NotFound {
        store: Routine::STORE,
        key: key.clone(),
    })?;
    Ok(routine)
}

impl Default for RoutineModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for RoutineModule {
    fn render(&mut self, ctx: &ModuleContext) -> ModuleResult<String> {
        let items: String = self
            .active_routines(ctx)?
            .iter()
            .map(|routine| {
                format!(
                    "<li data-category=\"{}\">{} <small>{}</small></li>",
                    escape(&routine.category),
                    escape(&routine.name),
                    escape(&routine.frequency)
                )
            })
            .collect();
        Ok(self.watch.section(&format!("<h2>Routines</h2><ul>{items}</ul>")))
    }

    fn init(&mut self, ctx: &ModuleContext) -> ModuleResult<()> {
        start_watch(&self.watch, ctx)
    }

    fn cleanup(&mut self, ctx: &ModuleContext) -> ModuleResult<()> {
        stop_watch(&self.watch, ctx)
    }
}
