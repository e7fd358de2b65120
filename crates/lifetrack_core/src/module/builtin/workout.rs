//! Workout programs and sessions.

use super::{consecutive_days, escape, format_date, parse_date, start_watch, stop_watch, DataWatch};
use crate::event::EventName;
use crate::model::domain::{Workout, WorkoutEntryKind};
use crate::model::record::RecordKey;
use crate::module::{Module, ModuleContext, ModuleResult};
use crate::schema::StoreName;
use crate::store::GetAllOptions;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug)]
pub struct WorkoutModule {
    watch: DataWatch,
}

impl WorkoutModule {
    pub fn new() -> Self {
        Self {
            watch: DataWatch::new(StoreName::Workout),
        }
    }

    pub fn watch(&self) -> &DataWatch {
        &self.watch
    }

    pub fn add_program(&self, ctx: &ModuleContext, name: &str) -> ModuleResult<RecordKey> {
        let key = ctx.store.add_typed(&Workout {
            id: None,
            kind: WorkoutEntryKind::Program,
            name: name.to_string(),
            date: None,
            duration_minutes: None,
            completed: false,
            created_at: None,
            updated_at: None,
        })?;
        ctx.bus.emit(
            EventName::WorkoutProgramCreated,
            &[key.to_value(), Value::from(name)],
        );
        Ok(key)
    }

    /// Records a finished session and returns the updated day streak.
    pub fn complete_session(
        &self,
        ctx: &ModuleContext,
        name: &str,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> ModuleResult<u32> {
        let key = ctx.store.add_typed(&Workout {
            id: None,
            kind: WorkoutEntryKind::Session,
            name: name.to_string(),
            date: Some(format_date(date)),
            duration_minutes: Some(duration_minutes),
            completed: true,
            created_at: None,
            updated_at: None,
        })?;
        ctx.bus.emit(
            EventName::WorkoutSessionCompleted,
            &[key.to_value(), Value::from(duration_minutes)],
        );
        let streak = self.session_streak(ctx, date)?;
        ctx.bus
            .emit(EventName::WorkoutStreakUpdated, &[Value::from(streak)]);
        Ok(streak)
    }

    /// Consecutive days with at least one completed session.
    pub fn session_streak(&self, ctx: &ModuleContext, today: NaiveDate) -> ModuleResult<u32> {
        let days: BTreeSet<NaiveDate> = self
            .sessions(ctx)?
            .iter()
            .filter(|session| session.completed)
            .filter_map(|session| session.date.as_deref().and_then(parse_date))
            .collect();
        Ok(consecutive_days(&days, today))
    }

    pub fn programs(&self, ctx: &ModuleContext) -> ModuleResult<Vec<Workout>> {
        Ok(ctx
            .data(StoreName::Workout)
            .rows(&GetAllOptions::new().index_value("type", "program"))?)
    }

    fn sessions(&self, ctx: &ModuleContext) -> ModuleResult<Vec<Workout>> {
        Ok(ctx
            .data(StoreName::Workout)
            .rows(&GetAllOptions::new().index_value("type", "session"))?)
    }
}

impl Default for WorkoutModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for WorkoutModule {
    fn render(&mut self, ctx: &ModuleContext) -> ModuleResult<String> {
        let streak = self.session_streak(ctx, Utc::now().date_naive())?;
        let items: String = self
            .programs(ctx)?
            .iter()
            .map(|program| format!("<li>{}</li>", escape(&program.name)))
            .collect();
        Ok(self
            .watch
            .section(&format!("<h2>Workouts</h2><p>streak {streak}</p><ul>{items}</ul>")))
    }

    fn init(&mut self, ctx: &ModuleContext) -> ModuleResult<()> {
        start_watch(&self.watch, ctx)
    }

    fn cleanup(&mut self, ctx: &ModuleContext) -> ModuleResult<()> {
        stop_watch(&self.watch, ctx)
    }
}
