//! Habit chain module: one log entry per completed day.

use super::{consecutive_days, escape, format_date, parse_date, start_watch, stop_watch, DataWatch};
use crate::event::EventName;
use crate::model::domain::{HabitChainEntry, HabitChainKind};
use crate::model::record::RecordKey;
use crate::module::{Module, ModuleContext, ModuleResult};
use crate::schema::StoreName;
use crate::store::GetAllOptions;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug)]
pub struct HabitChainModule {
    watch: DataWatch,
}

impl HabitChainModule {
    pub fn new() -> Self {
        Self {
            watch: DataWatch::new(StoreName::HabitChain),
        }
    }

    pub fn watch(&self) -> &DataWatch {
        &self.watch
    }

    pub fn create_chain(
        &self,
        ctx: &ModuleContext,
        name: &str,
        target_days: Option<u32>,
    ) -> ModuleResult<RecordKey> {
        let key = ctx.store.add_typed(&HabitChainEntry {
            id: None,
            kind: HabitChainKind::Chain,
            name: name.to_string(),
            date: None,
            target_days,
            created_at: None,
            updated_at: None,
        })?;
        ctx.bus
            .emit(EventName::HabitChainCreated, &[key.to_value(), Value::from(name)]);
        Ok(key)
    }

    /// Logs `date` for chain `name`. Returns `false` if it was already logged.
    pub fn complete_today(
        &self,
        ctx: &ModuleContext,
        name: &str,
        date: NaiveDate,
    ) -> ModuleResult<bool> {
        let day = format_date(date);
        if self.logged_days(ctx, name)?.contains(&date) {
            return Ok(false);
        }
        ctx.store.add_typed(&HabitChainEntry {
            id: None,
            kind: HabitChainKind::Log,
            name: name.to_string(),
            date: Some(day.clone()),
            target_days: None,
            created_at: None,
            updated_at: None,
        })?;
        let streak = self.current_streak(ctx, name, date)?;
        ctx.bus.emit(
            EventName::HabitChainCompleted,
            &[Value::from(name), Value::from(day), Value::from(streak)],
        );
        Ok(true)
    }

    /// Consecutive logged days ending at `today` (or yesterday).
    pub fn current_streak(
        &self,
        ctx: &ModuleContext,
        name: &str,
        today: NaiveDate,
    ) -> ModuleResult<u32> {
        Ok(consecutive_days(&self.logged_days(ctx, name)?, today))
    }

    pub fn chains(&self, ctx: &ModuleContext) -> ModuleResult<Vec<HabitChainEntry>> {
        let entries: Vec<HabitChainEntry> = ctx
            .data(StoreName::HabitChain)
            .rows(&GetAllOptions::new())?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.kind == HabitChainKind::Chain)
            .collect())
    }

    fn logged_days(&self, ctx: &ModuleContext, name: &str) -> ModuleResult<BTreeSet<NaiveDate>> {
        let entries: Vec<HabitChainEntry> = ctx
            .data(StoreName::HabitChain)
            .rows(&GetAllOptions::new().index_value("name", name))?;
        Ok(entries
            .iter()
            .filter(|entry| entry.kind == HabitChainKind::Log)
            .filter_map(|entry| entry.date.as_deref().and_then(parse_date))
            .collect())
    }
}

impl Default for HabitChainModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for HabitChainModule {
    fn render(&mut self, ctx: &ModuleContext) -> ModuleResult<String> {
        let today = Utc::now().date_naive();
        let mut items = String::new();
        for chain in self.chains(ctx)? {
            let streak = self.current_streak(ctx, &chain.name, today)?;
            let target = chain
                .target_days
                .map(|days| format!(" / {days}"))
                .unwrap_or_default();
            items.push_str(&format!(
                "<li>{} <strong>{streak}{target}</strong></li>",
                escape(&chain.name)
            ));
        }
        Ok(self.watch.section(&format!("<h2>Chains</h2><ul>{items}</ul>")))
    }

    fn init(&mut self, ctx: &ModuleContext) -> ModuleResult<()> {
        start_watch(&self.watch, ctx)
    }

    fn cleanup(&mut self, ctx: &ModuleContext) -> ModuleResult<()> {
        stop_watch(&self.watch, ctx)
    }
}
