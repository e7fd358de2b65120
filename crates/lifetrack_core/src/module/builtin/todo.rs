//! Task list module.

use super::{escape, parse_date, start_watch, stop_watch, DataWatch};
use crate::event::EventName;
use crate::model::domain::{StoreRecord, Todo};
use crate::model::record::RecordKey;
use crate::module::{Module, ModuleContext, ModuleResult};
use crate::schema::StoreName;
use crate::store::{GetAllOptions, StoreError};
use chrono::{NaiveDate, Utc};
use serde_json::Value;

/// Task counters shown in the todo header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TodoStats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    /// Pending tasks whose due date is before today.
    pub overdue: usize,
}

#[derive(Debug)]
pub struct TodoModule {
    watch: DataWatch,
}

impl TodoModule {
    pub fn new() -> Self {
        Self {
            watch: DataWatch::new(StoreName::Todo),
        }
    }

    pub fn watch(&self) -> &DataWatch {
        &self.watch
    }

    pub fn add_todo(&self, ctx: &ModuleContext, todo: &Todo) -> ModuleResult<RecordKey> {
        let key = ctx.store.add_typed(todo)?;
        ctx.bus.emit(
            EventName::TodoCreated,
            &[key.to_value(), Value::from(todo.title.as_str())],
        );
        Ok(key)
    }

    /// Flips `completed` and returns the new value.
    pub fn toggle_todo(&self, ctx: &ModuleContext, key: &RecordKey) -> ModuleResult<bool> {
        let mut todo: Todo = ctx
            .store
            .get_typed(key)?
            .ok_or_else(|| StoreError::NotFound {
                store: Todo::STORE,
                key: key.clone(),
            })?;
        todo.completed = !todo.completed;
        ctx.store.update_typed(&todo)?;

        ctx.bus.emit(EventName::TodoUpdated, &[key.to_value()]);
        if todo.completed {
            ctx.bus.emit(EventName::TodoCompleted, &[key.to_value()]);
        }
        Ok(todo.completed)
    }

    pub fn delete_todo(&self, ctx: &ModuleContext, key: &RecordKey) -> ModuleResult<bool> {
        let removed = ctx.data(Todo::STORE).delete(key)?;
        if removed {
            ctx.bus.emit(EventName::TodoDeleted, &[key.to_value()]);
        }
        Ok(removed)
    }

    pub fn stats(&self, ctx: &ModuleContext, today: NaiveDate) -> ModuleResult<TodoStats> {
        let todos: Vec<Todo> = ctx.data(Todo::STORE).rows(&GetAllOptions::new())?;
        let mut stats = TodoStats {
            total: todos.len(),
            ..TodoStats::default()
        };
        for todo in &todos {
            if todo.completed {
                stats.completed += 1;
                continue;
            }
            stats.pending += 1;
            let due = todo.date.as_deref().and_then(parse_date);
            if due.is_some_and(|due| due < today) {
                stats.overdue += 1;
            }
        }
        Ok(stats)
    }

    /// Pending tasks, highest priority first.
    ///
    /// A task without a `completed` field counts as pending, as in `stats`.
    pub fn pending(&self, ctx: &ModuleContext) -> ModuleResult<Vec<Todo>> {
        let options = GetAllOptions::new()
            .filter(|record| record.get("completed") != Some(&Value::Bool(true)))
            .sort_by_field("priority", true);
        Ok(ctx.data(Todo::STORE).rows(&options)?)
    }
}

impl Default for TodoModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for TodoModule {
    fn render(&mut self, ctx: &ModuleContext) -> ModuleResult<String> {
        let stats = self.stats(ctx, Utc::now().date_naive())?;
        let items: String = self
            .pending(ctx)?
            .iter()
            .map(|todo| format!("<li>{}</li>", escape(&todo.title)))
            .collect();
        Ok(self.watch.section(&format!(
            "<h2>Tasks</h2><p>pending {} / completed {} / overdue {}</p><ul>{items}</ul>",
            stats.pending, stats.completed, stats.overdue
        )))
    }

    fn init(&mut self, ctx: &ModuleContext) -> ModuleResult<()> {
        start_watch(&self.watch, ctx)
    }

    fn cleanup(&mut self, ctx: &ModuleContext) -> ModuleResult<()> {
        stop_watch(&self.watch, ctx)
    }
}
