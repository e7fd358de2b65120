//! Memorization goals with doubling review intervals.

use super::{escape, start_watch, stop_watch, DataWatch};
use crate::event::EventName;
use crate::model::clock::{format_timestamp, parse_timestamp};
use crate::model::domain::{MemorizationItem, MemorizationKind, StoreRecord};
use crate::model::record::RecordKey;
use crate::module::{Module, ModuleContext, ModuleResult};
use crate::schema::StoreName;
use crate::store::{GetAllOptions, StoreError};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

const MAX_INTERVAL_DAYS: u32 = 365;

#[derive(Debug)]
pub struct MemorizationModule {
    watch: DataWatch,
}

impl MemorizationModule {
    pub fn new() -> Self {
        Self {
            watch: DataWatch::new(StoreName::Memorization),
        }
    }

    pub fn watch(&self) -> &DataWatch {
        &self.watch
    }

    /// Adds a goal that is due for its first review immediately.
    pub fn add_goal(&self, ctx: &ModuleContext, title: &str) -> ModuleResult<RecordKey> {
        let key = ctx.store.add_typed(&MemorizationItem {
            id: None,
            kind: MemorizationKind::Goal,
            title: title.to_string(),
            interval_days: 1,
            next_review: None,
            review_count: 0,
            created_at: None,
            updated_at: None,
        })?;
        ctx.bus.emit(
            EventName::MemorizationGoalAdded,
            &[key.to_value(), Value::from(title)],
        );
        Ok(key)
    }

    /// Records one review and reschedules the item.
    ///
    /// Successful reviews double the interval (1, 2, 4 ... days); a failed
    /// review resets it to one day.
    pub fn record_review(
        &self,
        ctx: &ModuleContext,
        key: &RecordKey,
        recalled: bool,
        now: DateTime<Utc>,
    ) -> ModuleResult<MemorizationItem> {
        let mut item: MemorizationItem =
            ctx.store
                .get_typed(key)?
                .ok_or_else(|| StoreError::NotFound {
                    store: MemorizationItem::STORE,
                    key: key.clone(),
                })?;
        item.interval_days = next_interval(&item, recalled);
        item.review_count += 1;
        item.next_review = Some(format_timestamp(
            now + Duration::days(i64::from(item.interval_days)),
        ));
        ctx.store.update_typed(&item)?;

        ctx.bus.emit(
            EventName::MemorizationReviewCompleted,
            &[key.to_value(), Value::from(recalled)],
        );
        ctx.bus.emit(
            EventName::MemorizationProgressUpdated,
            &[key.to_value(), Value::from(item.review_count)],
        );
        Ok(item)
    }

    /// Goals never reviewed or scheduled at or before `now`, soonest first.
    pub fn due_items(
        &self,
        ctx: &ModuleContext,
        now: DateTime<Utc>,
    ) -> ModuleResult<Vec<MemorizationItem>> {
        let options = GetAllOptions::new()
            .index_value("type", "goal")
            .filter(move |record| {
                match record.get("nextReview").and_then(Value::as_str) {
                    None => true,
                    Some(stamp) => parse_timestamp(stamp).is_some_and(|at| at <= now),
                }
            })
            .sort_by_field("nextReview", false);
        Ok(ctx.data(StoreName::Memorization).rows(&options)?)
    }
}

fn next_interval(item: &MemorizationItem, recalled: bool) -> u32 {
    if !recalled || item.review_count == 0 {
        return 1;
    }
    item.interval_days.saturating_mul(2).clamp(1, MAX_INTERVAL_DAYS)
}

impl Default for MemorizationModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for MemorizationModule {
    fn render(&mut self, ctx: &ModuleContext) -> ModuleResult<String> {
        let due = self.due_items(ctx, Utc::now())?;
        let items: String = due
            .iter()
            .map(|item| format!("<li>{}</li>", escape(&item.title)))
            .collect();
        Ok(self.watch.section(&format!(
            "<h2>Review</h2><p>{} due</p><ul>{items}</ul>",
            due.len()
        )))
    }

    fn init(&mut self, ctx: &ModuleContext) -> ModuleResult<()> {
        start_watch(&self.watch, ctx)
    }

    fn cleanup(&mut self, ctx: &ModuleContext) -> ModuleResult<()> {
        stop_watch(&self.watch, ctx)
    }
}
