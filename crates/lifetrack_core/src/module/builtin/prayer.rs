//! Daily prayer tracking.

use super::{format_date, start_watch, stop_watch, DataWatch};
use crate::event::EventName;
use crate::model::domain::{PrayerEntry, PrayerSlot};
use crate::model::record::RecordKey;
use crate::module::{Module, ModuleContext, ModuleResult};
use crate::schema::StoreName;
use crate::store::GetAllOptions;
use chrono::{NaiveDate, Utc};
use serde_json::Value;

#[derive(Debug)]
pub struct PrayerModule {
    watch: DataWatch,
}

impl PrayerModule {
    pub fn new() -> Self {
        Self {
            watch: DataWatch::new(StoreName::Prayer),
        }
    }

    pub fn watch(&self) -> &DataWatch {
        &self.watch
    }

    /// Marks `slot` on `date` as performed, creating the entry if needed.
    pub fn mark_performed(
        &self,
        ctx: &ModuleContext,
        date: NaiveDate,
        slot: PrayerSlot,
    ) -> ModuleResult<RecordKey> {
        let day = format_date(date);
        let existing = self
            .entries_for(ctx, date)?
            .into_iter()
            .find(|entry| entry.vakit == slot);
        let key = match existing {
            Some(mut entry) => {
                entry.performed = true;
                ctx.store.update_typed(&entry)?
            }
            None => ctx.store.add_typed(&PrayerEntry {
                id: None,
                date: day.clone(),
                vakit: slot,
                time: None,
                performed: true,
                created_at: None,
                updated_at: None,
            })?,
        };
        ctx.bus.emit(
            EventName::PrayerPerformed,
            &[Value::from(day), Value::from(slot.as_str())],
        );
        Ok(key)
    }

    pub fn entries_for(&self, ctx: &ModuleContext, date: NaiveDate) -> ModuleResult<Vec<PrayerEntry>> {
        let options = GetAllOptions::new().index_value("date", format_date(date));
        Ok(ctx.data(StoreName::Prayer).rows(&options)?)
    }

    /// Number of distinct slots performed on `date`.
    pub fn performed_count(&self, ctx: &ModuleContext, date: NaiveDate) -> ModuleResult<usize> {
        let mut slots: Vec<PrayerSlot> = self
            .entries_for(ctx, date)?
            .into_iter()
            .filter(|entry| entry.performed)
            .map(|entry| entry.vakit)
            .collect();
        slots.sort();
        slots.dedup();
        Ok(slots.len())
    }
}

impl Default for PrayerModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for PrayerModule {
    fn render(&mut self, ctx: &ModuleContext) -> ModuleResult<String> {
        let today = Utc::now().date_naive();
        let entries = self.entries_for(ctx, today)?;
        let items: String = PrayerSlot::ALL
            .iter()
            .map(|slot| {
                let done = entries
                    .iter()
                    .any(|entry| entry.vakit == *slot && entry.performed);
                format!(
                    "<li data-vakit=\"{}\" data-done=\"{done}\"></li>",
                    slot.as_str()
                )
            })
            .collect();
        Ok(self.watch.section(&format!(
            "<h2>{}</h2><p>{} / {}</p><ul>{items}</ul>",
            format_date(today),
            self.performed_count(ctx, today)?,
            PrayerSlot::ALL.len()
        )))
    }

    fn init(&mut self, ctx: &ModuleContext) -> ModuleResult<()> {
        start_watch(&self.watch, ctx)
    }

    fn cleanup(&mut self, ctx: &ModuleContext) -> ModuleResult<()> {
        stop_watch(&self.watch, ctx)
    }
}
