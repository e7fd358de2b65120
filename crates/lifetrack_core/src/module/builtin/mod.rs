//! Built-in feature modules.
//!
//! Every module follows the same shape: `render` summarizes its store,
//! `init` subscribes a [`DataWatch`] and announces the loaded count, and
//! `cleanup` drops every listener the module owns.

mod habit_chain;
mod meal;
mod memorization;
mod prayer;
mod routine;
mod todo;
mod workout;

pub use habit_chain::HabitChainModule;
pub use meal::MealModule;
pub use memorization::MemorizationModule;
pub use prayer::PrayerModule;
pub use routine::RoutineModule;
pub use todo::{TodoModule, TodoStats};
pub use workout::WorkoutModule;

use crate::event::{listener, EventBus, EventName};
use crate::module::{Module, ModuleContext, ModuleResult};
use crate::schema::StoreName;
use chrono::{Duration, NaiveDate};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Every built-in module, keyed by the name it registers under.
pub fn builtin_modules() -> Vec<(&'static str, Box<dyn Module>)> {
    vec![
        ("meal", boxed(MealModule::new())),
        ("workout", boxed(WorkoutModule::new())),
        ("prayer", boxed(PrayerModule::new())),
        ("memorization", boxed(MemorizationModule::new())),
        ("habitChain", boxed(HabitChainModule::new())),
        ("todo", boxed(TodoModule::new())),
        ("routine", boxed(RoutineModule::new())),
    ]
}

fn boxed(module: impl Module + 'static) -> Box<dyn Module> {
    Box::new(module)
}

/// Counts data events for one store while its module is loaded.
///
/// The count is rendered as the section's `data-revision`, so a host can
/// tell a summary rendered before a write from one rendered after it.
/// Listeners only touch a shared counter, never the module itself.
#[derive(Debug)]
pub struct DataWatch {
    owner: String,
    store: StoreName,
    changes: Arc<AtomicUsize>,
}

impl DataWatch {
    pub fn new(store: StoreName) -> Self {
        Self {
            owner: format!("module:{store}"),
            store,
            changes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Subscribes to `data:saved` and `data:deleted` for the watched store.
    pub fn attach(&self, bus: &EventBus) {
        for event in [EventName::DataSaved, EventName::DataDeleted] {
            let store = self.store;
            let changes = Arc::clone(&self.changes);
            bus.on_owned(
                event,
                &self.owner,
                listener(move |args| {
                    if args.first().and_then(Value::as_str) == Some(store.as_str()) {
                        changes.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(())
                }),
            );
        }
    }

    /// Removes every listener registered under this module's owner.
    pub fn detach(&self, bus: &EventBus) -> usize {
        bus.off_owner(&self.owner)
    }

    /// Data events observed since the watch was created.
    pub fn changes(&self) -> usize {
        self.changes.load(Ordering::SeqCst)
    }

    /// Wraps module markup in its section element.
    pub fn section(&self, body: &str) -> String {
        format!(
            "<section data-module=\"{}\" data-revision=\"{}\">{body}</section>",
            self.store,
            self.changes()
        )
    }
}

/// Shared `init` body: watch the store and announce what was loaded.
fn start_watch(watch: &DataWatch, ctx: &ModuleContext) -> ModuleResult<()> {
    watch.attach(&ctx.bus);
    let count = ctx.data(watch.store).count()?;
    ctx.bus.emit(
        EventName::DataLoaded,
        &[Value::from(watch.store.as_str()), Value::from(count)],
    );
    Ok(())
}

fn stop_watch(watch: &DataWatch, ctx: &ModuleContext) -> ModuleResult<()> {
    watch.detach(&ctx.bus);
    Ok(())
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

/// Length of the run of consecutive days ending today, or yesterday when
/// today has no entry yet.
pub(crate) fn consecutive_days(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut cursor = if days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };
    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }
    streak
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
