//! Synchronous event dispatcher.

use super::EventName;
use log::{debug, error};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Failure reported by a listener; logged by the bus, never propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerError(String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl Display for ListenerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for ListenerError {}

pub type ListenerResult = Result<(), ListenerError>;

/// Event callback. Identity (for `off`) is the `Arc` allocation.
pub type Listener = Arc<dyn Fn(&[Value]) -> ListenerResult + Send + Sync>;

/// Wraps a closure into a [`Listener`].
pub fn listener<F>(callback: F) -> Listener
where
    F: Fn(&[Value]) -> ListenerResult + Send + Sync + 'static,
{
    Arc::new(callback)
}

#[derive(Clone)]
struct Subscription {
    id: u64,
    listener: Listener,
    owner: Option<String>,
    once: bool,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    subscriptions: BTreeMap<EventName, Vec<Subscription>>,
}

/// Process-wide publish/subscribe register.
///
/// The internal lock is released before any listener runs, so listeners may
/// emit, subscribe or unsubscribe re-entrantly.
#[derive(Default)]
pub struct EventBus {
    state: Mutex<BusState>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a persistent listener. Duplicate registrations are kept.
    pub fn on(&self, event: EventName, listener: Listener) {
        self.subscribe(event, listener, None, false);
    }

    /// Registers a persistent listener bound to `owner`.
    ///
    /// All listeners of one owner can be dropped with [`EventBus::off_owner`].
    pub fn on_owned(&self, event: EventName, owner: &str, listener: Listener) {
        self.subscribe(event, listener, Some(owner.to_string()), false);
    }

    /// Registers a listener removed after its first delivery.
    pub fn once(&self, event: EventName, listener: Listener) {
        self.subscribe(event, listener, None, true);
    }

    pub fn once_owned(&self, event: EventName, owner: &str, listener: Listener) {
        self.subscribe(event, listener, Some(owner.to_string()), true);
    }

    /// Delivers `args` to every listener of `event`.
    ///
    /// Regular listeners run first, then one-shot listeners, each group in
    /// registration order. Returns how many listeners were invoked.
    pub fn emit(&self, event: EventName, args: &[Value]) -> usize {
        let (regular, once): (Vec<Subscription>, Vec<Subscription>) = {
            let state = self.lock();
            match state.subscriptions.get(&event) {
                Some(subscriptions) => subscriptions.iter().cloned().partition(|sub| !sub.once),
                None => return 0,
            }
        };

        if !once.is_empty() {
            // Drop fired one-shots up front so a re-entrant emit cannot fire them again.
            let mut state = self.lock();
            if let Some(subscriptions) = state.subscriptions.get_mut(&event) {
                subscriptions.retain(|sub| !once.iter().any(|fired| fired.id == sub.id));
                if subscriptions.is_empty() {
                    state.subscriptions.remove(&event);
                }
            }
        }

        debug!(
            "event=bus_emit module=event status=start name={} regular={} once={}",
            event,
            regular.len(),
            once.len()
        );
        let mut delivered = 0;
        for subscription in regular.iter().chain(once.iter()) {
            deliver(event, subscription, args);
            delivered += 1;
        }
        delivered
    }

    /// Removes every listener of `event` sharing the identity of `listener`.
    ///
    /// Returns the number of removed registrations.
    pub fn off(&self, event: EventName, listener: &Listener) -> usize {
        let mut state = self.lock();
        let Some(subscriptions) = state.subscriptions.get_mut(&event) else {
            return 0;
        };
        let before = subscriptions.len();
        subscriptions.retain(|sub| !Arc::ptr_eq(&sub.listener, listener));
        let removed = before - subscriptions.len();
        if subscriptions.is_empty() {
            state.subscriptions.remove(&event);
        }
        removed
    }

    /// Removes every listener registered with `owner`, across all events.
    pub fn off_owner(&self, owner: &str) -> usize {
        let mut state = self.lock();
        let mut removed = 0;
        state.subscriptions.retain(|_, subscriptions| {
            let before = subscriptions.len();
            subscriptions.retain(|sub| sub.owner.as_deref() != Some(owner));
            removed += before - subscriptions.len();
            !subscriptions.is_empty()
        });
        removed
    }

    /// Clears listeners of one event, or of every event when `None`.
    pub fn remove_all_listeners(&self, event: Option<EventName>) {
        let mut state = self.lock();
        match event {
            Some(event) => {
                state.subscriptions.remove(&event);
            }
            None => state.subscriptions.clear(),
        }
    }

    pub fn listener_count(&self, event: EventName) -> usize {
        self.lock()
            .subscriptions
            .get(&event)
            .map_or(0, |subscriptions| subscriptions.len())
    }

    /// Events that currently have at least one listener.
    pub fn event_names(&self) -> Vec<EventName> {
        self.lock().subscriptions.keys().copied().collect()
    }

    fn subscribe(&self, event: EventName, listener: Listener, owner: Option<String>, once: bool) {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state
            .subscriptions
            .entry(event)
            .or_default()
            .push(Subscription {
                id,
                listener,
                owner,
                once,
            });
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        // Listeners never run under this lock, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn deliver(event: EventName, subscription: &Subscription, args: &[Value]) {
    let owner = subscription.owner.as_deref().unwrap_or("-");
    match catch_unwind(AssertUnwindSafe(|| (subscription.listener)(args))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(
            "event=listener_failed module=event status=error name={} owner={} error={}",
            event, owner, err
        ),
        Err(_) => error!(
            "event=listener_panicked module=event status=error name={} owner={}",
            event, owner
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{listener, EventBus, Listener, ListenerError};
    use crate::event::EventName;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &str) -> Listener {
        let log = Arc::clone(log);
        let label = label.to_string();
        listener(move |_args| {
            log.lock().unwrap().push(label.clone());
            Ok(())
        })
    }

    #[test]
    fn regular_listeners_run_before_once_listeners() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on(EventName::DataSaved, recorder(&log, "L1"));
        bus.once(EventName::DataSaved, recorder(&log, "L2"));
        bus.on(EventName::DataSaved, recorder(&log, "L3"));

        assert_eq!(bus.emit(EventName::DataSaved, &[]), 3);
        assert_eq!(*log.lock().unwrap(), vec!["L1", "L3", "L2"]);

        log.lock().unwrap().clear();
        assert_eq!(bus.emit(EventName::DataSaved, &[]), 2);
        assert_eq!(*log.lock().unwrap(), vec!["L1", "L3"]);
    }

    #[test]
    fn failing_and_panicking_listeners_do_not_stop_delivery() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on(
            EventName::TodoCreated,
            listener(|_args| Err(ListenerError::new("boom"))),
        );
        bus.on(
            EventName::TodoCreated,
            listener(|_args| panic!("listener panic")),
        );
        bus.on(EventName::TodoCreated, recorder(&log, "after"));

        assert_eq!(bus.emit(EventName::TodoCreated, &[json!(1)]), 3);
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn arguments_are_passed_through() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.on(
            EventName::DataDeleted,
            listener(move |args| {
                sink.lock().unwrap().extend_from_slice(args);
                Ok(())
            }),
        );
        bus.emit(EventName::DataDeleted, &[json!("todo"), json!(4)]);
        assert_eq!(*seen.lock().unwrap(), vec![json!("todo"), json!(4)]);
    }

    #[test]
    fn off_removes_every_registration_of_the_same_listener() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let shared = recorder(&log, "shared");
        bus.on(EventName::ThemeChanged, Arc::clone(&shared));
        bus.on(EventName::ThemeChanged, Arc::clone(&shared));
        bus.on(EventName::ThemeChanged, recorder(&log, "other"));

        assert_eq!(bus.off(EventName::ThemeChanged, &shared), 2);
        bus.emit(EventName::ThemeChanged, &[]);
        assert_eq!(*log.lock().unwrap(), vec!["other"]);
    }

    #[test]
    fn off_owner_removes_bound_listeners_only() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on_owned(EventName::DataSaved, "todo", recorder(&log, "todo-saved"));
        bus.once_owned(EventName::DataDeleted, "todo", recorder(&log, "todo-deleted"));
        bus.on(EventName::DataSaved, recorder(&log, "global"));

        assert_eq!(bus.off_owner("todo"), 2);
        assert_eq!(bus.event_names(), vec![EventName::DataSaved]);
        bus.emit(EventName::DataSaved, &[]);
        assert_eq!(*log.lock().unwrap(), vec!["global"]);
    }

    #[test]
    fn remove_all_listeners_clears_one_or_all_events() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on(EventName::ViewChanged, recorder(&log, "view"));
        bus.on(EventName::ModalOpened, recorder(&log, "modal"));

        bus.remove_all_listeners(Some(EventName::ViewChanged));
        assert_eq!(bus.listener_count(EventName::ViewChanged), 0);
        assert_eq!(bus.listener_count(EventName::ModalOpened), 1);

        bus.remove_all_listeners(None);
        assert!(bus.event_names().is_empty());
    }

    #[test]
    fn listeners_may_emit_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner_bus = Arc::clone(&bus);
        bus.once(
            EventName::ModuleChanged,
            listener(move |args| {
                inner_bus.emit(EventName::ModuleLoaded, args);
                inner_bus.emit(EventName::ModuleChanged, args);
                Ok(())
            }),
        );
        bus.on(EventName::ModuleLoaded, recorder(&log, "loaded"));

        assert_eq!(bus.emit(EventName::ModuleChanged, &[json!("todo")]), 1);
        assert_eq!(*log.lock().unwrap(), vec!["loaded"]);
        assert_eq!(bus.listener_count(EventName::ModuleChanged), 0);
    }
}
