//! Debounced and throttled emission on top of [`EventBus`].
//!
//! Both helpers take the current instant from the caller, so the host event
//! loop decides when time advances.

use super::{EventBus, EventName};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Emits an event only after `delay` passed without a newer request.
///
/// Later requests replace the pending arguments and restart the delay.
pub struct Debouncer {
    bus: Arc<EventBus>,
    delay: Duration,
    pending: Mutex<BTreeMap<EventName, (Instant, Vec<Value>)>>,
}

impl Debouncer {
    pub fn new(bus: Arc<EventBus>, delay: Duration) -> Self {
        Self {
            bus,
            delay,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn schedule(&self, event: EventName, args: Vec<Value>, now: Instant) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.insert(event, (now + self.delay, args));
    }

    /// Emits every request whose delay has elapsed; returns how many fired.
    pub fn poll(&self, now: Instant) -> usize {
        let due: Vec<(EventName, Vec<Value>)> = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            let ready: Vec<EventName> = pending
                .iter()
                .filter(|(_, (deadline, _))| *deadline <= now)
                .map(|(event, _)| *event)
                .collect();
            ready
                .into_iter()
                .filter_map(|event| pending.remove(&event).map(|(_, args)| (event, args)))
                .collect()
        };
        for (event, args) in &due {
            self.bus.emit(*event, args);
        }
        due.len()
    }

    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Emits an event at most once per `window`.
pub struct Throttler {
    bus: Arc<EventBus>,
    window: Duration,
    last_emit: Mutex<BTreeMap<EventName, Instant>>,
}

impl Throttler {
    pub fn new(bus: Arc<EventBus>, window: Duration) -> Self {
        Self {
            bus,
            window,
            last_emit: Mutex::new(BTreeMap::new()),
        }
    }

    /// Emits unless the previous emission of `event` is inside the window.
    pub fn emit(&self, event: EventName, args: &[Value], now: Instant) -> bool {
        {
            let mut last_emit = self.last_emit.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = last_emit.get(&event) {
                if now.saturating_duration_since(*previous) < self.window {
                    return false;
                }
            }
            last_emit.insert(event, now);
        }
        self.bus.emit(event, args);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{Debouncer, Throttler};
    use crate::event::{listener, EventBus, EventName};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    fn capture(bus: &EventBus, event: EventName) -> Arc<Mutex<Vec<Vec<Value>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.on(
            event,
            listener(move |args| {
                sink.lock().unwrap().push(args.to_vec());
                Ok(())
            }),
        );
        seen
    }

    #[test]
    fn debouncer_emits_last_arguments_after_quiet_period() {
        let bus = Arc::new(EventBus::new());
        let seen = capture(&bus, EventName::ViewChanged);
        let debouncer = Debouncer::new(Arc::clone(&bus), Duration::from_millis(100));
        let start = Instant::now();

        debouncer.schedule(EventName::ViewChanged, vec![json!("daily")], start);
        debouncer.schedule(
            EventName::ViewChanged,
            vec![json!("weekly")],
            start + Duration::from_millis(50),
        );
        assert_eq!(debouncer.poll(start + Duration::from_millis(120)), 0);
        assert_eq!(debouncer.poll(start + Duration::from_millis(150)), 1);

        assert_eq!(*seen.lock().unwrap(), vec![vec![json!("weekly")]]);
        assert_eq!(debouncer.pending(), 0);
    }

    #[test]
    fn throttler_drops_emissions_inside_window() {
        let bus = Arc::new(EventBus::new());
        let seen = capture(&bus, EventName::ThemeChanged);
        let throttler = Throttler::new(Arc::clone(&bus), Duration::from_millis(200));
        let start = Instant::now();

        assert!(throttler.emit(EventName::ThemeChanged, &[json!("dark")], start));
        assert!(!throttler.emit(
            EventName::ThemeChanged,
            &[json!("light")],
            start + Duration::from_millis(100)
        ));
        assert!(throttler.emit(
            EventName::ThemeChanged,
            &[json!("light")],
            start + Duration::from_millis(200)
        ));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
