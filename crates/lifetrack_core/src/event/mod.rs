//! In-process publish/subscribe event bus.
//!
//! # Responsibility
//! - Decouple the store, the module registry and modules via named signals.
//! - Keep the event vocabulary a closed, typed set.
//!
//! # Invariants
//! - Regular listeners run before one-shot listeners, each group in
//!   registration order.
//! - A failing listener never stops delivery or reaches the emitter.

mod bus;
mod names;
mod rate;

pub use bus::{listener, EventBus, Listener, ListenerError, ListenerResult};
pub use names::{EventName, UnknownEventError};
pub use rate::{Debouncer, Throttler};
