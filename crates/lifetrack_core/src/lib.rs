//! Core of the LifeTrack personal tracker.
//!
//! Durable per-record storage, a typed event bus and the feature module
//! registry. Hosts build everything through [`App::start`] and pass the
//! resulting services around explicitly.

pub mod app;
pub mod config;
pub mod db;
pub mod event;
pub mod logging;
pub mod model;
pub mod module;
pub mod schema;
pub mod store;

pub use app::{App, Preferences, StartupError};
pub use config::{AppConfig, ConfigError};
pub use event::{listener, EventBus, EventName, Listener, ListenerError, ListenerResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::domain::StoreRecord;
pub use model::record::{Record, RecordKey};
pub use module::{
    ErrorPanel, LoadOutcome, MemoryMount, Module, ModuleContext, ModuleError, ModuleRegistry,
    ModuleResult, ModuleStore, MountPoint, MountView, RegistryError,
};
pub use schema::{StoreName, DB_VERSION};
pub use store::{
    open_store, open_store_in_memory, Backup, GetAllOptions, ImportSummary, Store, StoreError,
    StoreResult,
};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
