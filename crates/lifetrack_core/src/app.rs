//! Application bootstrap.
//!
//! # Responsibility
//! - Build the bus, store and registry once and hand them out explicitly.
//! - Turn startup failures into messages a host can show to the user.
//!
//! # Invariants
//! - A store that fails to open aborts startup.
//! - A default module that fails to load does not.

use crate::config::AppConfig;
use crate::event::{EventBus, EventName};
use crate::logging::{init_logging, LoggingError};
use crate::module::builtin::builtin_modules;
use crate::module::{MemoryMount, ModuleContext, ModuleRegistry, MountPoint, RegistryError};
use crate::store::{open_store, open_store_in_memory, Store, StoreError, StoreResult};
use log::{error, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub const THEME_SETTING: &str = "theme";
pub const VIEW_SETTING: &str = "view";
pub const NOTIFICATIONS_SETTING: &str = "notifications";

#[derive(Debug)]
pub enum StartupError {
    Logging(LoggingError),
    StorageUnavailable(StoreError),
    Registry(RegistryError),
}

impl StartupError {
    /// Actionable text for the host UI.
    pub fn user_message(&self) -> String {
        match self {
            Self::Logging(err) => format!(
                "LifeTrack could not start logging ({err}). \
                 Point LIFETRACK_LOG_DIR at a writable absolute directory and restart."
            ),
            Self::StorageUnavailable(_) => "LifeTrack could not open its database. \
                 Make sure the data directory is writable and that no newer version of \
                 the app created it, then restart."
                .to_string(),
            Self::Registry(err) => {
                format!("LifeTrack could not register its modules ({err}). Please restart.")
            }
        }
    }
}

impl Display for StartupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logging(err) => write!(f, "logging init failed: {err}"),
            Self::StorageUnavailable(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "module registration failed: {err}"),
        }
    }
}

impl Error for StartupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(err) => Some(err),
            Self::StorageUnavailable(err) => Some(err),
            Self::Registry(err) => Some(err),
        }
    }
}

/// User preferences kept in the `settings` store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub theme: String,
    pub view: String,
    pub notifications: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            view: "daily".to_string(),
            notifications: false,
        }
    }
}

/// Running application: shared services plus the module registry.
pub struct App {
    config: AppConfig,
    ctx: ModuleContext,
    registry: Arc<ModuleRegistry>,
}

impl App {
    /// Starts with an in-memory mount point.
    pub fn start(config: AppConfig) -> Result<Self, StartupError> {
        Self::start_with_mount(config, Arc::new(MemoryMount::new()))
    }

    /// Logging, bus, store, registry, built-in modules, then the default module.
    ///
    /// # Errors
    /// - `Logging` when a log directory is configured but cannot be used.
    /// - `StorageUnavailable` when the database cannot be opened or upgraded.
    pub fn start_with_mount(
        config: AppConfig,
        mount: Arc<dyn MountPoint>,
    ) -> Result<Self, StartupError> {
        let started_at = Instant::now();
        if let Some(log_dir) = &config.log_dir {
            init_logging(&config.log_level, log_dir).map_err(StartupError::Logging)?;
        }
        info!("event=app_start module=app status=start");

        let bus = Arc::new(EventBus::new());
        let store = match &config.db_path {
            Some(path) => open_store(path, config.db_version, Arc::clone(&bus)),
            None => open_store_in_memory(config.db_version, Arc::clone(&bus)),
        }
        .map_err(|err| {
            error!("event=app_start module=app status=error error_code=storage_unavailable error={err}");
            StartupError::StorageUnavailable(err)
        })?;

        let ctx = ModuleContext::new(Arc::new(store), bus);
        let registry = ModuleRegistry::new(ctx.clone(), mount);
        for (name, module) in builtin_modules() {
            registry
                .register_module(name, module)
                .map_err(StartupError::Registry)?;
        }
        registry.attach();

        if let Err(err) = registry.load_module(&config.default_module) {
            warn!(
                "event=app_start module=app status=degraded default_module={} error={err}",
                config.default_module
            );
        }
        info!(
            "event=app_start module=app status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(Self {
            config,
            ctx,
            registry,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn context(&self) -> &ModuleContext {
        &self.ctx
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.ctx.store
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.ctx.bus
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Stored preferences, falling back to defaults per field.
    pub fn preferences(&self) -> StoreResult<Preferences> {
        let defaults = Preferences::default();
        let store = &self.ctx.store;
        Ok(Preferences {
            theme: store.get_setting_as(THEME_SETTING, defaults.theme)?,
            view: store.get_setting_as(VIEW_SETTING, defaults.view)?,
            notifications: store.get_setting_as(NOTIFICATIONS_SETTING, defaults.notifications)?,
        })
    }

    /// Persists the theme and emits `theme:changed` when it differs.
    pub fn set_theme(&self, theme: &str) -> StoreResult<bool> {
        self.set_preference(THEME_SETTING, theme, EventName::ThemeChanged)
    }

    /// Persists the dashboard view and emits `view:changed` when it differs.
    pub fn set_view(&self, view: &str) -> StoreResult<bool> {
        self.set_preference(VIEW_SETTING, view, EventName::ViewChanged)
    }

    pub fn set_notifications(&self, enabled: bool) -> StoreResult<()> {
        self.ctx.store.save_setting(NOTIFICATIONS_SETTING, enabled)
    }

    /// Unloads the current module and drops every bus subscription.
    pub fn shutdown(&self) {
        if let Some(current) = self.registry.current_module() {
            if let Err(err) = self.registry.unload_module(&current) {
                warn!("event=app_shutdown module=app status=error name={current} error={err}");
            }
        }
        self.registry.detach();
        self.ctx.bus.remove_all_listeners(None);
        info!("event=app_shutdown module=app status=ok");
    }

    fn set_preference(&self, key: &str, value: &str, event: EventName) -> StoreResult<bool> {
        let current: Option<String> = self.ctx.store.get_setting_as(key, None)?;
        if current.as_deref() == Some(value) {
            return Ok(false);
        }
        self.ctx.store.save_setting(key, value)?;
        self.ctx.bus.emit(event, &[Value::from(value)]);
        Ok(true)
    }
}
