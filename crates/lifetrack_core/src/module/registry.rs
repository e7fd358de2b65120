//! Module registry and load/unload sequencing.
//!
//! # Responsibility
//! - Own module descriptors keyed by unique name.
//! - Run the unload-then-load transition and report failures to the mount.
//!
//! # Invariants
//! - At most one descriptor is loaded at any time.
//! - The previous module's `cleanup` returns before the next `init` starts.
//! - No internal lock is held while module code or listeners run.

use crate::event::{listener, EventName, Listener, ListenerError};
use crate::module::mount::{ErrorPanel, MountPoint};
use crate::module::{Module, ModuleContext, ModuleError, ModuleResult};
use log::{error, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Lifecycle state of one registered module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Registered,
    Loading,
    Loaded,
    Unloading,
}

/// Module call that failed during a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Render,
    Init,
}

impl LifecyclePhase {
    fn as_str(self) -> &'static str {
        match self {
            Self::Render => "render",
            Self::Init => "init",
        }
    }
}

/// Result of a successful `load_module` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The module was already current; nothing ran.
    AlreadyCurrent,
    Loaded,
    /// Another transition was running; the request runs when it finishes.
    Deferred,
}

/// Point-in-time view of one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleStatus {
    pub name: String,
    pub state: ModuleState,
    pub loaded: bool,
    pub current: bool,
}

#[derive(Debug)]
pub enum RegistryError {
    DuplicateModule(String),
    ModuleNotFound(String),
    ModuleFailed {
        module: String,
        phase: LifecyclePhase,
        source: ModuleError,
    },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateModule(name) => write!(f, "module already registered: {name}"),
            Self::ModuleNotFound(name) => write!(f, "module not found: {name}"),
            Self::ModuleFailed {
                module,
                phase,
                source,
            } => write!(f, "module `{module}` failed during {}: {source}", phase.as_str()),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ModuleFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

type SharedModule = Arc<Mutex<Box<dyn Module>>>;

struct Descriptor {
    name: String,
    instance: SharedModule,
    state: ModuleState,
    loaded: bool,
}

#[derive(Default)]
struct RegistryState {
    modules: Vec<Descriptor>,
    current: Option<String>,
    transitioning: bool,
    pending: Option<String>,
    failed: Option<String>,
}

impl RegistryState {
    fn descriptor_mut(&mut self, name: &str) -> Option<&mut Descriptor> {
        self.modules.iter_mut().find(|module| module.name == name)
    }

    fn reset(&mut self, name: &str) {
        if let Some(descriptor) = self.descriptor_mut(name) {
            descriptor.state = ModuleState::Registered;
            descriptor.loaded = false;
        }
        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
    }
}

/// Owns feature modules and keeps at most one of them mounted.
pub struct ModuleRegistry {
    ctx: ModuleContext,
    mount: Arc<dyn MountPoint>,
    state: Mutex<RegistryState>,
    change_listener: Mutex<Option<Listener>>,
}

impl ModuleRegistry {
    pub fn new(ctx: ModuleContext, mount: Arc<dyn MountPoint>) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            mount,
            state: Mutex::new(RegistryState::default()),
            change_listener: Mutex::new(None),
        })
    }

    pub fn context(&self) -> &ModuleContext {
        &self.ctx
    }

    /// Subscribes the registry to `module:changed`. Calling twice is a no-op.
    ///
    /// The subscription holds a weak reference, so it never keeps the
    /// registry alive.
    pub fn attach(self: &Arc<Self>) {
        let mut slot = lock(&self.change_listener);
        if slot.is_some() {
            return;
        }
        let registry = Arc::downgrade(self);
        let on_change = listener(move |args| {
            let Some(registry) = registry.upgrade() else {
                return Ok(());
            };
            let name = args
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| ListenerError::new("module:changed expects a module name"))?;
            registry
                .load_module(name)
                .map(|_| ())
                .map_err(|err| ListenerError::new(err.to_string()))
        });
        self.ctx
            .bus
            .on(EventName::ModuleChanged, Arc::clone(&on_change));
        *slot = Some(on_change);
    }

    /// Removes the `module:changed` subscription installed by [`attach`].
    ///
    /// [`attach`]: ModuleRegistry::attach
    pub fn detach(&self) -> bool {
        match lock(&self.change_listener).take() {
            Some(on_change) => self.ctx.bus.off(EventName::ModuleChanged, &on_change) > 0,
            None => false,
        }
    }

    pub fn register_module(
        &self,
        name: impl Into<String>,
        instance: Box<dyn Module>,
    ) -> RegistryResult<()> {
        let name = name.into();
        let mut state = lock(&self.state);
        if state.modules.iter().any(|module| module.name == name) {
            return Err(RegistryError::DuplicateModule(name));
        }
        info!("event=module_register module=registry status=ok name={name}");
        state.modules.push(Descriptor {
            name,
            instance: Arc::new(Mutex::new(instance)),
            state: ModuleState::Registered,
            loaded: false,
        });
        Ok(())
    }

    /// Makes `name` the current module, unloading the previous one first.
    ///
    /// # Errors
    /// - `ModuleNotFound` when no module has that name.
    /// - `ModuleFailed` when its `render` or `init` fails; the mount shows a
    ///   retryable error panel and no module is current afterwards.
    pub fn load_module(&self, name: &str) -> RegistryResult<LoadOutcome> {
        {
            let mut state = lock(&self.state);
            if state.transitioning {
                info!("event=module_load module=registry status=deferred name={name}");
                state.pending = Some(name.to_string());
                return Ok(LoadOutcome::Deferred);
            }
            if state.current.as_deref() == Some(name) {
                return Ok(LoadOutcome::AlreadyCurrent);
            }
            state.transitioning = true;
        }

        let result = self.transition(name);
        loop {
            let next = {
                let mut state = lock(&self.state);
                match state.pending.take() {
                    Some(next) if state.current.as_deref() != Some(next.as_str()) => next,
                    _ => {
                        state.transitioning = false;
                        break;
                    }
                }
            };
            if let Err(err) = self.transition(&next) {
                warn!("event=module_load module=registry status=error name={next} deferred=true error={err}");
            }
        }
        result
    }

    /// Runs `cleanup` on a loaded module and marks it unloaded.
    ///
    /// Returns `false` when the module exists but was not loaded. Cleanup
    /// failures are logged; the module is unloaded either way.
    pub fn unload_module(&self, name: &str) -> RegistryResult<bool> {
        {
            let state = lock(&self.state);
            if !state.modules.iter().any(|module| module.name == name) {
                return Err(RegistryError::ModuleNotFound(name.to_string()));
            }
        }
        Ok(self.unload(name))
    }

    /// Requests a switch through the bus; the attached registry performs it.
    pub fn switch_module(&self, name: &str) -> usize {
        self.ctx
            .bus
            .emit(EventName::ModuleChanged, &[Value::from(name)])
    }

    /// Loads the module whose last load failed, if any.
    pub fn retry_failed(&self) -> RegistryResult<Option<LoadOutcome>> {
        let failed = lock(&self.state).failed.take();
        match failed {
            Some(name) => self.load_module(&name).map(Some),
            None => Ok(None),
        }
    }

    pub fn current_module(&self) -> Option<String> {
        lock(&self.state).current.clone()
    }

    pub fn failed_module(&self) -> Option<String> {
        lock(&self.state).failed.clone()
    }

    /// Registered names in registration order.
    pub fn module_names(&self) -> Vec<String> {
        lock(&self.state)
            .modules
            .iter()
            .map(|module| module.name.clone())
            .collect()
    }

    pub fn module_status(&self, name: &str) -> Option<ModuleStatus> {
        let state = lock(&self.state);
        let current = state.current.as_deref() == Some(name);
        state
            .modules
            .iter()
            .find(|module| module.name == name)
            .map(|module| ModuleStatus {
                name: module.name.clone(),
                state: module.state,
                loaded: module.loaded,
                current,
            })
    }

    /// Number of descriptors with `loaded == true`.
    pub fn loaded_count(&self) -> usize {
        lock(&self.state)
            .modules
            .iter()
            .filter(|module| module.loaded)
            .count()
    }

    fn transition(&self, name: &str) -> RegistryResult<LoadOutcome> {
        let started_at = Instant::now();
        let previous = lock(&self.state).current.clone();
        match previous {
            Some(previous) if previous == name => return Ok(LoadOutcome::AlreadyCurrent),
            Some(previous) => {
                self.unload(&previous);
            }
            None => {}
        }

        let instance = {
            let mut state = lock(&self.state);
            match state.descriptor_mut(name) {
                Some(descriptor) => {
                    descriptor.state = ModuleState::Loading;
                    Some(Arc::clone(&descriptor.instance))
                }
                None => None,
            }
        };
        let Some(instance) = instance else {
            error!("event=module_load module=registry status=error name={name} error_code=module_not_found");
            self.mount.show_error(ErrorPanel {
                module: name.to_string(),
                message: format!("Module \"{name}\" is not available."),
                retry_available: false,
            });
            return Err(RegistryError::ModuleNotFound(name.to_string()));
        };

        let content = match guarded(|| lock(&instance).render(&self.ctx)) {
            Ok(content) => content,
            Err(err) => return Err(self.fail(name, &instance, LifecyclePhase::Render, err)),
        };
        self.mount.mount(name, content);
        if let Some(descriptor) = lock(&self.state).descriptor_mut(name) {
            descriptor.loaded = true;
        }

        if let Err(err) = guarded(|| lock(&instance).init(&self.ctx)) {
            return Err(self.fail(name, &instance, LifecyclePhase::Init, err));
        }

        {
            let mut state = lock(&self.state);
            if let Some(descriptor) = state.descriptor_mut(name) {
                descriptor.state = ModuleState::Loaded;
            }
            state.current = Some(name.to_string());
            state.failed = None;
        }
        info!(
            "event=module_load module=registry status=ok name={name} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        self.ctx
            .bus
            .emit(EventName::ModuleLoaded, &[Value::from(name)]);
        Ok(LoadOutcome::Loaded)
    }

    fn fail(
        &self,
        name: &str,
        instance: &SharedModule,
        phase: LifecyclePhase,
        source: ModuleError,
    ) -> RegistryError {
        error!(
            "event=module_load module=registry status=error name={name} phase={} error={source}",
            phase.as_str()
        );
        if phase == LifecyclePhase::Init {
            if let Err(err) = guarded(|| lock(instance).cleanup(&self.ctx)) {
                warn!("event=module_cleanup module=registry status=error name={name} error={err}");
            }
        }
        {
            let mut state = lock(&self.state);
            state.reset(name);
            state.failed = Some(name.to_string());
        }
        self.mount.show_error(ErrorPanel {
            module: name.to_string(),
            message: source.to_string(),
            retry_available: true,
        });
        RegistryError::ModuleFailed {
            module: name.to_string(),
            phase,
            source,
        }
    }

    fn unload(&self, name: &str) -> bool {
        let instance = {
            let mut state = lock(&self.state);
            match state.descriptor_mut(name) {
                Some(descriptor) if descriptor.loaded => {
                    descriptor.state = ModuleState::Unloading;
                    Arc::clone(&descriptor.instance)
                }
                _ => return false,
            }
        };

        if let Err(err) = guarded(|| lock(&instance).cleanup(&self.ctx)) {
            warn!("event=module_cleanup module=registry status=error name={name} error={err}");
        }
        lock(&self.state).reset(name);
        self.mount.clear();
        info!("event=module_unload module=registry status=ok name={name}");
        self.ctx
            .bus
            .emit(EventName::ModuleUnloaded, &[Value::from(name)]);
        true
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs one module call, turning a panic into a module error.
fn guarded<T>(call: impl FnOnce() -> ModuleResult<T>) -> ModuleResult<T> {
    catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|_| Err(ModuleError::failed("module panicked")))
}
