//! Pluggable feature modules and their lifecycle.
//!
//! # Responsibility
//! - Define the render/init/cleanup capability every module implements.
//! - Own registered modules and keep at most one of them mounted.
//!
//! # Invariants
//! - At most one module is loaded at a time.
//! - The previous module's cleanup finishes before the next module's init.
//! - Module failures end up in the mount point, never in a crash.

pub mod builtin;
mod mount;
mod registry;

pub use mount::{ErrorPanel, MemoryMount, MountPoint, MountView};
pub use registry::{
    LifecyclePhase, LoadOutcome, ModuleRegistry, ModuleState, ModuleStatus, RegistryError,
    RegistryResult,
};

use crate::event::EventBus;
use crate::model::domain::StoreRecord;
use crate::model::record::{record_key, Record, RecordKey};
use crate::schema::StoreName;
use crate::store::{GetAllOptions, Store, StoreError, StoreResult};
use log::warn;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Setting holding the AI provider credential. Read, never validated.
pub const AI_CREDENTIAL_SETTING: &str = "openai_key";

pub type ModuleResult<T> = Result<T, ModuleError>;

#[derive(Debug)]
pub enum ModuleError {
    Store(StoreError),
    Failed(String),
}

impl ModuleError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl Display for ModuleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Failed(message) => f.write_str(message),
        }
    }
}

impl Error for ModuleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Failed(_) => None,
        }
    }
}

impl From<StoreError> for ModuleError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Shared services handed to every module call.
#[derive(Clone)]
pub struct ModuleContext {
    pub store: Arc<Store>,
    pub bus: Arc<EventBus>,
}

impl ModuleContext {
    pub fn new(store: Arc<Store>, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    /// Store operations bound to `name`.
    pub fn data(&self, name: StoreName) -> ModuleStore<'_> {
        ModuleStore {
            store: &self.store,
            name,
        }
    }

    /// Returns the configured AI credential, if any.
    pub fn ai_credential(&self) -> StoreResult<Option<String>> {
        let value = self.store.get_setting(AI_CREDENTIAL_SETTING, Value::Null)?;
        Ok(value
            .as_str()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string))
    }
}

/// One store seen from a module.
///
/// Other collaborators may write records the module's typed shape does not
/// describe; [`ModuleStore::rows`] skips those instead of failing the read.
#[derive(Clone, Copy)]
pub struct ModuleStore<'a> {
    store: &'a Store,
    name: StoreName,
}

impl ModuleStore<'_> {
    pub fn name(&self) -> StoreName {
        self.name
    }

    pub fn save(&self, record: Record) -> StoreResult<RecordKey> {
        self.store.add(self.name, record)
    }

    pub fn delete(&self, key: &RecordKey) -> StoreResult<bool> {
        self.store.delete(self.name, key)
    }

    pub fn get_by_id(&self, key: &RecordKey) -> StoreResult<Option<Record>> {
        self.store.get_by_id(self.name, key)
    }

    pub fn get_all(&self, options: &GetAllOptions) -> StoreResult<Vec<Record>> {
        self.store.get_all(self.name, options)
    }

    pub fn search(&self, index: &str, value: &Value) -> StoreResult<Vec<Record>> {
        self.store.search(self.name, index, value)
    }

    pub fn count(&self) -> StoreResult<usize> {
        self.store.count(self.name)
    }

    /// Typed view of `get_all`; records that do not fit `T` are logged and skipped.
    pub fn rows<T: StoreRecord>(&self, options: &GetAllOptions) -> StoreResult<Vec<T>> {
        debug_assert_eq!(T::STORE, self.name);
        let key_path = self.name.definition().key_path;
        let mut rows = Vec::new();
        for record in self.get_all(options)? {
            let key = record_key(&record, key_path);
            match T::from_record(record) {
                Ok(row) => rows.push(row),
                // serde messages may quote field values; log the key only.
                Err(_) => warn!(
                    "event=module_read module=module status=skipped store={} key={}",
                    self.name,
                    key.map_or_else(|| "none".to_string(), |key| key.to_string())
                ),
            }
        }
        Ok(rows)
    }
}

/// Capability set of a feature module.
///
/// Listeners a module registers in `init` must not lock the module itself;
/// they run while the registry may hold it.
pub trait Module: Send {
    /// Produces the content mounted for this module.
    fn render(&mut self, ctx: &ModuleContext) -> ModuleResult<String>;

    /// Wires up behavior after the content is mounted.
    fn init(&mut self, _ctx: &ModuleContext) -> ModuleResult<()> {
        Ok(())
    }

    /// Releases listeners and other resources acquired in `init`.
    fn cleanup(&mut self, _ctx: &ModuleContext) -> ModuleResult<()> {
        Ok(())
    }
}
